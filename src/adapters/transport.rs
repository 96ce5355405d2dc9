//! Upload transport boundary

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{AssetRef, SourceFile};

/// Channel half on which a transport reports upload progress (0-100).
///
/// Events may arrive out of order or repeat; the pipeline clamps them to a
/// monotonically non-decreasing sequence before they reach the registry.
pub type ProgressSender = mpsc::Sender<u8>;

/// Errors from the upload stage
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage service rejected upload: {0}")]
    Rejected(String),

    #[error("upload cancelled")]
    Cancelled,
}

/// Streams raw file data to remote storage.
///
/// Implementations should emit progress events on `progress` as bytes go
/// out and honor `cancel` by returning [`TransportError::Cancelled`]. The
/// pipeline additionally races the returned future against the token, so a
/// transport that ignores cancellation is abandoned rather than awaited.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Upload a file, resolving to the stored asset's reference
    async fn upload(
        &self,
        file: &SourceFile,
        progress: ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<AssetRef, TransportError>;
}
