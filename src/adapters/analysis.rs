//! Analysis service boundary

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{AssetRef, CatalogItem};

/// Errors from the analysis stage
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis service error: {0}")]
    Service(String),

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),

    #[error("analysis cancelled")]
    Cancelled,
}

/// Extracts garment attributes from an uploaded photo and creates the
/// catalog entry for it.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyze an uploaded asset, resolving to the created catalog entry
    async fn analyze(&self, asset: &AssetRef, cancel: &CancellationToken) -> Result<CatalogItem, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_display() {
        let err = AnalysisError::Service("model unavailable".to_string());
        assert_eq!(err.to_string(), "analysis service error: model unavailable");

        let err = AnalysisError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
