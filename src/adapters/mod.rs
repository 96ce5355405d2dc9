//! Boundary adapters
//!
//! The orchestrator's only contracts with the rest of the application:
//! the upload transport, the analysis service, the notification (toast)
//! surface, and the item-editor surface. Everything behind these traits is
//! an external collaborator.

mod analysis;
mod editor;
mod notify;
mod transport;

pub use analysis::{AnalysisError, AnalysisService};
pub use editor::ItemEditor;
pub use notify::{Notification, NotificationKind, NotificationSink};
pub use transport::{ProgressSender, TransportError, UploadTransport};
