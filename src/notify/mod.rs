//! Push messages and deep-link delivery.

pub mod intent;
pub mod listener;
pub mod message;
pub mod reconciler;

use thiserror::Error;

pub use intent::{IntentParseError, NavigationIntent};
pub use listener::{NotificationListener, send_notification};
pub use message::{MessageKind, RemoteMessage};
pub use reconciler::{DeepLinkReconciler, ReconcilerConfig, RetryPolicy};

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The listener could not claim its port. Treated like a denied
    /// notification permission.
    #[error("cannot listen for notifications on port {port}: {source}")]
    PermissionDenied {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
