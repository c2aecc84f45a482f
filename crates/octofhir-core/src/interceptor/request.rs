use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use super::hooks::InterceptorBroadcaster;

/// Context of the request an operation runs on behalf of.
///
/// Hooks are only fired when the caller passes request details that carry
/// a broadcaster. Internal utilities (imports, rebuilds) run without one.
#[derive(Clone)]
pub struct RequestDetails {
    request_id: String,
    broadcaster: Option<Arc<dyn InterceptorBroadcaster>>,
}

impl RequestDetails {
    pub fn new(broadcaster: Arc<dyn InterceptorBroadcaster>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            broadcaster: Some(broadcaster),
        }
    }

    /// Request context that never fires hooks.
    pub fn without_interceptors() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            broadcaster: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn interceptor_broadcaster(&self) -> Option<&Arc<dyn InterceptorBroadcaster>> {
        self.broadcaster.as_ref()
    }
}

impl fmt::Debug for RequestDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDetails")
            .field("request_id", &self.request_id)
            .field("has_broadcaster", &self.broadcaster.is_some())
            .finish()
    }
}

/// Identity and timestamp of one storage transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub transaction_id: Uuid,
    pub transaction_date: OffsetDateTime,
}

impl TransactionDetails {
    pub fn new() -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            transaction_date: OffsetDateTime::now_utc(),
        }
    }
}

impl Default for TransactionDetails {
    fn default() -> Self {
        Self::new()
    }
}
