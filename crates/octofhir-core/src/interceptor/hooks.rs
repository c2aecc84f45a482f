//! Interceptor traits and the hook error type.

use async_trait::async_trait;

use super::params::HookParams;
use super::pointcut::Pointcut;

/// Error raised by an interceptor. It aborts the operation that fired it.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The interceptor vetoed the operation.
    #[error("Interceptor rejected operation: {0}")]
    Rejected(String),

    #[error("Hook execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        HookError::Rejected(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        HookError::Execution(msg.into())
    }
}

/// Fires hooks for a pointcut.
#[async_trait]
pub trait InterceptorBroadcaster: Send + Sync {
    /// Invokes every interested interceptor in registration order. The first
    /// error stops dispatch and is returned to the caller.
    async fn call_hooks(&self, pointcut: Pointcut, params: &mut HookParams) -> Result<(), HookError>;

    /// Whether any interceptor listens on `pointcut`.
    fn has_hooks(&self, _pointcut: Pointcut) -> bool {
        true
    }
}

/// A single interceptor.
///
/// # Example
///
/// ```ignore
/// struct ConsentInterceptor;
///
/// #[async_trait]
/// impl Interceptor for ConsentInterceptor {
///     fn name(&self) -> &str { "consent" }
///     fn pointcuts(&self) -> &[Pointcut] { &[Pointcut::StoragePreaccessResources] }
///
///     async fn invoke(&self, _: Pointcut, params: &mut HookParams) -> Result<(), HookError> {
///         if let Some(details) = params.access_details.as_mut() {
///             details.set_dont_return_resource_at_index(0);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Pointcuts this interceptor handles. Empty means all.
    fn pointcuts(&self) -> &[Pointcut];

    /// Resource types this interceptor handles. Empty means all.
    fn resource_types(&self) -> &[&str] {
        &[]
    }

    async fn invoke(&self, pointcut: Pointcut, params: &mut HookParams) -> Result<(), HookError>;

    fn matches(&self, pointcut: Pointcut, resource_type: Option<&str>) -> bool {
        let pointcuts = self.pointcuts();
        if !pointcuts.is_empty() && !pointcuts.contains(&pointcut) {
            return false;
        }

        let types = self.resource_types();
        match resource_type {
            Some(rt) if !types.is_empty() => types.contains(&rt),
            _ => true,
        }
    }
}
