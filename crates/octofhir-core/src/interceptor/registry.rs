//! Ordered interceptor registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::hooks::{HookError, Interceptor, InterceptorBroadcaster};
use super::params::HookParams;
use super::pointcut::Pointcut;

/// Broadcaster backed by a list of interceptors, invoked in registration
/// order. Unlike the fire-and-forget event hooks, dispatch is inline and an
/// error from any interceptor is returned to the caller.
pub struct InterceptorRegistry {
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self {
            interceptors: RwLock::new(Vec::new()),
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn register(&self, interceptor: Arc<dyn Interceptor>) {
        let name = interceptor.name().to_string();
        self.interceptors.write().await.push(interceptor);
        debug!(interceptor = %name, "Registered interceptor");
    }

    /// Removes every interceptor with the given name. Returns how many were removed.
    pub async fn unregister(&self, name: &str) -> usize {
        let mut interceptors = self.interceptors.write().await;
        let before = interceptors.len();
        interceptors.retain(|i| i.name() != name);
        before - interceptors.len()
    }

    pub async fn interceptor_count(&self) -> usize {
        self.interceptors.read().await.len()
    }

    async fn matching(&self, pointcut: Pointcut, resource_type: Option<&str>) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors
            .read()
            .await
            .iter()
            .filter(|i| i.matches(pointcut, resource_type))
            .cloned()
            .collect()
    }
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry").finish_non_exhaustive()
    }
}

#[async_trait]
impl InterceptorBroadcaster for InterceptorRegistry {
    async fn call_hooks(&self, pointcut: Pointcut, params: &mut HookParams) -> Result<(), HookError> {
        let interceptors = self.matching(pointcut, params.resource_type.as_deref()).await;

        for interceptor in interceptors {
            debug!(
                interceptor = %interceptor.name(),
                pointcut = %pointcut,
                "Invoking interceptor"
            );
            if let Err(e) = interceptor.invoke(pointcut, params).await {
                warn!(
                    interceptor = %interceptor.name(),
                    pointcut = %pointcut,
                    error = %e,
                    "Interceptor aborted operation"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    fn has_hooks(&self, pointcut: Pointcut) -> bool {
        match self.interceptors.try_read() {
            Ok(interceptors) => interceptors.iter().any(|i| i.matches(pointcut, None)),
            // A concurrent registration holds the lock; assume there are hooks.
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Resource;
    use std::sync::Mutex;

    struct Recorder {
        name: String,
        pointcuts: Vec<Pointcut>,
        types: Vec<&'static str>,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn pointcuts(&self) -> &[Pointcut] {
            &self.pointcuts
        }

        fn resource_types(&self) -> &[&str] {
            &self.types
        }

        async fn invoke(&self, pointcut: Pointcut, _params: &mut HookParams) -> Result<(), HookError> {
            self.seen.lock().unwrap().push(format!("{}:{pointcut}", self.name));
            if self.fail {
                return Err(HookError::rejected("no"));
            }
            Ok(())
        }
    }

    fn recorder(name: &str, seen: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name: name.to_string(),
            pointcuts: vec![],
            types: vec![],
            seen: seen.clone(),
            fail: false,
        }
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(recorder("a", &seen))).await;
        registry.register(Arc::new(recorder("b", &seen))).await;

        let mut params = HookParams::new("Patient");
        registry
            .call_hooks(Pointcut::StoragePreshowResources, &mut params)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["a:STORAGE_PRESHOW_RESOURCES", "b:STORAGE_PRESHOW_RESOURCES"]
        );
    }

    #[tokio::test]
    async fn test_filters_by_pointcut_and_type() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();
        let mut only_access = recorder("access", &seen);
        only_access.pointcuts = vec![Pointcut::StoragePreaccessResources];
        let mut only_obs = recorder("obs", &seen);
        only_obs.types = vec!["Observation"];
        registry.register(Arc::new(only_access)).await;
        registry.register(Arc::new(only_obs)).await;

        let mut params = HookParams::new("Patient").with_new_resource(Resource::new("Patient"));
        registry
            .call_hooks(Pointcut::StoragePrestorageResourceCreated, &mut params)
            .await
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert!(registry.has_hooks(Pointcut::StoragePreaccessResources));
    }

    #[tokio::test]
    async fn test_error_stops_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();
        let mut failing = recorder("veto", &seen);
        failing.fail = true;
        registry.register(Arc::new(failing)).await;
        registry.register(Arc::new(recorder("after", &seen))).await;

        let mut params = HookParams::new("Patient");
        let err = registry
            .call_hooks(Pointcut::StoragePrecommitResourceUpdated, &mut params)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Rejected(_)));
        assert_eq!(seen.lock().unwrap().len(), 1);

        assert_eq!(registry.unregister("veto").await, 1);
        assert_eq!(registry.interceptor_count().await, 1);
    }
}
