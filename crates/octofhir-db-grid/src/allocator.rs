use std::sync::Arc;

use dashmap::DashMap;
use octofhir_core::{CoreError, Result};
use octofhir_grid::{AtomicCounter, Grid};
use tracing::debug;

/// Hands out logical ids from a grid counter per resource type.
///
/// Counters start at 0, so the first id of every type is `"1"`.
pub struct IdentifierAllocator {
    grid: Arc<dyn Grid>,
    counters: DashMap<String, Arc<dyn AtomicCounter>>,
}

impl IdentifierAllocator {
    pub fn new(grid: Arc<dyn Grid>) -> Self {
        Self {
            grid,
            counters: DashMap::new(),
        }
    }

    pub async fn next_id(&self, resource_type: &str) -> Result<String> {
        let counter = self.counter(resource_type).await?;
        let next = counter.increment_and_get().await?;
        Ok(next.to_string())
    }

    async fn counter(&self, resource_type: &str) -> Result<Arc<dyn AtomicCounter>> {
        if let Some(counter) = self.counters.get(resource_type).map(|c| c.clone()) {
            return Ok(counter);
        }

        let counter = self
            .grid
            .atomic_counter(resource_type, 0, true)
            .await?
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "Grid '{}' did not create counter '{resource_type}'",
                    self.grid.name()
                ))
            })?;
        debug!(resource_type, "Identifier counter ready");
        Ok(self
            .counters
            .entry(resource_type.to_string())
            .or_insert(counter)
            .clone())
    }
}

impl std::fmt::Debug for IdentifierAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierAllocator")
            .field("grid", &self.grid.name())
            .field("counters", &self.counters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_grid::LocalGrid;

    #[tokio::test]
    async fn test_ids_per_type_start_at_one() {
        let allocator = IdentifierAllocator::new(Arc::new(LocalGrid::new("ids")));
        assert_eq!(allocator.next_id("Patient").await.unwrap(), "1");
        assert_eq!(allocator.next_id("Patient").await.unwrap(), "2");
        assert_eq!(allocator.next_id("Observation").await.unwrap(), "1");
    }

    #[tokio::test]
    async fn test_allocators_share_grid_counters() {
        let grid: Arc<dyn Grid> = Arc::new(LocalGrid::new("shared"));
        let a = IdentifierAllocator::new(grid.clone());
        let b = IdentifierAllocator::new(grid);
        assert_eq!(a.next_id("Patient").await.unwrap(), "1");
        assert_eq!(b.next_id("Patient").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_unavailable_grid_is_configuration_error() {
        let grid = Arc::new(LocalGrid::new("down"));
        let allocator = IdentifierAllocator::new(grid.clone());
        grid.close();
        let err = allocator.next_id("Patient").await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }
}
