//! Pointcuts: the named places where interceptors are invoked.

use std::fmt;

/// Kind of storage change a hook is being told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageChange {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pointcut {
    StoragePrestorageResourceCreated,
    StoragePrecommitResourceCreated,
    StoragePrestorageResourceUpdated,
    StoragePrecommitResourceUpdated,
    StoragePrestorageResourceDeleted,
    StoragePrecommitResourceDeleted,
    /// Before resources are handed to the caller; hooks may hide entries.
    StoragePreaccessResources,
    /// Before resources are shown; hooks may replace or mask entries.
    StoragePreshowResources,
}

impl Pointcut {
    pub const ALL: [Pointcut; 8] = [
        Pointcut::StoragePrestorageResourceCreated,
        Pointcut::StoragePrecommitResourceCreated,
        Pointcut::StoragePrestorageResourceUpdated,
        Pointcut::StoragePrecommitResourceUpdated,
        Pointcut::StoragePrestorageResourceDeleted,
        Pointcut::StoragePrecommitResourceDeleted,
        Pointcut::StoragePreaccessResources,
        Pointcut::StoragePreshowResources,
    ];

    pub fn prestorage(change: StorageChange) -> Self {
        match change {
            StorageChange::Created => Pointcut::StoragePrestorageResourceCreated,
            StorageChange::Updated => Pointcut::StoragePrestorageResourceUpdated,
            StorageChange::Deleted => Pointcut::StoragePrestorageResourceDeleted,
        }
    }

    pub fn precommit(change: StorageChange) -> Self {
        match change {
            StorageChange::Created => Pointcut::StoragePrecommitResourceCreated,
            StorageChange::Updated => Pointcut::StoragePrecommitResourceUpdated,
            StorageChange::Deleted => Pointcut::StoragePrecommitResourceDeleted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pointcut::StoragePrestorageResourceCreated => "STORAGE_PRESTORAGE_RESOURCE_CREATED",
            Pointcut::StoragePrecommitResourceCreated => "STORAGE_PRECOMMIT_RESOURCE_CREATED",
            Pointcut::StoragePrestorageResourceUpdated => "STORAGE_PRESTORAGE_RESOURCE_UPDATED",
            Pointcut::StoragePrecommitResourceUpdated => "STORAGE_PRECOMMIT_RESOURCE_UPDATED",
            Pointcut::StoragePrestorageResourceDeleted => "STORAGE_PRESTORAGE_RESOURCE_DELETED",
            Pointcut::StoragePrecommitResourceDeleted => "STORAGE_PRECOMMIT_RESOURCE_DELETED",
            Pointcut::StoragePreaccessResources => "STORAGE_PREACCESS_RESOURCES",
            Pointcut::StoragePreshowResources => "STORAGE_PRESHOW_RESOURCES",
        }
    }

    /// True for the pointcuts fired around a write.
    pub fn is_storage_change(&self) -> bool {
        !matches!(
            self,
            Pointcut::StoragePreaccessResources | Pointcut::StoragePreshowResources
        )
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
