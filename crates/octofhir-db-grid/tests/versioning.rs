//! Versioning behaviour of the resource store against an in-process grid.

use std::sync::Arc;

use futures_util::future::join_all;
use octofhir_core::{CoreError, Element, IdType, Resource, SchemaContext};
use octofhir_db_grid::{
    IdentifierAllocator, ResourceStore, StoreContext, StoreCounts, StoreOptions, TypeHistoryMode, VersionOracle,
};
use octofhir_grid::{Grid, LocalGrid};

fn context(grid: &Arc<LocalGrid>) -> StoreContext {
    StoreContext {
        schema: Arc::new(SchemaContext::r4()),
        allocator: Arc::new(IdentifierAllocator::new(grid.clone())),
        oracle: Arc::new(VersionOracle::new()),
    }
}

async fn open(grid: &Arc<LocalGrid>, options: StoreOptions) -> ResourceStore {
    ResourceStore::open(grid.as_ref(), context(grid), "Patient", options)
        .await
        .expect("open store")
}

fn patient(id: Option<&str>, gender: &str) -> Resource {
    let mut resource =
        Resource::from_element(Element::new("Patient").with_primitive("gender", "code", gender));
    if let Some(id) = id {
        resource = resource.with_id(id);
    }
    resource
}

fn gender(resource: &Resource) -> Option<&str> {
    resource.field("gender").first()?.as_primitive()?.value_as_string()
}

fn version(id: &IdType) -> i64 {
    id.version_id_part_as_long().expect("versioned id")
}

#[tokio::test]
async fn create_assigns_id_and_version() {
    let grid = LocalGrid::new_shared("create");
    let store = open(&grid, StoreOptions::default()).await;

    let first = store.create(patient(None, "male"), None).await.unwrap();
    let second = store.create(patient(None, "female"), None).await.unwrap();

    assert_eq!(first.id.resource_type.as_deref(), Some("Patient"));
    assert_eq!(first.id.id_part(), Some("1"));
    assert_eq!(second.id.id_part(), Some("2"));
    assert!(first.id.has_version_id_part());
    assert_eq!(first.created, Some(true));
    assert_eq!(first.resource.unwrap().id_element(), first.id);
}

#[tokio::test]
async fn create_with_invalid_id_is_rejected() {
    let grid = LocalGrid::new_shared("invalid");
    let store = open(&grid, StoreOptions::default()).await;
    let err = store.create(patient(Some("has space"), "male"), None).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidId(_)));
    assert_eq!(store.identity_count(), 0);
}

#[tokio::test]
async fn versions_increase_and_reads_resolve() {
    let grid = LocalGrid::new_shared("versions");
    let store = open(&grid, StoreOptions::default()).await;

    let v1 = store.update(patient(Some("p"), "male"), None, None).await.unwrap();
    let v2 = store.update(patient(Some("p"), "female"), None, None).await.unwrap();
    let v3 = store.update(patient(Some("p"), "other"), None, None).await.unwrap();

    assert!(version(&v1.id) < version(&v2.id));
    assert!(version(&v2.id) < version(&v3.id));
    assert_eq!(v1.created, Some(true));
    assert_eq!(v2.created, Some(false));

    let latest = store.read(&IdType::parse("Patient/p"), None).await.unwrap();
    assert_eq!(gender(&latest), Some("other"));
    assert_eq!(latest.id_element(), v3.id);

    let old = store.read(&v1.id, None).await.unwrap();
    assert_eq!(gender(&old), Some("male"));
}

#[tokio::test]
async fn update_addressing_unknown_version_reports_created() {
    let grid = LocalGrid::new_shared("addressed");
    let store = open(&grid, StoreOptions::default()).await;

    let v1 = store.update(patient(Some("p"), "male"), None, None).await.unwrap();
    let again = store
        .update(patient(Some(&v1.id.value()), "female"), None, None)
        .await
        .unwrap();
    assert_eq!(again.created, Some(false));

    let fresh = store
        .update(patient(Some("Patient/p/_history/1"), "female"), None, None)
        .await
        .unwrap();
    assert_eq!(fresh.created, Some(true));
    assert!(version(&fresh.id) > version(&again.id));
}

#[tokio::test]
async fn history_for_id_is_most_recent_first() {
    let grid = LocalGrid::new_shared("history");
    let store = open(&grid, StoreOptions::default()).await;

    let mut ids = Vec::new();
    for g in ["male", "female", "other", "unknown"] {
        ids.push(store.update(patient(Some("h"), g), None, None).await.unwrap().id);
    }

    let history = store.history_for_id("h", None).await.unwrap();
    let versions: Vec<IdType> = history.iter().map(|r| r.id_element()).collect();
    ids.reverse();
    assert_eq!(versions, ids);

    let err = store.history_for_id("missing", None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn read_errors_distinguish_not_found_and_gone() {
    let grid = LocalGrid::new_shared("gone");
    let store = open(&grid, StoreOptions::default()).await;

    let err = store.read(&IdType::parse("Patient/nobody"), None).await.unwrap_err();
    assert!(err.is_not_found());
    let err = store
        .read(&IdType::parse("Patient/nobody/_history/5"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    store.update(patient(Some("x"), "male"), None, None).await.unwrap();
    let err = store
        .read(&IdType::parse("Patient/x/_history/5"), None)
        .await
        .unwrap_err();
    assert!(err.is_gone());
}

#[tokio::test]
async fn delete_records_a_tombstone_version() {
    let grid = LocalGrid::new_shared("delete");
    let store = open(&grid, StoreOptions::default()).await;

    let v1 = store.update(patient(Some("d"), "male"), None, None).await.unwrap();
    let deleted = store.delete(&IdType::parse("Patient/d"), None).await.unwrap();

    assert!(deleted.resource.is_none());
    assert!(version(&deleted.id) > version(&v1.id));

    assert!(store.read(&IdType::parse("Patient/d"), None).await.unwrap_err().is_not_found());
    assert!(store.read(&deleted.id, None).await.unwrap_err().is_gone());
    // Earlier versions stay readable.
    assert_eq!(gender(&store.read(&v1.id, None).await.unwrap()), Some("male"));
    // The tombstone is not part of the visible history.
    assert_eq!(store.history_for_id("d", None).await.unwrap().len(), 1);

    let err = store.delete(&IdType::parse("Patient/never"), None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_of_current_version_removes_current() {
    let grid = LocalGrid::new_shared("delete-version");
    let store = open(&grid, StoreOptions::default()).await;

    let v1 = store.update(patient(Some("d"), "male"), None, None).await.unwrap();
    let v2 = store.update(patient(Some("d"), "female"), None, None).await.unwrap();

    store.delete(&v2.id, None).await.unwrap();

    assert!(store.read(&IdType::parse("Patient/d"), None).await.unwrap_err().is_not_found());
    assert!(store.read(&v2.id, None).await.unwrap_err().is_gone());
    assert_eq!(gender(&store.read(&v1.id, None).await.unwrap()), Some("male"));

    // Deleting the same version again finds nothing.
    assert!(store.delete(&v2.id, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_of_old_version_keeps_current() {
    let grid = LocalGrid::new_shared("delete-old");
    let store = open(&grid, StoreOptions::default()).await;

    let v1 = store.update(patient(Some("d"), "male"), None, None).await.unwrap();
    store.update(patient(Some("d"), "female"), None, None).await.unwrap();

    store.delete(&v1.id, None).await.unwrap();

    let current = store.read(&IdType::parse("Patient/d"), None).await.unwrap();
    assert_eq!(gender(&current), Some("female"));
    assert!(store.read(&v1.id, None).await.unwrap_err().is_gone());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_of_one_id_serialize() {
    const WRITERS: usize = 32;

    let grid = LocalGrid::new_shared("concurrent");
    let store = Arc::new(open(&grid, StoreOptions::default()).await);
    store.update(patient(Some("c"), "unknown"), None, None).await.unwrap();

    let tasks = (0..WRITERS).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            let g = if i % 2 == 0 { "male" } else { "female" };
            store.update(patient(Some("c"), g), None, None).await
        })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("update"))
        .collect();

    let history = store.history_for_id("c", None).await.unwrap();
    assert_eq!(history.len(), WRITERS + 1);

    let versions: Vec<i64> = history.iter().map(|r| version(&r.id_element())).collect();
    assert!(versions.windows(2).all(|w| w[0] > w[1]));

    let highest = outcomes.iter().map(|o| version(&o.id)).max().unwrap();
    let current = store.read(&IdType::parse("Patient/c"), None).await.unwrap();
    assert_eq!(version(&current.id_element()), highest);
    assert_eq!(versions[0], highest);
}

#[tokio::test]
async fn reopening_rebuilds_indexes() {
    let grid = LocalGrid::new_shared("rebuild");
    let (v1, v2) = {
        let store = open(&grid, StoreOptions::default()).await;
        let v1 = store.update(patient(Some("r"), "male"), None, None).await.unwrap();
        let v2 = store.update(patient(Some("r"), "female"), None, None).await.unwrap();
        store.create(patient(None, "other"), None).await.unwrap();
        (v1, v2)
    };

    // A fresh oracle whose clock could lag the stored versions.
    let store = open(&grid, StoreOptions::default()).await;
    assert_eq!(store.identity_count(), 2);

    let history = store.history_for_id("r", None).await.unwrap();
    let ids: Vec<IdType> = history.iter().map(|r| r.id_element()).collect();
    assert_eq!(ids, vec![v2.id.clone(), v1.id.clone()]);

    let v3 = store.update(patient(Some("r"), "male"), None, None).await.unwrap();
    assert!(version(&v3.id) > version(&v2.id));
}

#[tokio::test]
async fn rebuild_without_history_uses_current_values() {
    let grid = LocalGrid::new_shared("rebuild-current");
    let options = StoreOptions {
        history_enabled: false,
        ..Default::default()
    };
    {
        let store = open(&grid, options.clone()).await;
        store.update(patient(Some("a"), "male"), None, None).await.unwrap();
        store.update(patient(Some("b"), "female"), None, None).await.unwrap();
    }

    let store = open(&grid, options).await;
    assert_eq!(store.identity_count(), 2);
    assert_eq!(store.rebuild_indexes().await.unwrap(), 2);
}

#[tokio::test]
async fn searches_scan_current_values() {
    let grid = LocalGrid::new_shared("search");
    let store = open(&grid, StoreOptions::default()).await;

    for (id, g) in [("b", "female"), ("a", "male"), ("c", "male")] {
        store.update(patient(Some(id), g), None, None).await.unwrap();
    }
    store.delete(&IdType::parse("Patient/c"), None).await.unwrap();

    let all = store.search_all(None).await.unwrap();
    let ids: Vec<String> = all.iter().filter_map(|r| r.id_element().id_part().map(String::from)).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let males = store
        .search_by_predicate(|r| gender(r) == Some("male"), None)
        .await
        .unwrap();
    assert_eq!(males.len(), 1);

    let by_ids = store
        .search_by_ids(&[vec!["a".into(), "b".into()], vec!["b".into(), "c".into()]], None)
        .await
        .unwrap();
    assert_eq!(by_ids.len(), 1);
    assert_eq!(by_ids[0].id_element().id_part(), Some("b"));

    let disjoint = store
        .search_by_ids(&[vec!["a".into()], vec!["b".into()]], None)
        .await
        .unwrap();
    assert!(disjoint.is_empty());

    assert_eq!(store.search_by_ids(&[], None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn type_history_modes() {
    let grid = LocalGrid::new_shared("type-history");
    let current = open(&grid, StoreOptions::default()).await;
    current.update(patient(Some("a"), "male"), None, None).await.unwrap();
    current.update(patient(Some("a"), "female"), None, None).await.unwrap();
    current.update(patient(Some("b"), "male"), None, None).await.unwrap();
    current.update(patient(Some("gone"), "male"), None, None).await.unwrap();
    current.delete(&IdType::parse("Patient/gone"), None).await.unwrap();

    let entries = current.history_for_type(None).await.unwrap();
    // One entry per live identity, newest first, deleted identities dropped.
    let ids: Vec<IdType> = entries.iter().map(|r| r.id_element().to_versionless()).collect();
    assert_eq!(ids, vec![IdType::parse("Patient/b"), IdType::parse("Patient/a")]);
    assert_eq!(gender(&entries[1]), Some("female"));

    let versions = open(
        &grid,
        StoreOptions {
            type_history: TypeHistoryMode::Versions,
            ..Default::default()
        },
    )
    .await;
    let entries = versions.history_for_type(None).await.unwrap();
    assert_eq!(entries.len(), 4);
    let stamps: Vec<i64> = entries.iter().map(|r| version(&r.id_element())).collect();
    assert!(stamps.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn store_resource_and_clear() {
    let grid = LocalGrid::new_shared("clear");
    let store = open(&grid, StoreOptions::default()).await;

    let created = store.store_resource(patient(None, "male")).await.unwrap();
    let updated = store
        .store_resource(patient(created.id.id_part(), "female"))
        .await
        .unwrap();
    assert_eq!(created.id.id_part(), updated.id.id_part());
    // Utility writes bypass the operation counters.
    assert_eq!(store.counts(), StoreCounts::default());

    store.clear().await.unwrap();
    assert_eq!(store.identity_count(), 0);
    assert!(store.search_all(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_grid_surfaces_as_configuration_error() {
    let grid = LocalGrid::new_shared("closed");
    let store = open(&grid, StoreOptions::default()).await;
    store.update(patient(Some("a"), "male"), None, None).await.unwrap();

    grid.close();
    assert!(!grid.is_active());
    let err = store.read(&IdType::parse("Patient/a"), None).await.unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));
    let err = store.create(patient(None, "male"), None).await.unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));
}
