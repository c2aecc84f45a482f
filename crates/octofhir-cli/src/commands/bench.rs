use std::time::Instant;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use futures_util::future::join_all;
use octofhir_core::{IdType, Resource};
use tracing::info;

use crate::app::App;
use crate::cli::{BenchArgs, OutputFormat};
use crate::output::{print_json, print_success, print_table};

/// Hammers one identity with concurrent updates, then checks that every
/// write produced exactly one distinct, ordered version.
pub async fn bench(app: &App, args: &BenchArgs, format: OutputFormat) -> Result<()> {
    if args.writers == 0 || args.updates == 0 {
        bail!("--writers and --updates must be > 0");
    }
    let store = app.registry.store(&args.resource_type)?;
    let seed = Resource::new(&args.resource_type).with_id(&args.id);
    store.update(seed, None, None).await.context("seed write failed")?;

    let started = Instant::now();
    let writers = (0..args.writers).map(|_| {
        let store = store.clone();
        let resource_type = args.resource_type.clone();
        let id = args.id.clone();
        let updates = args.updates;
        tokio::spawn(async move {
            for _ in 0..updates {
                let resource = Resource::new(&resource_type).with_id(&id);
                store.update(resource, None, None).await?;
            }
            Ok::<_, octofhir_core::CoreError>(())
        })
    });
    for joined in join_all(writers).await {
        joined.context("writer task panicked")??;
    }
    let elapsed = started.elapsed();

    let history = store.history_for_id(&args.id, None).await?;
    let versions: Vec<i64> = history
        .iter()
        .map(|r| r.id_element().version_id_part_as_long())
        .collect::<octofhir_core::Result<_>>()?;
    let expected = args.writers * args.updates + 1;
    let ordered = versions.windows(2).all(|w| w[0] > w[1]);
    let current = store
        .read(&IdType::new(&args.resource_type, &args.id, None), None)
        .await?;
    let current_is_latest = current.id_element().version_id_part_as_long().ok() == versions.first().copied();

    let writes = args.writers * args.updates;
    let per_sec = writes as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(writes, elapsed_ms = elapsed.as_millis() as u64, "Benchmark finished");

    match format {
        OutputFormat::Table => print_table(
            &["Writers", "Updates", "Versions", "Expected", "Elapsed", "Writes/s"],
            [vec![
                args.writers.to_string(),
                args.updates.to_string(),
                versions.len().to_string(),
                expected.to_string(),
                format!("{:.1?}", elapsed),
                format!("{per_sec:.0}"),
            ]],
        ),
        OutputFormat::Json => print_json(&serde_json::json!({
            "writers": args.writers,
            "updates": args.updates,
            "versions": versions.len(),
            "expected": expected,
            "elapsed_ms": elapsed.as_millis() as u64,
            "writes_per_sec": per_sec,
        })),
    }

    if versions.len() != expected || !ordered || !current_is_latest {
        bail!(
            "history check failed: {} versions (expected {expected}), ordered: {ordered}, current is latest: {current_is_latest}",
            versions.len()
        );
    }
    print_success(&format!("History of {}/{} verified", args.resource_type.cyan(), args.id.cyan()));
    Ok(())
}
