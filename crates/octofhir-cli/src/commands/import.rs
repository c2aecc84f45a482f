use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_core::model::json::{resource_from_json, resource_to_json};
use serde_json::Value;
use tracing::{debug, info};

use crate::app::App;
use crate::cli::OutputFormat;
use crate::output::{print_json, print_success, print_table};

fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// The resources held by a document: the entries of a Bundle, or the document itself.
fn resources_in(value: &Value) -> Vec<&Value> {
    if value.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
        value
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(|e| e.get("resource")).collect())
            .unwrap_or_default()
    } else {
        vec![value]
    }
}

pub async fn import(app: &App, files: &[PathBuf], show: bool, format: OutputFormat) -> Result<()> {
    let mut imported: BTreeMap<String, usize> = BTreeMap::new();

    for file in files {
        let document = read_json(file)?;
        for value in resources_in(&document) {
            let resource = resource_from_json(&app.schema, value)
                .with_context(|| format!("{}: invalid resource", file.display()))?;
            let resource_type = resource.resource_type().to_string();
            let store = app.registry.store(&resource_type)?;
            let outcome = store.store_resource(resource).await?;
            debug!(id = %outcome.id, "Imported resource");
            *imported.entry(resource_type).or_default() += 1;
        }
    }

    let total: usize = imported.values().sum();
    info!(total, files = files.len(), "Import finished");

    match format {
        OutputFormat::Table => {
            print_table(
                &["ResourceType", "Imported", "Identities"],
                imported.iter().map(|(rt, count)| {
                    let identities = app
                        .registry
                        .store(rt)
                        .map(|s| s.identity_count().to_string())
                        .unwrap_or_else(|_| "-".into());
                    vec![rt.clone(), count.to_string(), identities]
                }),
            );
            print_success(&format!(
                "Imported {} resources from {} files",
                total.to_string().cyan(),
                files.len()
            ));
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({ "imported": imported, "total": total }));
        }
    }

    if show {
        for rt in imported.keys() {
            let store = app.registry.store(rt)?;
            let current: Vec<Value> = store
                .search_all(None)
                .await?
                .iter()
                .map(|r| resource_to_json(&app.schema, r))
                .collect();
            print_json(&Value::Array(current));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_core::IdType;
    use serde_json::json;

    #[test]
    fn test_bundle_entries_are_unwrapped() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Patient"}},
                {"fullUrl": "urn:uuid:1"},
                {"resource": {"resourceType": "Observation"}}
            ]
        });
        assert_eq!(resources_in(&bundle).len(), 2);

        let single = json!({"resourceType": "Patient"});
        assert_eq!(resources_in(&single), vec![&single]);
    }

    #[tokio::test]
    async fn test_import_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.json");
        fs::write(
            &path,
            json!({
                "resourceType": "Bundle",
                "entry": [
                    {"resource": {"resourceType": "Patient", "id": "a", "gender": "male"}},
                    {"resource": {"resourceType": "Patient", "gender": "female"}}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let app = App::start(&Default::default()).await.unwrap();
        import(&app, &[path], false, OutputFormat::Json).await.unwrap();
        let patients = app.registry.store("Patient").unwrap();
        assert_eq!(patients.search_all(None).await.unwrap().len(), 2);
        assert!(patients.read(&IdType::parse("Patient/a"), None).await.is_ok());
    }
}
