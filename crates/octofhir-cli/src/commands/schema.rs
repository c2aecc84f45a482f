use anyhow::Result;
use octofhir_db_grid::ResourceStore;
use octofhir_grid::MapConfig;

use crate::app::App;
use crate::cli::OutputFormat;
use crate::output::{print_fields, print_json, print_table};

fn map_json(config: &MapConfig) -> serde_json::Value {
    serde_json::json!({
        "name": config.name,
        "sqlSchema": config.sql_schema,
        "mode": config.mode.to_string(),
        "backups": config.backups,
        "keyFields": config.key_fields,
        "queryFields": config.query_fields,
    })
}

fn describe(store: &ResourceStore) -> serde_json::Value {
    let (current, history) = store.cache_config();
    serde_json::json!({
        "resourceType": store.resource_type(),
        "current": map_json(current),
        "history": history.map(map_json),
        "typeHistory": store.options().type_history,
    })
}

pub fn schema(app: &App, resource_type: Option<&str>, format: OutputFormat) -> Result<()> {
    match (resource_type, format) {
        (Some(rt), OutputFormat::Json) => {
            let store = app.registry.store(rt)?;
            print_json(&describe(&store));
        }
        (Some(rt), OutputFormat::Table) => {
            let store = app.registry.store(rt)?;
            let (current, history) = store.cache_config();
            print_fields(&[
                ("Resource type", rt.to_string()),
                ("Map", current.name.clone()),
                ("SQL schema", current.sql_schema.clone().unwrap_or_else(|| "-".into())),
                ("Mode", current.mode.to_string()),
                ("Backups", current.backups.to_string()),
                ("Key fields", current.key_fields.join(", ")),
                ("Query fields", current.query_fields.join(", ")),
                (
                    "History map",
                    history.map(|h| h.name.clone()).unwrap_or_else(|| "(disabled)".into()),
                ),
            ]);
        }
        (None, OutputFormat::Json) => {
            let all: Vec<_> = app.registry.stores().map(|s| describe(s)).collect();
            print_json(&serde_json::Value::Array(all));
        }
        (None, OutputFormat::Table) => print_table(
            &["ResourceType", "Map", "History", "Query fields"],
            app.registry.stores().map(|store| {
                let (current, history) = store.cache_config();
                vec![
                    store.resource_type().to_string(),
                    current.name.clone(),
                    history.map(|h| h.name.clone()).unwrap_or_else(|| "-".into()),
                    current.query_fields.join(", "),
                ]
            }),
        ),
    }
    Ok(())
}
