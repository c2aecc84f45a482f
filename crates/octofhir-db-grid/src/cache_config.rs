//! Grid map declarations derived from the schema.

use octofhir_core::model::{ID_CHILD, SchemaContext};
use octofhir_core::Result;
use octofhir_grid::{CacheMode, MapConfig};

pub const HISTORY_SUFFIX: &str = "_History";

/// Current-value map for `resource_type`: one entry per logical id.
///
/// Query fields are the id plus every single-valued, non-choice primitive
/// child, which are the fields the codec stores flat.
pub fn cache_configuration_for(schema: &SchemaContext, resource_type: &str) -> Result<MapConfig> {
    let def = schema.resource_definition(resource_type)?;

    let mut config = MapConfig::new(resource_type)
        .with_sql_schema(schema.version().release_name())
        .with_mode(CacheMode::Partitioned)
        .with_backups(1)
        .with_key_fields(&[ID_CHILD])
        .with_query_field(ID_CHILD);

    for child in def.children() {
        let flat = !child.is_repeated()
            && !child.is_choice()
            && child.type_code().is_some_and(|t| schema.is_primitive(t));
        if flat {
            config = config.with_query_field(child.element_name());
        }
    }
    Ok(config)
}

/// Version-history map for `resource_type`, keyed by id and version.
pub fn history_cache_configuration_for(schema: &SchemaContext, resource_type: &str) -> Result<MapConfig> {
    schema.resource_definition(resource_type)?;

    Ok(MapConfig::new(format!("{resource_type}{HISTORY_SUFFIX}"))
        .with_sql_schema(schema.version().release_name())
        .with_mode(CacheMode::Partitioned)
        .with_backups(0)
        .with_key_fields(&["idPart", "version"])
        .with_query_field("idPart")
        .with_query_field("version"))
}
