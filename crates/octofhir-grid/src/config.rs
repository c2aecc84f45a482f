use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Partitioned,
    Replicated,
}

impl std::fmt::Display for CacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheMode::Partitioned => f.write_str("PARTITIONED"),
            CacheMode::Replicated => f.write_str("REPLICATED"),
        }
    }
}

/// Declaration of one named map on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    pub name: String,
    /// SQL schema the map's query entity is published under.
    pub sql_schema: Option<String>,
    pub mode: CacheMode,
    pub backups: u32,
    /// Fields that make up the key.
    pub key_fields: Vec<String>,
    /// Fields exposed to grid-side queries, in declaration order.
    pub query_fields: Vec<String>,
}

impl MapConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_schema: None,
            mode: CacheMode::default(),
            backups: 0,
            key_fields: Vec::new(),
            query_fields: Vec::new(),
        }
    }

    pub fn with_sql_schema(mut self, schema: impl Into<String>) -> Self {
        self.sql_schema = Some(schema.into());
        self
    }

    pub fn with_mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_backups(mut self, backups: u32) -> Self {
        self.backups = backups;
        self
    }

    pub fn with_key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_query_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.query_fields.contains(&field) {
            self.query_fields.push(field);
        }
        self
    }
}
