use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "octofhir-grid")]
#[command(about = "OctoFHIR grid store: versioned FHIR resources on a key-value grid")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./octofhir-grid.toml when present)
    #[arg(short, long, global = true, env = "OCTOFHIR_GRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (overrides the configured level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import FHIR JSON resources (single resources or Bundles) into the store
    Import(ImportArgs),
    /// Run concurrent updates against one identity and verify its history
    Bench(BenchArgs),
    /// Show resource types and their grid map configuration
    Schema(SchemaArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct ImportArgs {
    /// JSON files to import
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Print the stored current values after importing
    #[arg(long)]
    pub show: bool,
}

#[derive(clap::Args)]
pub struct BenchArgs {
    /// Resource type to write
    #[arg(long, default_value = "Patient")]
    pub resource_type: String,
    /// Logical id every writer updates
    #[arg(long, default_value = "bench")]
    pub id: String,
    /// Concurrent writers
    #[arg(short, long, default_value_t = 8)]
    pub writers: usize,
    /// Updates per writer
    #[arg(short, long, default_value_t = 100)]
    pub updates: usize,
}

#[derive(clap::Args)]
pub struct SchemaArgs {
    /// Resource type to describe (lists all types when omitted)
    pub resource_type: Option<String>,
}
