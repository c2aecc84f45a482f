mod app;
mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use octofhir_config::load_config;

use app::App;
use cli::{Cli, Commands};
use output::{print_error, print_json};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or(&cfg.logging.level));
    let format = cli.format.unwrap_or_default();

    if let Commands::Config = &cli.command {
        print_json(&serde_json::to_value(&cfg)?);
        return Ok(());
    }

    let app = App::start(&cfg).await?;
    let result = match &cli.command {
        Commands::Import(args) => commands::import::import(&app, &args.files, args.show, format).await,
        Commands::Bench(args) => commands::bench::bench(&app, args, format).await,
        Commands::Schema(args) => commands::schema::schema(&app, args.resource_type.as_deref(), format),
        Commands::Config => Ok(()),
    };
    app.shutdown();
    result
}
