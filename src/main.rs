//! `dockhand` application entry point.
//!
//! Uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/dockhand/config.toml` or path from `DOCKHAND_CONFIG_PATH`)
//! 3. Environment variables (`DOCKHAND_*`)
//! 4. Command-line arguments

use clap::Parser;
use dockhand::api::{build_image, describe_transport, pull_image};
use dockhand::config::{AppConfig, BuildArgs, Cli, Commands, PullArgs, load_config};
use dockhand::engine::{BuildOptions, EngineClient, PullOptions};
use dockhand::error::Result as DockhandResult;
use dockhand::image::ImageReference;
use eyre::{Report, Result as EyreResult};
use tracing_subscriber::EnvFilter;

/// Application entry point.
#[tokio::main]
async fn main() -> EyreResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config).await.map_err(Report::from)
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> DockhandResult<()> {
    let client = EngineClient::connect(config).await?;

    match &cli.command {
        Commands::Pull(args) => run_pull(&client, args).await,
        Commands::Build(args) => run_build(&client, args).await,
        Commands::Version => {
            report_version(&client);
            Ok(())
        }
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn run_pull(client: &EngineClient, args: &PullArgs) -> DockhandResult<()> {
    let image = ImageReference::new(&args.registry, &args.name, &args.version);
    let options = PullOptions {
        platform: args.platform.clone(),
    };
    pull_image(client, &image, &options).await?;
    println!("{image}");
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn run_build(client: &EngineClient, args: &BuildArgs) -> DockhandResult<()> {
    let options = BuildOptions {
        tags: args.tags.clone(),
        dockerfile: args.dockerfile.clone(),
        squash: args.squash,
        remove: !args.no_rm,
        force_remove: args.force_rm,
        pull_parent: args.pull,
        suppress_output: args.quiet,
        no_cache: args.no_cache,
    };
    build_image(client, &args.files, &options).await?;
    for tag in &args.tags {
        println!("{tag}");
    }
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn report_version(client: &EngineClient) {
    let summary = describe_transport(client.engine());
    match (&summary.endpoint, &summary.api_version) {
        (Some(endpoint), Some(version)) => {
            println!("{} {endpoint} (API {version})", summary.kind);
        }
        _ => println!("{}", summary.kind),
    }
}
