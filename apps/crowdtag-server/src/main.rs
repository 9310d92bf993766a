use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, AppConfigProvider, CliArgs, ConfigProvider};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// Adapter to make AppConfigProvider implement modkit::ConfigProvider
struct ModkitConfigAdapter(std::sync::Arc<AppConfigProvider>);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.get_module_config(module_name)
    }
}

use annotations::config::AnnotationsConfig;
use annotations::Annotations;
use api_ingress::{ApiIngress, ApiIngressConfig};
use docstore::{DocumentStore, MemoryStore};
use modkit::{Module, ModuleCtx, ModuleCtxBuilder, RestfulModule};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Crowdtag Server - crowdsourced image annotation backend
#[derive(Parser)]
#[command(name = "crowdtag-server")]
#[command(about = "Crowdtag Server - crowdsourced image annotation backend")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI args passed down to config/app
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    // Apply CLI overrides (port / verbosity)
    config.apply_cli_overrides(&args);

    // Initialize logging
    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("Crowdtag Server starting");
    tracing::debug!(server = ?config.server, "Effective server configuration");

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Execute command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

fn module_ctx(config: &AppConfig, cancel: CancellationToken) -> ModuleCtx {
    // Provide module configs to modkit
    let provider = Arc::new(ModkitConfigAdapter(Arc::new(AppConfigProvider::new(
        config.clone(),
    ))));
    ModuleCtxBuilder::new(cancel)
        .with_config_provider(provider)
        .build()
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules...");
    check_module_sections(&config)?;

    let cancel = CancellationToken::new();
    modkit::cancel_on_signal(cancel.clone());
    let ctx = module_ctx(&config, cancel.clone());

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let annotations = Annotations::new(store, config.home_dir());
    let ingress = ApiIngress::new(config.server.bind_addr(), config.server.timeout_sec);

    let ingress_ctx = ctx.clone().for_module(api_ingress::MODULE_NAME);
    ingress.init(&ingress_ctx).await.context("api_ingress init failed")?;

    let annotations_ctx = ctx.for_module(annotations::module::MODULE_NAME);
    annotations
        .init(&annotations_ctx)
        .await
        .context("annotations init failed")?;
    let routes = annotations.register_rest(&annotations_ctx, axum::Router::new())?;

    ingress.finalize(routes);
    ingress.serve(cancel).await?;

    tracing::info!("Crowdtag Server stopped");
    Ok(())
}

/// Strictly parse the module sections present in the config bag.
fn check_module_sections(config: &AppConfig) -> Result<()> {
    config.module_section::<AnnotationsConfig>(annotations::module::MODULE_NAME)?;
    config.module_section::<ApiIngressConfig>(api_ingress::MODULE_NAME)?;
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    // AppConfig::load_* already normalized & created home_dir
    check_module_sections(&config)?;
    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}
