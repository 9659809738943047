//! wellpath - recommendation and matching engine CLI
//!
//! Reads JSON inputs (catalog, user context, assessment signals, items),
//! runs the engine against the local SQLite database and prints pretty JSON
//! on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use wellpath_common::config::{
    default_config_path, load_toml_config, write_toml_config, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use wellpath_common::models::{AssessmentSignals, CatalogFile, ItemType, ProtocolItem, UserContext};
use wellpath_engine::store::UserCollectionStore;
use wellpath_engine::{RecommendationService, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "wellpath")]
#[command(about = "Wellness recommendation and product matching engine")]
#[command(version)]
struct Args {
    /// Root folder holding wellpath.db
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to <config_dir>/wellpath/wellpath.toml)
    #[arg(long, global = true, env = "WELLPATH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a config file with compiled defaults
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Upsert candidates and products from a catalog JSON file
    Import { catalog: PathBuf },
    /// Deactivate a catalog product
    RetireProduct { product_id: String },
    /// Score and rank the catalog for a user
    Recommend {
        #[arg(long)]
        user: String,
        /// UserContext JSON file
        #[arg(long)]
        context: PathBuf,
    },
    /// Show the user's current recommendation run
    ShowRecommendations {
        #[arg(long)]
        user: String,
    },
    /// Build, match and save a tiered protocol
    Protocol {
        #[arg(long)]
        user: String,
        /// UserContext JSON file
        #[arg(long)]
        context: PathBuf,
        /// AssessmentSignals JSON file
        #[arg(long)]
        signals: Option<PathBuf>,
    },
    /// Add one ProtocolItem (JSON file) to the user's collection
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        item: PathBuf,
    },
    /// Remove an item from the user's collection
    Remove {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "supplement")]
        item_type: String,
    },
    /// List the user's active collection
    List {
        #[arg(long)]
        user: String,
    },
    /// Link unlinked supplements to catalog products
    Link {
        #[arg(long)]
        user: String,
    },
    /// Price the user's active collection
    Bundle {
        #[arg(long)]
        user: String,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => load_toml_config(path),
        None => Ok(TomlConfig::default()),
    };
    let log_level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting wellpath v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Command::InitConfig { force } = &args.command {
        let path = config_path.context("No config directory on this platform, pass --config")?;
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        write_toml_config(&TomlConfig::default(), &path)?;
        info!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = config.context("Failed to load configuration")?;

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root.clone())
        .with_toml_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let store = Arc::new(SqliteStore::open(&db_path).await.context("Failed to open database")?);
    let service = RecommendationService::new(store.clone(), store.clone(), &config.engine);

    match args.command {
        Command::InitConfig { .. } => {}
        Command::Import { catalog } => {
            let catalog: CatalogFile = read_json(&catalog)?;
            print_json(&store.import_catalog(&catalog).await?)?;
        }
        Command::RetireProduct { product_id } => {
            let retired = store.deactivate_product(&product_id).await?;
            print_json(&serde_json::json!({ "product_id": product_id, "retired": retired }))?;
        }
        Command::Recommend { user, context } => {
            let context: UserContext = read_json(&context)?;
            print_json(&service.recommend(&user, &context).await?)?;
        }
        Command::ShowRecommendations { user } => {
            print_json(&store.current_recommendations(&user).await?)?;
        }
        Command::Protocol { user, context, signals } => {
            let context: UserContext = read_json(&context)?;
            let signals: AssessmentSignals = match signals {
                Some(path) => read_json(&path)?,
                None => AssessmentSignals::default(),
            };
            print_json(&service.build_protocol(&user, &context, &signals).await?)?;
        }
        Command::Add { user, item } => {
            let item: ProtocolItem = read_json(&item)?;
            print_json(&service.add_item(&user, item).await?)?;
        }
        Command::Remove { user, name, item_type } => {
            let removed = service
                .remove_item(&user, &name, ItemType::from(item_type.as_str()))
                .await?;
            print_json(&serde_json::json!({ "name": name, "removed": removed }))?;
        }
        Command::List { user } => {
            print_json(&store.active_items(&user).await?)?;
        }
        Command::Link { user } => {
            print_json(&service.link_products(&user).await?)?;
        }
        Command::Bundle { user } => {
            print_json(&service.bundle(&user).await?)?;
        }
    }

    Ok(())
}
