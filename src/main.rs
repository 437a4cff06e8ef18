use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use shoe_favorites::config::{ConfigError, FavoritesConfig};
use shoe_favorites::favorites::{FavoritesManager, FavoritesStore, ProductId};
use shoe_favorites::identity::{IdentityStore, UserIdentifier};
use shoe_favorites::net::{ApiError, HttpFavoritesApi};
use shoe_favorites::storage::{FileStorage, Storage};
use shoe_favorites::sync::{FavoritesService, SyncOutcome};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid user id: must not be blank")]
    InvalidUserId,
    #[error("favorites service error: {0}")]
    Api(#[from] ApiError),
    #[error("favorite update failed: {0}")]
    Sync(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "shoe-favorites", about = "Storefront favorites client")]
struct Cli {
    #[arg(long, env = "FAVORITES_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "FAVORITES_STORAGE_PATH")]
    storage: Option<String>,

    #[arg(long, env = "FAVORITES_REQUEST_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Act as this visitor instead of the stored (or generated) browser id.
    #[arg(long)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the locally stored favorites.
    List,
    Toggle {
        product_id: ProductId,
    },
    Remove {
        product_id: ProductId,
    },
    /// Replace local favorites with the server's list.
    Fetch,
    /// Merge the server's list and push local-only favorites.
    Reconcile,
    /// Clear local favorites. The server is not touched.
    Clear,
    Whoami,
}

struct CliContext {
    service: FavoritesService,
    identity: IdentityStore,
    user_override: Option<UserIdentifier>,
}

impl CliContext {
    fn user(&self) -> UserIdentifier {
        self.user_override.clone().unwrap_or_else(|| self.identity.ensure())
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = FavoritesConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(path) = cli.storage {
        config.storage_path = path;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeouts.request_secs = secs;
    }
    let user_override = match cli.user_id {
        Some(raw) => Some(UserIdentifier::new(raw).ok_or(CliError::InvalidUserId)?),
        None => None,
    };

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.storage_path));
    let store = FavoritesStore::with_key(Arc::clone(&storage), config.storage_key.clone());
    let manager = Arc::new(FavoritesManager::with_store(store));
    let api = HttpFavoritesApi::from_config(&config)?;
    let service = FavoritesService::new(manager, Arc::new(api)).with_remote_timeout(config.timeouts.request());
    let ctx = CliContext { service, identity: IdentityStore::new(storage), user_override };

    tracing::debug!(base_url = %config.api_base_url, storage = %config.storage_path, "favorites cli starting");

    match cli.command {
        Command::List => run_list(&ctx),
        Command::Toggle { product_id } => {
            let user = ctx.user();
            let outcome = ctx.service.toggle_favorite(product_id, Some(&user)).await;
            print_outcome(product_id, &outcome)
        }
        Command::Remove { product_id } => {
            let user = ctx.user();
            let outcome = ctx.service.remove_favorite(product_id, Some(&user)).await;
            print_outcome(product_id, &outcome)
        }
        Command::Fetch => run_fetch(&ctx).await,
        Command::Reconcile => run_reconcile(&ctx).await,
        Command::Clear => {
            ctx.service.manager().clear_all();
            println!("ok");
            Ok(())
        }
        Command::Whoami => run_whoami(&ctx),
    }
}

fn run_list(ctx: &CliContext) -> Result<(), CliError> {
    let ids = ctx.service.manager().favorites().to_vec();
    print_json(&json!({ "count": ids.len(), "favorites": ids }))
}

async fn run_fetch(ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.user();
    let products = ctx.service.fetch_favorites_from_server(&user).await?;
    print_json(&serde_json::to_value(products)?)
}

async fn run_reconcile(ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.user();
    let report = ctx.service.reconcile(&user).await?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&json!({
        "server_count": report.server_count,
        "pushed": report.pushed,
        "favorites": ctx.service.manager().favorites().to_vec(),
    }))
}

fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.user();
    print_json(&json!({ "user_id": user, "generated": user.is_generated() }))
}

fn print_outcome(product_id: ProductId, outcome: &SyncOutcome) -> Result<(), CliError> {
    if !outcome.success {
        return Err(CliError::Sync(outcome.error.clone().unwrap_or_default()));
    }
    if let Some(warning) = &outcome.error {
        eprintln!("warning: saved locally only: {warning}");
    }
    print_json(&json!({ "product_id": product_id, "is_favorite": outcome.is_favorite }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

