use anyhow::Result;
use axum::Router;
use cardsearch::load::{load_cards, load_ignored_cards};
use cardsearch::{CatalogIndex, IgnoredCardSource, MemoryIgnoredCards};
use clap::Parser;
use server::{build_app, AppState, DEFAULT_CATALOG_BODY_LIMIT};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Catalog snapshot to load at startup (file or directory of .json/.jsonl files)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// JSON map of deck id to ignored card ids
    #[arg(long)]
    ignored: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Largest accepted POST /admin/catalog body, in bytes
    #[arg(long, default_value_t = DEFAULT_CATALOG_BODY_LIMIT)]
    max_catalog_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let catalog = Arc::new(CatalogIndex::new());
    match &args.catalog {
        Some(path) => catalog.rebuild(load_cards(path)?),
        None => tracing::warn!("no catalog given, searches return nothing until POST /admin/catalog"),
    }
    let ignored: Arc<dyn IgnoredCardSource> = match &args.ignored {
        Some(path) => Arc::new(load_ignored_cards(path)?),
        None => Arc::new(MemoryIgnoredCards::new()),
    };

    let state = AppState { catalog_body_limit: args.max_catalog_bytes, ..AppState::new(catalog, ignored) };
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
