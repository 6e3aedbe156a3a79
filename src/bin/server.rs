//! crud-forge server: reads config from the environment (and `.env`), connects the
//! configured store and serves the entity routes.

use crud_forge::{
    build_router, ensure_database_exists, load_config, memory_store, run_migrations, PgStore,
    RepositoryRegistry, Store, StoreBackend,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const BODY_LIMIT: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_forge=info,tower_http=info")),
        )
        .init();

    let config = load_config().await?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            ensure_database_exists(&config.database_url).await?;
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await?;
            if let Some(dir) = &config.migrations_dir {
                run_migrations(&pool, dir).await?;
            }
            Arc::new(PgStore::connect(pool, &config.database_schema, &config.entities).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(memory_store(&config)?)
        }
    };

    let app = build_router(&config, store, &RepositoryRegistry::default())?
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        prefix = config.api_path_prefix.as_deref().unwrap_or("/"),
        "listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
