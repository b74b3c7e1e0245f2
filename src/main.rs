use std::sync::Arc;

use tienda::app::{AppState, build_router};
use tienda::core::auth::{AuthService, JwtConfig, JwtService, RedisTtlStore, RevocationStore};
use tienda::core::catalog::{CatalogClient, ProductCatalog};
use tienda::core::config::Config;
use tienda::core::db::{DbConfig, OrderRepository, UserRepository, create_pool_with_migrations};
use tienda::core::orders::OrderService;
use tienda::core::users::ensure_default_admin;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Config loaded: bind_addr={}, catalog={}, revocation_policy={:?}",
        config.bind_addr,
        config.catalog_base_url,
        config.revocation_failure_policy
    );

    let pool = create_pool_with_migrations(&DbConfig::from(&config)).await?;
    let revocations = RevocationStore::new(Arc::new(
        RedisTtlStore::connect(&config.redis_url).await?,
    ));
    tracing::info!("Connected to database and revocation store");

    let user_repo = UserRepository::new(pool.clone());
    ensure_default_admin(&user_repo, &config.default_admin).await?;

    let auth_service = AuthService::new(
        Arc::new(user_repo.clone()),
        JwtService::new(JwtConfig::from(&config)),
        revocations,
        config.revocation_failure_policy,
    );

    let catalog: Arc<dyn ProductCatalog> = Arc::new(CatalogClient::new(&config.catalog_base_url)?);
    let order_service = OrderService::new(OrderRepository::new(pool.clone()), catalog.clone());

    let app = build_router(AppState {
        pool,
        auth_service,
        user_repo,
        order_service,
        catalog,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
