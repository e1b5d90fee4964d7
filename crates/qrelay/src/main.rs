use std::sync::Arc;

use qrelay_core::{
    config::Config,
    login::LoginFlow,
    network::ClientRegistry,
    relay::Relay,
    scrape::WildberriesCatalog,
    store::Store,
};
use qrelay_gateway::{GatewayConfig, GatewayConnector};
use qrelay_http::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    qrelay_core::logging::init("qrelay")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!("starting qrelay");

    let store = Store::connect(&cfg.database_url).await?;

    let connector = Arc::new(GatewayConnector::new(GatewayConfig {
        base_url: cfg.gateway_url.clone(),
        api_id: cfg.api_id,
        api_hash: cfg.api_hash.clone(),
    }));
    let registry = Arc::new(ClientRegistry::new(connector));

    let relay = Arc::new(Relay::new(
        store.clone(),
        registry.clone(),
        Arc::new(WildberriesCatalog::new()),
    ));
    let login = Arc::new(LoginFlow::new(
        cfg.clone(),
        store.clone(),
        registry,
        relay.clone(),
    ));

    let app = qrelay_http::router(AppState {
        store,
        login,
        relay,
        sessions_dir: cfg.sessions_dir.clone(),
    });

    tracing::info!("listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
