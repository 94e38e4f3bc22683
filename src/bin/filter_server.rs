//! filter_server - HTTP front for dimension selection
//!
//! Reads config from env vars (see `filter_controller::config`); a `.env`
//! file in the working directory is loaded first.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filter_controller::api::{create_selection_router, DynSelector};
use filter_controller::clients::{
    DatasetApi, FilterApi, HierarchyApi, HttpDatasetClient, HttpFilterClient, HttpHierarchyClient,
};
use filter_controller::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filter_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(
        filter_api = %config.filter_api_url,
        dataset_api = %config.dataset_api_url,
        hierarchy_api = %config.hierarchy_api_url,
        batch_size = config.batch.page_size,
        batch_workers = config.batch.max_concurrent_pages,
        "Starting filter controller"
    );

    let filter: Arc<dyn FilterApi> = Arc::new(HttpFilterClient::new(&config)?);
    let dataset: Arc<dyn DatasetApi> = Arc::new(HttpDatasetClient::new(&config)?);
    let hierarchy: Arc<dyn HierarchyApi> = Arc::new(HttpHierarchyClient::new(&config)?);
    let selector = DynSelector::new(filter, dataset, hierarchy, config.batch);

    let app = create_selection_router(selector)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("filter_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
