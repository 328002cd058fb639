use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aircast::config::Config;
use aircast::registry::{Registry, StaticRegistry};
use aircast::transcoder::{FfmpegSpawner, TranscoderSpawner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aircast=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(bind_addr = %config.bind_addr, "starting aircast");

    let registry: Arc<dyn Registry> = Arc::new(StaticRegistry::load_from_path(
        &config.registry_config_path,
        "file:///music",
    ));
    let spawner: Arc<dyn TranscoderSpawner> = Arc::new(FfmpegSpawner::default());

    let (app, _state) = aircast::create_app(config.clone(), registry, spawner);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
