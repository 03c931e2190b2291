//! BuildIt API Server

use std::net::SocketAddr;
use std::sync::Arc;

use buildit_api::{AppState, routes};
use buildit_cache::Waitboard;
use buildit_config::system::EnvConfig;
use buildit_db::{PgReportRepo, create_pool, run_migrations};
use buildit_queue::QueueClient;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env = EnvConfig::from_env()?;

    let db_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        env.db.user, env.db.password, env.db.host, env.db.port, env.db.name
    );
    info!("connecting to database...");
    let pool = create_pool(&db_url).await?;
    run_migrations(&pool).await?;
    info!("database connected");

    let reports = Arc::new(PgReportRepo::new(pool));

    let waitboard = Waitboard::connect(
        &env.redis.host,
        env.redis.port,
        env.redis.username.as_deref(),
        env.redis.password.as_deref(),
    )
    .await?;

    let queue = QueueClient::connect(&env.queue.rabbitmq_url).await?;
    queue.declare_queue(&env.queue.task_queue).await?;

    let state = AppState::new(reports, waitboard, queue, env.queue.task_queue.clone());

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("starting server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
