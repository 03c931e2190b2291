//! Worker pool controller entry point: a long-running process that polls
//! the job queue and spawns one Kubernetes Pod per message.

use buildit_config::system::{EnvConfig, WorkerPoolConfig};
use buildit_controller::WorkerPoolController;
use buildit_queue::QueueClient;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env = EnvConfig::from_env()?;
    let config = WorkerPoolConfig::from_env()?;

    let queue = QueueClient::connect(&env.queue.job_queue_url).await?;
    queue.declare_queue(&env.queue.job_queue_name).await?;

    let client = Client::try_default().await?;

    let controller = WorkerPoolController::new(client, queue, env, config);

    info!("worker pool controller started");
    controller.run().await;
}
