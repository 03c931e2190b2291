//! Long-running pipeline-queue consumer: a fixed-size worker pool pulls
//! pipeline submissions off the pipeline queue and runs them through the
//! dispatcher, matching the original implementation's
//! `worker/queue/worker.go` (`Qos`/worker-pool/manual ack) pattern.

use std::sync::Arc;

use buildit_cache::Waitboard;
use buildit_config::system::EnvConfig;
use buildit_core::queue::PipelineQueueMessage;
use buildit_db::{PgReportRepo, create_pool, run_migrations};
use buildit_queue::QueueClient;
use buildit_scheduler::Dispatcher;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const WORKER_COUNT: u16 = 5;

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
    let pool = create_pool(&db_url).await?;
    run_migrations(&pool).await?;
    let reports = PgReportRepo::new(pool);

    let waitboard = Waitboard::connect(
        &env.redis.host,
        env.redis.port,
        env.redis.username.as_deref(),
        env.redis.password.as_deref(),
    )
    .await?;

    let queue = QueueClient::connect(&env.queue.rabbitmq_url).await?;
    queue.declare_queue(&env.queue.job_queue_name).await?;

    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(reports),
        waitboard,
        queue,
        env.queue.job_queue_name.clone(),
    ));

    let pipeline_queue = QueueClient::connect(&env.queue.rabbitmq_url).await?;
    pipeline_queue.declare_queue(&env.queue.task_queue).await?;
    pipeline_queue.set_prefetch(WORKER_COUNT).await?;
    let mut consumer = pipeline_queue
        .consume(&env.queue.task_queue, "buildit-dispatcher")
        .await?;

    info!(workers = WORKER_COUNT, "dispatcher worker pool listening for pipeline submissions");

    while let Some(delivery) = buildit_queue::next_delivery(&mut consumer).await? {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let msg: PipelineQueueMessage = match buildit_queue::decode(&delivery) {
                Ok(msg) => msg,
                Err(err) => {
                    error!(error = %err, "failed to decode pipeline queue message");
                    let _ = buildit_queue::nack_drop(&delivery).await;
                    return;
                }
            };

            match dispatcher.dispatch(msg).await {
                Ok(pipeline_id) => {
                    info!(pipeline_id, "pipeline dispatched");
                    let _ = buildit_queue::ack(&delivery).await;
                }
                Err(err) => {
                    warn!(error = %err, "pipeline dispatch failed");
                    let _ = buildit_queue::nack_drop(&delivery).await;
                }
            }
        });
    }

    Ok(())
}
