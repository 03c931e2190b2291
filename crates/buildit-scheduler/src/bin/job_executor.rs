//! One-shot job executor entry point: receives a single job-queue
//! message as a JSON command-line argument, runs it, and exits. This is
//! the process the worker pool controller (C9) spawns one pod per
//! message for, matching the original implementation's
//! `executor/main.go` (`flag.String("job", ...)`).

use buildit_cache::Waitboard;
use buildit_config::system::EnvConfig;
use buildit_core::queue::JobQueueMessage;
use buildit_db::{PgReportRepo, create_pool};
use buildit_executor::DockerExecutor;
use buildit_scheduler::JobExecutor;
use buildit_storage::LogSink;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "buildit-job-executor")]
struct Cli {
    /// JSON-encoded job-queue message to execute.
    #[arg(long)]
    job: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let message: JobQueueMessage = serde_json::from_str(&cli.job)?;

    let env = EnvConfig::from_env()?;

    let db_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        env.db.user, env.db.password, env.db.host, env.db.port, env.db.name
    );
    let pool = create_pool(&db_url).await?;
    let reports = PgReportRepo::new(pool);

    let waitboard = Waitboard::connect(
        &env.redis.host,
        env.redis.port,
        env.redis.username.as_deref(),
        env.redis.password.as_deref(),
    )
    .await?;

    let storage = LogSink::init(
        &env.minio.endpoint,
        &env.minio.access_key,
        &env.minio.secret_key,
        &env.minio.default_bucket,
    )
    .await?;

    let driver = DockerExecutor::connect()?;

    let executor = JobExecutor::new(
        Box::new(reports),
        waitboard,
        storage,
        Box::new(driver),
    );

    let job_id = message.job_id;
    executor.run(message).await?;
    info!(job_id, "job execution complete");

    Ok(())
}
