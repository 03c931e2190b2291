//! The worker pool controller (C9): watches the job queue depth, drains a
//! bounded number of messages per tick, and spawns one short-lived
//! Kubernetes Pod per message to run the job executor.
//!
//! Grounded on the original implementation's
//! `operator/hpa/internal/controller/poolscaler_controller.go`
//! (`Reconcile`/`reconcileDeploymentScaling`/`createWorkerPod`/
//! `processSingleMessage`) — rebuilt as a plain polling loop over
//! `kube::Api<Pod>` rather than a controller-runtime CRD reconciler, since
//! there is no PoolScaler custom resource here: the tuning knobs that
//! would live in its spec are read straight from the environment
//! (`buildit_config::system::WorkerPoolConfig`).

pub mod error;

use std::collections::BTreeMap;
use std::time::Duration;

use buildit_config::system::{EnvConfig, WorkerPoolConfig};
use buildit_queue::QueueClient;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, PostParams};
use tracing::{error, info, warn};

pub use error::{ControllerError, ControllerResult};

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub struct WorkerPoolController {
    client: Client,
    queue: QueueClient,
    env: EnvConfig,
    config: WorkerPoolConfig,
}

impl WorkerPoolController {
    pub fn new(client: Client, queue: QueueClient, env: EnvConfig, config: WorkerPoolConfig) -> Self {
        Self { client, queue, env, config }
    }

    /// Run the reconciliation loop forever, polling the job queue on a
    /// fixed interval and spawning up to `max_messages_per_poll` worker
    /// pods per tick.
    pub async fn run(&self) -> ! {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.poll_interval_seconds));
        loop {
            ticker.tick().await;
            if let Err(err) = self.reconcile_once().await {
                error!(error = %err, "worker pool reconciliation failed");
            }
        }
    }

    /// One reconciliation pass: read the job queue's current depth, drain
    /// up to that many messages (capped at `max_messages_per_poll`), and
    /// spawn one worker pod per message. A message whose pod fails to
    /// create is requeued for the next poll; a successfully spawned pod's
    /// message is acknowledged.
    pub async fn reconcile_once(&self) -> ControllerResult<()> {
        let depth = self.queue.message_count(&self.env.queue.job_queue_name).await?;
        let to_process = depth.min(self.config.max_messages_per_poll);

        if to_process == 0 {
            return Ok(());
        }

        info!(depth, to_process, "draining job queue");

        for index in 0..to_process {
            let delivery = match self.queue.get_one(&self.env.queue.job_queue_name).await? {
                Some(delivery) => delivery,
                None => break,
            };

            match self.spawn_worker_pod(index, &delivery.data).await {
                Ok(pod_name) => {
                    buildit_queue::ack(&delivery).await?;
                    info!(pod = %pod_name, "spawned worker pod");
                }
                Err(err) => {
                    warn!(error = %err, "failed to create worker pod, requeueing message");
                    buildit_queue::nack_requeue(&delivery).await?;
                }
            }
        }

        Ok(())
    }

    async fn spawn_worker_pod(&self, index: u32, message_body: &[u8]) -> ControllerResult<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let pod = self.build_worker_pod(index, message_body);
        let name = pod.metadata.name.clone().unwrap_or_default();
        pods.create(&PostParams::default(), &pod).await?;
        Ok(name)
    }

    fn build_worker_pod(&self, index: u32, message_body: &[u8]) -> Pod {
        let job_json = String::from_utf8_lossy(message_body).into_owned();
        let pod_name = format!("buildit-worker-{}-{index}", uuid::Uuid::new_v4());

        let mut env_vars = vec![
            env_var("RABBITMQ_URL", &self.env.queue.rabbitmq_url),
            env_var("TASK_QUEUE", &self.env.queue.task_queue),
            env_var("JOB_QUEUE_URL", &self.env.queue.job_queue_url),
            env_var("JOB_QUEUE_NAME", &self.env.queue.job_queue_name),
            env_var("DB_HOST", &self.env.db.host),
            env_var("DB_PORT", &self.env.db.port.to_string()),
            env_var("DB_USER", &self.env.db.user),
            env_var("DB_NAME", &self.env.db.name),
            env_var("DB_PASSWORD", &self.env.db.password),
            env_var("MINIO_ENDPOINT", &self.env.minio.endpoint),
            env_var("MINIO_ACCESS_KEY", &self.env.minio.access_key),
            env_var("MINIO_SECRET_KEY", &self.env.minio.secret_key),
            env_var("DEFAULT_BUCKET", &self.env.minio.default_bucket),
            env_var("REDIS_HOST", &self.env.redis.host),
            env_var("REDIS_PORT", &self.env.redis.port.to_string()),
        ];
        if let Some(ssl_mode) = &self.env.db.ssl_mode {
            env_vars.push(env_var("DB_SSL_MODE", ssl_mode));
        }
        if let Some(ssl_ca) = &self.env.db.ssl_ca {
            env_vars.push(env_var("DB_SSL_CA", ssl_ca));
        }
        if let Some(username) = &self.env.redis.username {
            env_vars.push(env_var("REDIS_USERNAME", username));
        }
        if let Some(password) = &self.env.redis.password {
            env_vars.push(env_var("REDIS_PASSWORD", password));
        }

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "buildit-worker".to_string());

        Pod {
            metadata: ObjectMeta {
                name: Some(pod_name),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                restart_policy: Some("Never".to_string()),
                containers: vec![Container {
                    name: "worker".to_string(),
                    image: Some(self.config.worker_image.clone()),
                    args: Some(vec!["--job".to_string(), job_json]),
                    env: Some(env_vars),
                    resources: Some(ResourceRequirements {
                        requests: Some(BTreeMap::from([
                            ("cpu".to_string(), Quantity("500m".to_string())),
                            ("memory".to_string(), Quantity("256Mi".to_string())),
                        ])),
                        limits: Some(BTreeMap::from([
                            ("cpu".to_string(), Quantity("500m".to_string())),
                            ("memory".to_string(), Quantity("512Mi".to_string())),
                        ])),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                termination_grace_period_seconds: Some(30),
                ..Default::default()
            }),
            status: None,
        }
    }
}
