//! `Executor` implementation over the local Docker daemon, grounded on
//! the original implementation's `executor/containers/docker/api.go`:
//! pull, create (commands joined with `" && "` under `sh -c`, then
//! renamed to `<prefix>_<containerId>`), start, wait, collect logs,
//! force-remove.

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    RenameContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use futures::StreamExt;

use async_trait::async_trait;
use buildit_core::executor::{ContainerResult, Executor, JobSpec};
use buildit_core::{Error, Result};

pub struct DockerExecutor {
    docker: Docker,
}

impl DockerExecutor {
    /// Connect using the same defaults as the Docker CLI
    /// (`DOCKER_HOST`/TLS env vars, falling back to the local socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|err| Error::ExecutionFailed(format!("docker connect: {err}")))?;
        Ok(Self { docker })
    }

    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|err| Error::ExecutionFailed(format!("pull {image}: {err}")))?;
        }
        Ok(())
    }

    async fn create_container(&self, prefix: &str, spec: &JobSpec) -> Result<String> {
        let joined = spec.commands.join(" && ");
        let cmd = vec!["sh".to_string(), "-c".to_string(), joined];

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(cmd),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|err| Error::ExecutionFailed(format!("create container: {err}")))?;

        let new_name = format!("{prefix}_{}", response.id);
        self.docker
            .rename_container(&response.id, RenameContainerOptions { name: new_name })
            .await
            .map_err(|err| Error::ExecutionFailed(format!("rename container: {err}")))?;

        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container::<String>(container_id, None)
            .await
            .map_err(|err| Error::ExecutionFailed(format!("start container {container_id}: {err}")))
    }

    async fn wait_container(&self, container_id: &str) -> Result<ContainerResult> {
        let options = Some(WaitContainerOptions {
            condition: "not-running",
        });
        let mut stream = self.docker.wait_container(container_id, options);
        match stream.next().await {
            Some(Ok(status)) => Ok(ContainerResult {
                exit_code: status.status_code,
            }),
            Some(Err(err)) => Err(Error::ExecutionFailed(format!(
                "wait container {container_id}: {err}"
            ))),
            None => Err(Error::ExecutionFailed(format!(
                "wait container {container_id}: no status reported"
            ))),
        }
    }

    async fn container_logs(&self, container_id: &str) -> Result<Vec<u8>> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            ..Default::default()
        });
        let mut stream = self.docker.logs(container_id, options);
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|err| Error::ExecutionFailed(format!("container logs {container_id}: {err}")))?;
            buffer.extend_from_slice(&chunk.into_bytes());
        }
        Ok(buffer)
    }

    async fn delete_container(&self, container_id: &str) -> Result<()> {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        match self.docker.remove_container(container_id, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(err) => Err(Error::ExecutionFailed(format!(
                "remove container {container_id}: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_commands_with_and_under_a_single_shell_invocation() {
        let spec = JobSpec {
            image: "maven:3.8.6".to_string(),
            commands: vec![
                "git clone --no-checkout https://example.com/repo.git /tmp/repo".to_string(),
                "cd /tmp/repo".to_string(),
                "git checkout abc123".to_string(),
                "mvn test".to_string(),
            ],
        };
        let joined = spec.commands.join(" && ");
        assert_eq!(
            joined,
            "git clone --no-checkout https://example.com/repo.git /tmp/repo && cd /tmp/repo && git checkout abc123 && mvn test"
        );
    }

    // Exercising pull/create/start/wait/logs/delete requires a live Docker
    // daemon; run with `cargo test -- --ignored` against one.
    #[tokio::test]
    #[ignore]
    async fn runs_a_trivial_container_to_completion() {
        let executor = DockerExecutor::connect().expect("connect to docker");
        let spec = JobSpec {
            image: "alpine:latest".to_string(),
            commands: vec!["echo hello".to_string()],
        };
        executor.pull_image(&spec.image).await.unwrap();
        let id = executor.create_container("buildit_test", &spec).await.unwrap();
        executor.start_container(&id).await.unwrap();
        let result = executor.wait_container(&id).await.unwrap();
        assert!(result.succeeded());
        let logs = executor.container_logs(&id).await.unwrap();
        assert!(String::from_utf8_lossy(&logs).contains("hello"));
        executor.delete_container(&id).await.unwrap();
    }
}
