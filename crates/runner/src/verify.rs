use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::process::{CommandError, CommandRunner};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("could not get artifact {artifact} of build {build} in project {project}")]
    Fetch {
        artifact: String,
        project: String,
        build: String,
        #[source]
        source: CommandError,
    },
}

/// Confirms that documents produced by a run can be retrieved.
#[derive(Debug, Clone)]
pub struct ArtifactVerifier<R> {
    runner: R,
    fetch_script: PathBuf,
}

impl<R: CommandRunner> ArtifactVerifier<R> {
    pub fn new(runner: R, fetch_script: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            fetch_script: fetch_script.into(),
        }
    }

    /// Stops at the first artifact that cannot be fetched.
    pub async fn verify<S: AsRef<str>>(
        &self,
        project: &str,
        build: &str,
        artifacts: &[S],
    ) -> Result<(), ArtifactError> {
        for artifact in artifacts {
            let artifact = artifact.as_ref();
            info!(artifact, project, build, "getting artifact");
            self.runner
                .run(&self.fetch_script, &[build, project, artifact])
                .await
                .map_err(|source| ArtifactError::Fetch {
                    artifact: artifact.to_string(),
                    project: project.to_string(),
                    build: build.to_string(),
                    source,
                })?;
            info!(artifact, project, build, "found artifact");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeFetcher {
        missing: Vec<&'static str>,
        fetched: Mutex<Vec<String>>,
    }

    impl CommandRunner for FakeFetcher {
        async fn run(&self, _program: &Path, args: &[&str]) -> Result<CommandOutput, CommandError> {
            let artifact = args[2];
            self.fetched.lock().unwrap().push(artifact.to_string());
            if self.missing.contains(&artifact) {
                return Err(CommandError::Failed {
                    program: "get-artifact-from-jenkins-run.sh".into(),
                    args: args.iter().map(|a| a.to_string()).collect(),
                    status: "exit status: 1".into(),
                    stdout: String::new(),
                    stderr: "404".into(),
                });
            }
            Ok(CommandOutput::default())
        }
    }

    fn verifier(missing: Vec<&'static str>) -> ArtifactVerifier<FakeFetcher> {
        ArtifactVerifier::new(
            FakeFetcher {
                missing,
                fetched: Mutex::new(vec![]),
            },
            "tests/scripts/get-artifact-from-jenkins-run.sh",
        )
    }

    #[tokio::test]
    async fn empty_list_never_calls_fetcher() {
        let v = verifier(vec![]);
        v.verify::<&str>("proj1", "b-1", &[]).await.unwrap();
        assert!(v.runner.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_artifacts_present() {
        let v = verifier(vec![]);
        v.verify("proj1", "b-1", &["SCRR-proj1.docx", "DTR-proj1.zip"])
            .await
            .unwrap();
        assert_eq!(v.runner.fetched.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn first_missing_artifact_aborts() {
        let v = verifier(vec!["B"]);
        let err = v.verify("proj1", "b-1", &["A", "B", "C"]).await.unwrap_err();
        let ArtifactError::Fetch { artifact, .. } = &err;
        assert_eq!(artifact, "B");
        assert!(err.to_string().contains("artifact B"));
        assert_eq!(*v.runner.fetched.lock().unwrap(), vec!["A", "B"]);
    }
}
