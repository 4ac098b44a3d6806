use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use harness_core::{
    compare_scan_at, compare_stages, BuildHandle, ConfigValues, EnvPair, HarnessSettings,
    TriggerSettings, SONAR_SCAN_GOLDEN,
};
use harness_runner::{
    ArtifactVerifier, CompletionWatcher, Harness, NamedPipelineRun, OcBuildApiFactory,
    PipelineFileRun, ProcessRunner, ResultCollector, WebhookTrigger,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pipeline-harness", version, about = "Trigger, await and verify CI pipeline runs")]
struct Cli {
    /// Key/value configuration file (secrets, base domain, image tag).
    #[arg(long, env = "HARNESS_CONFIG", default_value = "../../ods-configuration/ods-core.env")]
    config: PathBuf,

    /// Optional TOML file tuning polling and helper script paths.
    #[arg(long, env = "HARNESS_SETTINGS")]
    settings: Option<PathBuf>,

    /// Directory helper scripts are resolved against.
    #[arg(long, env = "HARNESS_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Trigger a pipeline file, wait for it and collect its stages.
    Run {
        #[arg(long)]
        repository: String,
        #[arg(long)]
        repository_project: String,
        #[arg(long, default_value = "master")]
        branch: String,
        #[arg(long)]
        project: String,
        #[arg(long, default_value = "Jenkinsfile")]
        pipeline_path: String,
        /// Namespace of the webhook proxy and the build.
        #[arg(long)]
        namespace: String,
        /// Extra env pair, NAME=value. Repeatable.
        #[arg(long = "env")]
        env: Vec<EnvPair>,
        /// Golden stage record to compare against.
        #[arg(long)]
        golden: Option<PathBuf>,
        #[arg(long, default_value = "")]
        component: String,
        #[arg(long, default_value = "run")]
        run_kind: String,
        /// Artifact that must be retrievable from the run. Repeatable.
        #[arg(long = "artifact")]
        artifacts: Vec<String>,
        /// Writes `stages.txt` here.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Trigger an existing pipeline by name and wait for it.
    RunPipeline {
        #[arg(long)]
        repository_project: String,
        #[arg(long)]
        repository: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        pipeline: String,
        #[arg(long, env = "HARNESS_TRIGGER_SECRET")]
        trigger_secret: String,
        #[arg(long = "env")]
        env: Vec<EnvPair>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Wait for an already triggered build.
    Await {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        build: String,
    },
    /// Fetch log and stages of a build.
    Collect {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        build: String,
        /// Writes `build.log` and `stages.txt` here instead of stdout.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    VerifyArtifacts {
        #[arg(long)]
        project: String,
        #[arg(long)]
        build: String,
        #[arg(long = "artifact")]
        artifacts: Vec<String>,
    },
    CompareStages {
        #[arg(long)]
        component: String,
        #[arg(long, default_value = "run")]
        run_kind: String,
        #[arg(long)]
        golden: PathBuf,
        /// File with the captured stage trace.
        #[arg(long)]
        actual: PathBuf,
    },
    CompareScan {
        #[arg(long)]
        component: String,
        #[arg(long, default_value = SONAR_SCAN_GOLDEN)]
        golden: PathBuf,
        #[arg(long)]
        actual: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cancel = ctrl_c_cancel();

    // A running watcher sees the signal on its own channel and stops with the
    // build name; any other step is dropped where it stands.
    tokio::select! {
        biased;
        res = run(cli, cancel.clone()) => res,
        () = interrupted(cancel) => bail!("interrupted"),
    }
}

async fn run(cli: Cli, cancel: watch::Receiver<bool>) -> Result<()> {
    let settings = match &cli.settings {
        Some(path) => HarnessSettings::load_from(path)?,
        None => HarnessSettings::default(),
    };
    let runner = ProcessRunner::new(&cli.base_dir);

    match cli.cmd {
        Cmd::Run {
            repository,
            repository_project,
            branch,
            project,
            pipeline_path,
            namespace,
            env,
            golden,
            component,
            run_kind,
            artifacts,
            out_dir,
        } => {
            let values = load_values(&cli.config)?;
            let trigger_settings = TriggerSettings::from_values(&values)?;
            let trigger = WebhookTrigger::new(&namespace, &trigger_settings.apps_base_domain)?;
            let harness = harness(trigger, &settings, runner.clone(), cancel)?;

            let run = PipelineFileRun {
                repository,
                repository_project,
                branch,
                project: project.clone(),
                pipeline_path,
                extra_env: env,
            };
            let record = harness.run_pipeline_file(&run, &trigger_settings).await?;
            if let Some(dir) = out_dir {
                write_out(&dir, "stages.txt", &record.stage_trace).await?;
            }

            if let Some(golden) = golden {
                compare_stages(&component, &run_kind, &golden, &record.stage_trace)?;
                info!(component = %component, run_kind = %run_kind, "stages match golden record");
            }
            ArtifactVerifier::new(runner, &settings.scripts.artifact)
                .verify(&project, record.handle.name(), &artifacts)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Cmd::RunPipeline {
            repository_project,
            repository,
            namespace,
            pipeline,
            trigger_secret,
            env,
            out_dir,
        } => {
            let values = load_values(&cli.config)?;
            let domain = values.require("OPENSHIFT_APPS_BASEDOMAIN")?;
            let trigger = WebhookTrigger::new(&namespace, domain)?;
            let harness = harness(trigger, &settings, runner, cancel)?;

            let run = NamedPipelineRun {
                repository_project,
                repository,
                pipeline_name: pipeline,
                trigger_secret,
                extra_env: env,
            };
            let record = harness.run_named_pipeline(&run).await?;
            if let Some(dir) = out_dir {
                write_out(&dir, "stages.txt", &record.stage_trace).await?;
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Cmd::Await { namespace, build } => {
            let outcome = watcher(&settings, runner, cancel)?
                .await_build(&BuildHandle::new(namespace, build))
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Cmd::Collect {
            namespace,
            build,
            out_dir,
        } => {
            let collected = ResultCollector::new(runner, &settings.scripts)
                .collect(&namespace, &build)
                .await?;
            match out_dir {
                Some(dir) => {
                    write_out(&dir, "build.log", &collected.log).await?;
                    write_out(&dir, "stages.txt", &collected.stage_trace).await?;
                }
                None => print!("{}", collected.stage_trace),
            }
        }
        Cmd::VerifyArtifacts {
            project,
            build,
            artifacts,
        } => {
            ArtifactVerifier::new(runner, &settings.scripts.artifact)
                .verify(&project, &build, &artifacts)
                .await?;
        }
        Cmd::CompareStages {
            component,
            run_kind,
            golden,
            actual,
        } => {
            let actual = read_actual(&actual).await?;
            compare_stages(&component, &run_kind, &golden, &actual)?;
        }
        Cmd::CompareScan {
            component,
            golden,
            actual,
        } => {
            let actual = read_actual(&actual).await?;
            compare_scan_at(&component, &golden, &actual)?;
        }
    }
    Ok(())
}

fn load_values(path: &Path) -> Result<ConfigValues> {
    ConfigValues::load_from(path).with_context(|| format!("loading configuration {}", path.display()))
}

fn watcher(
    settings: &HarnessSettings,
    runner: ProcessRunner,
    cancel: watch::Receiver<bool>,
) -> Result<CompletionWatcher<OcBuildApiFactory<ProcessRunner>>> {
    let factory = OcBuildApiFactory::new(
        runner,
        settings.cluster.insecure_skip_tls_verify,
        settings.cluster.request_timeout(),
    );
    Ok(CompletionWatcher::new(factory, settings.watch_policy()?).with_cancel(cancel))
}

fn harness(
    trigger: WebhookTrigger,
    settings: &HarnessSettings,
    runner: ProcessRunner,
    cancel: watch::Receiver<bool>,
) -> Result<Harness<OcBuildApiFactory<ProcessRunner>, ProcessRunner>> {
    let watcher = watcher(settings, runner.clone(), cancel)?;
    let collector = ResultCollector::new(runner, &settings.scripts);
    Ok(Harness::new(trigger, watcher, collector))
}

/// Flips to `true` on Ctrl-C.
fn ctrl_c_cancel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
        }
    });
    rx
}

/// Resolves once cancellation is requested. A closed channel never resolves.
async fn interrupted(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn read_actual(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))
}

async fn write_out(dir: &Path, name: &str, contents: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("write {}", path.display()))
}
