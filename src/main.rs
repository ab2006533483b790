// Entrypoint for the upload step.
// - Keeps `main` small: read the configuration, run the pipeline, set the
//   `result` output, and turn any error into a failed run.
// - The `result` output is deliberately left unset when the run fails.

use artifact_uplink::artifact::LocalArtifactStore;
use artifact_uplink::config::Config;
use artifact_uplink::outputs::Outputs;
use artifact_uplink::run::run;
use artifact_uplink::status::FinalResult;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match try_run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let outputs = Outputs::from_env();

    // Runner-local artifact store; only consulted when the source is an
    // artifact name.
    let artifacts_root = std::env::var("RUNNER_ARTIFACTS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config.temp_dir.join("artifacts"));
    let store = LocalArtifactStore::new(artifacts_root);

    match run(&config, &store)? {
        FinalResult::Success => {
            outputs.set("result", "success")?;
            info!("upload completed, backend reported success");
        }
        FinalResult::Unknown => {
            outputs.set("result", "unknown")?;
            info!("upload completed, no backend verdict");
        }
        FinalResult::Failure(err) => return Err(err.into()),
    }
    Ok(())
}
