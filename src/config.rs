// Run configuration. Built once in `main` from the pipeline-input
// environment convention (`INPUT_*` variables) and passed down explicitly;
// no component reads the environment on its own.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Where the payload comes from: a local path, or a named artifact fetched
/// from the artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Artifact(String),
}

/// How the payload is encoded on the wire. Selected once at startup, never
/// auto-negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// POST the bytes directly as the body, `application/octet-stream`,
    /// no Authorization header.
    RawBinary,
    /// POST a multipart form with the bytes in a field named `artifact`.
    Multipart,
    /// POST raw bytes with a bearer-token Authorization header.
    AuthenticatedBinary,
}

impl UploadMode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(UploadMode::RawBinary),
            "multipart" => Ok(UploadMode::Multipart),
            "authenticated" => Ok(UploadMode::AuthenticatedBinary),
            other => bail!("unknown upload mode {other:?} (expected raw, multipart or authenticated)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub api_url: String,
    pub api_token: Option<String>,
    pub mode: UploadMode,
    pub poll: bool,
    pub poll_interval: Duration,
    /// Poll deadline in minutes; zero or negative means never time out.
    pub poll_timeout_mins: i64,
    /// Scratch directory for temporary archives.
    pub temp_dir: PathBuf,
}

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_POLL_TIMEOUT_MINS: i64 = 30;

fn input(name: &str) -> Option<String> {
    std::env::var(format!("INPUT_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Read the run configuration from the runner's `INPUT_*` environment
    /// variables. Exactly one of `SOURCE_PATH` and `ARTIFACT_NAME` must be
    /// set; everything else has a default except `API_URL`.
    pub fn from_env() -> Result<Self> {
        let source = match (input("SOURCE_PATH"), input("ARTIFACT_NAME")) {
            (Some(path), None) => Source::Path(PathBuf::from(path)),
            (None, Some(name)) => Source::Artifact(name),
            (Some(_), Some(_)) => bail!("set either SOURCE_PATH or ARTIFACT_NAME, not both"),
            (None, None) => bail!("one of SOURCE_PATH or ARTIFACT_NAME is required"),
        };

        let api_url = input("API_URL").context("API_URL input is required")?;
        let api_token = input("API_TOKEN");

        let mode = match input("UPLOAD_MODE") {
            Some(raw) => UploadMode::parse(raw.trim())?,
            None => UploadMode::RawBinary,
        };
        if mode == UploadMode::AuthenticatedBinary && api_token.is_none() {
            bail!("upload mode \"authenticated\" requires an API_TOKEN input");
        }

        let poll = match input("POLL") {
            Some(v) => parse_bool(&v)?,
            None => false,
        };
        let poll_interval = match input("POLL_INTERVAL") {
            Some(v) => {
                let secs: u64 = v.trim().parse().context("POLL_INTERVAL must be a number of seconds")?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        };
        let poll_timeout_mins = match input("POLL_TIMEOUT") {
            Some(v) => v.trim().parse().context("POLL_TIMEOUT must be a number of minutes")?,
            None => DEFAULT_POLL_TIMEOUT_MINS,
        };

        // Runner-provided scratch space, falling back to the OS default.
        let temp_dir = std::env::var("RUNNER_TEMP")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Ok(Config {
            source,
            api_url,
            api_token,
            mode,
            poll,
            poll_interval,
            poll_timeout_mins,
            temp_dir,
        })
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("expected a boolean for POLL, got {other:?}"),
    }
}
