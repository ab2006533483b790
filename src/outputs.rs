// Runner output convention: named outputs are appended as `name=value`
// lines to the file the runner points at via `GITHUB_OUTPUT`. When the
// variable is unset (local runs, tests) the value is only logged.

use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

pub struct Outputs {
    file: Option<PathBuf>,
}

impl Outputs {
    pub fn from_env() -> Self {
        let file = std::env::var("GITHUB_OUTPUT")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Outputs { file }
    }

    pub fn new(file: Option<PathBuf>) -> Self {
        Outputs { file }
    }

    /// Set a named output. Values are single-line.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        info!(output = name, value, "setting run output");
        if let Some(path) = &self.file {
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
