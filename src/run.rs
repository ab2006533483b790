// The pipeline itself: resolve the payload, upload it, interpret the
// response. Strictly sequential; each stage's output feeds the next and no
// stage retries an earlier one.

use crate::api::ApiClient;
use crate::artifact::{self, ArtifactStore};
use crate::config::{Config, Source};
use crate::error::Result;
use crate::payload;
use crate::status::{resolve_status, FinalResult, PollConfig, SystemClock};

/// Execute one run end to end. Exactly one payload is produced and exactly
/// one upload happens; polling only occurs when requested and offered.
pub fn run(config: &Config, store: &dyn ArtifactStore) -> Result<FinalResult> {
    let payload = match &config.source {
        Source::Path(path) => payload::resolve(path, &config.temp_dir)?,
        Source::Artifact(name) => {
            artifact::payload_from_artifact(store, name, &config.temp_dir)?
        }
    };

    let client = ApiClient::new(&config.api_url, config.api_token.clone())?;
    let initial = client.upload(&payload, config.mode)?;

    let poll_cfg = PollConfig {
        enabled: config.poll,
        interval: config.poll_interval,
        timeout_mins: config.poll_timeout_mins,
    };
    let mut clock = SystemClock::new();
    resolve_status(
        &initial,
        config.api_token.as_deref(),
        &poll_cfg,
        &client,
        &mut clock,
    )
}
