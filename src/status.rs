// Status resolution: interpret the upload response for an immediate
// result or a follow-up status URL, and drive the polling loop when one is
// requested. The clock and the poll transport are both injected so the
// loop can be tested without real delays or sockets.

use crate::api::UploadResult;
use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const STATUS_SUCCEEDED: &str = "succeeded";
const STATUS_FAILED: &str = "failed";

/// Terminal outcome of one run.
#[derive(Debug)]
pub enum FinalResult {
    Success,
    Failure(Error),
    Unknown,
}

/// URL (and optional credential) for repeated status checks. Derived once
/// from the initial response, immutable for the lifetime of the loop.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub url: String,
    pub auth_token: Option<String>,
}

/// Polling parameters, fixed for the whole loop: no backoff, no iteration
/// cap other than the deadline.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Minutes until the loop gives up; zero or negative means never.
    pub timeout_mins: i64,
}

impl PollConfig {
    fn deadline(&self) -> Option<Duration> {
        if self.timeout_mins <= 0 {
            None
        } else {
            // saturate so an absurd timeout means "effectively never"
            // rather than an overflow
            Some(Duration::from_secs((self.timeout_mins as u64).saturating_mul(60)))
        }
    }
}

/// Transport seam for status checks; implemented by the API client and by
/// test fakes.
pub trait StatusPoller {
    fn poll_status(&self, target: &PollTarget) -> Result<UploadResult>;
}

/// Wall-clock seam for the polling loop: elapsed time since the loop
/// started, and the between-poll sleep.
pub trait Clock {
    fn elapsed(&self) -> Duration;
    fn sleep(&mut self, d: Duration);
}

/// Real clock: `Instant` for elapsed time, `thread::sleep` between polls.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Apply the decision table to the initial upload response and, when a poll
/// URL is present and polling is enabled, run the polling loop to a
/// terminal state or the deadline.
pub fn resolve_status(
    initial: &UploadResult,
    target_token: Option<&str>,
    cfg: &PollConfig,
    poller: &dyn StatusPoller,
    clock: &mut dyn Clock,
) -> Result<FinalResult> {
    match initial.status_url() {
        Some(url) if cfg.enabled => {
            let target = PollTarget {
                url,
                auth_token: target_token.map(str::to_string),
            };
            poll_loop(&target, cfg, poller, clock)
        }
        // A poll URL the caller did not ask to follow is ignored.
        Some(_) => Ok(FinalResult::Unknown),
        None => match initial.status_field().as_deref() {
            Some(STATUS_SUCCEEDED) => Ok(FinalResult::Success),
            Some(other) => Ok(FinalResult::Failure(Error::BackendFailure(other.to_string()))),
            None if cfg.enabled => Err(Error::Protocol),
            None => Ok(FinalResult::Unknown),
        },
    }
}

/// Fixed-interval loop: poll immediately, then sleep between attempts;
/// give up once elapsed wall-clock time reaches the deadline.
fn poll_loop(
    target: &PollTarget,
    cfg: &PollConfig,
    poller: &dyn StatusPoller,
    clock: &mut dyn Clock,
) -> Result<FinalResult> {
    let deadline = cfg.deadline();
    info!(url = %target.url, interval_secs = cfg.interval.as_secs(), "polling for job result");
    loop {
        let res = poller.poll_status(target)?;
        match res.status_field().as_deref() {
            Some(STATUS_SUCCEEDED) => return Ok(FinalResult::Success),
            Some(STATUS_FAILED) => {
                return Ok(FinalResult::Failure(Error::BackendFailure(
                    STATUS_FAILED.to_string(),
                )))
            }
            other => debug!(status = ?other, "job not finished yet"),
        }

        clock.sleep(cfg.interval);
        if let Some(limit) = deadline {
            if clock.elapsed() >= limit {
                return Ok(FinalResult::Failure(Error::Timeout(cfg.timeout_mins)));
            }
        }
    }
}
