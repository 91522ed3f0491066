//! Dialing the bridge socket
//!
//! The bridge process is started by typing a command into a tmux pane, so
//! there is no signal for when its socket is bound. The listener retries
//! the connect with backoff until it succeeds or the attempts run out.

use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;

use rdv_core::config::BackoffConfig;
use rdv_core::error::DialError;

/// Connect to the bridge socket at `path`, retrying per `policy`
pub async fn dial_bridge(path: &Path, policy: &BackoffConfig) -> Result<UnixStream, DialError> {
    let mut delays = retry_delays(policy);
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match UnixStream::connect(path).await {
            Ok(stream) => {
                tracing::debug!(path = ?path, attempt, "bridge socket connected");
                return Ok(stream);
            }
            Err(source) if attempt >= max_attempts => {
                return Err(DialError::Exhausted {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                let delay = delays.next().unwrap_or(policy.max);
                tracing::trace!(
                    path = ?path,
                    attempt,
                    "bridge socket not ready ({}), retrying in {:?}",
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Pauses between attempts
///
/// Each pause grows by `multiplier` up to `max`, then gets up to `jitter`
/// of itself added at random. Out-of-range factors saturate rather than
/// panic.
fn retry_delays(policy: &BackoffConfig) -> impl Iterator<Item = Duration> + '_ {
    std::iter::successors(Some(policy.initial), move |prev| {
        let next = Duration::try_from_secs_f64(prev.as_secs_f64() * policy.multiplier);
        Some(next.map_or(policy.max, |next| next.min(policy.max)))
    })
    .map(move |delay| {
        let extra = delay.as_secs_f64() * policy.jitter * rand::random::<f64>();
        delay.saturating_add(Duration::try_from_secs_f64(extra).unwrap_or_default())
    })
}
