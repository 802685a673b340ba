//! Wake-up probing for idle AMT hosts.
//!
//! AMT firmware on some machines drops into a low-power listening mode when it
//! has not been contacted for a while. A short burst of ICMP echoes brings it
//! back before the next management request. Only the attempt matters: the
//! probe's own result is logged and discarded.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

/// Something that can nudge a host awake.
#[async_trait]
pub trait WakeProbe: Send + Sync {
    /// Probe `host`. Returns whether the probe itself succeeded.
    async fn probe(&self, host: &str) -> bool;
}

/// Probe using the system `ping` binary (`ping -i 0.2 -c 5 <host>`).
#[derive(Debug, Clone)]
pub struct PingProbe {
    count: u32,
    interval: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            count: 5,
            interval: Duration::from_millis(200),
        }
    }
}

impl PingProbe {
    /// Create a probe sending the default burst of five echoes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Command-line arguments passed to `ping`.
    pub fn args(&self, host: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            format!("{:.1}", self.interval.as_secs_f64()),
            "-c".to_string(),
            self.count.to_string(),
            host.to_string(),
        ]
    }
}

#[async_trait]
impl WakeProbe for PingProbe {
    async fn probe(&self, host: &str) -> bool {
        let status = Command::new("ping")
            .args(self.args(host))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => {
                debug!(host = %host, success = status.success(), "Wake-up ping finished");
                status.success()
            }
            Err(e) => {
                debug!(host = %host, error = %e, "Wake-up ping could not be run");
                false
            }
        }
    }
}

/// Whether a host last contacted at `last_contact` needs a probe at `now`.
///
/// A host that was never contacted always needs one.
pub fn needs_wake(last_contact: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last_contact {
        Some(last) => now.saturating_duration_since(last) > interval,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_args() {
        let args = PingProbe::new().args("10.0.0.5");
        assert_eq!(args, vec!["-i", "0.2", "-c", "5", "10.0.0.5"]);
    }

    #[test]
    fn test_needs_wake() {
        let interval = Duration::from_secs(60);
        let now = Instant::now();

        assert!(needs_wake(None, now, interval));
        assert!(!needs_wake(Some(now), now, interval));
        assert!(!needs_wake(Some(now), now + interval, interval));
        assert!(needs_wake(
            Some(now),
            now + interval + Duration::from_millis(1),
            interval
        ));
    }
}
