//! Power state controller.
//!
//! [`AmtPower`] reads and changes the power state of one AMT host. A change
//! request can optionally wait until the host reports the requested state,
//! polling at a fixed interval until a deadline or a cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::envelope::build_power_state_request;
use super::{
    ObservedState, PowerState, CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE,
    CIM_POWER_MANAGEMENT_SERVICE, POWER_MANAGEMENT_SERVICE_NAME,
};
use crate::error::{Error, Result};
use crate::wsman::{ConnectionConfig, Element, SelectorSet, TransportFailure, WsManClient};

/// Method invoked to request a power state change
pub const REQUEST_POWER_STATE_CHANGE: &str = "RequestPowerStateChange";

/// Default time to wait for a requested state
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between polls while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest delay allowed between polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Options for [`AmtPower::set_power_state`].
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Block until the host reports the requested state
    pub wait: bool,
    /// Upper bound on the wait
    pub timeout: Duration,
    /// Delay before each poll
    pub poll_interval: Duration,
    /// Aborts the wait when cancelled
    pub cancel: Option<CancellationToken>,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            wait: false,
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }
}

impl SetOptions {
    /// Request the change and return immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the change and wait up to `timeout` for it.
    pub fn wait(timeout: Duration) -> Self {
        Self {
            wait: true,
            timeout,
            ..Self::default()
        }
    }

    /// Set the delay between polls, no shorter than [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Abort the wait when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of a successful change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The request was accepted; nobody waited for it.
    Requested,
    /// The host reported the requested state.
    Confirmed(PowerState),
    /// The deadline passed first.
    TimedOut {
        /// The last state polled, if any poll ran
        last_observed: Option<ObservedState>,
    },
}

impl SetOutcome {
    /// Whether the request ended without reaching the target while waiting.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, SetOutcome::TimedOut { .. })
    }
}

/// Progress notifications from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    /// An idle host was probed before the request.
    WakeProbe {
        /// Host that was probed
        host: String,
    },
    /// A change request was accepted.
    Requested {
        /// State asked for
        target: PowerState,
    },
    /// A poll completed while waiting.
    Polled {
        /// 1-based poll number
        attempt: u32,
        /// State the host reported
        observed: ObservedState,
        /// Time since the request was accepted
        elapsed: Duration,
    },
    /// The host reached the requested state.
    Confirmed {
        /// State reached
        target: PowerState,
        /// Time since the request was accepted
        elapsed: Duration,
    },
    /// The wait ran out of time.
    TimedOut {
        /// State asked for
        target: PowerState,
        /// The last state polled
        last_observed: Option<ObservedState>,
    },
}

/// Receives [`PowerEvent`]s.
pub trait PowerObserver: Send + Sync {
    /// Called synchronously for each event.
    fn on_event(&self, event: &PowerEvent);
}

/// Power controller for one host.
pub struct AmtPower {
    client: WsManClient,
    observer: Option<Arc<dyn PowerObserver>>,
}

impl std::fmt::Debug for AmtPower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmtPower")
            .field("client", &self.client)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl AmtPower {
    /// Create a controller talking to the host described by `config`.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self::from_client(WsManClient::new(config)?))
    }

    /// Create a controller on top of an existing client.
    pub fn from_client(client: WsManClient) -> Self {
        Self {
            client,
            observer: None,
        }
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PowerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &WsManClient {
        &self.client
    }

    /// Host this controller talks to.
    pub fn host(&self) -> &str {
        &self.client.config().host
    }

    fn notify(&self, event: PowerEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    async fn wake_up(&mut self) {
        if self.client.wake_up().await {
            let host = self.host().to_string();
            self.notify(PowerEvent::WakeProbe { host });
        }
    }

    /// Query the current power state.
    pub async fn get_power_state(&mut self) -> Result<ObservedState> {
        self.wake_up().await;

        let document = self
            .client
            .get(CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE)
            .await
            .into_result()?;

        let code = document
            .find_first(CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE, "PowerState")
            .and_then(Element::text)
            .and_then(|text| text.parse::<u32>().ok())
            .ok_or_else(|| TransportFailure::MissingField("PowerState".to_string()))?;

        let observed = ObservedState::from_code(code);
        debug!(host = %self.host(), code, state = %observed, "Power state queried");
        Ok(observed)
    }

    /// Request `target` and optionally wait for it.
    pub async fn set_power_state(
        &mut self,
        target: PowerState,
        options: &SetOptions,
    ) -> Result<SetOutcome> {
        self.wake_up().await;

        let body = build_power_state_request(target.code());
        let selectors = SelectorSet::new().with("Name", POWER_MANAGEMENT_SERVICE_NAME);
        self.client
            .invoke(
                CIM_POWER_MANAGEMENT_SERVICE,
                REQUEST_POWER_STATE_CHANGE,
                Some(&body),
                &selectors,
            )
            .await
            .into_result()?;

        info!(host = %self.host(), requested = %target, "Power state change requested");
        self.notify(PowerEvent::Requested { target });

        if !options.wait {
            return Ok(SetOutcome::Requested);
        }
        self.wait_for(target, options).await
    }

    /// Parse `name` and request that state.
    ///
    /// An unknown name fails before anything is sent.
    pub async fn set_power_state_named(
        &mut self,
        name: &str,
        options: &SetOptions,
    ) -> Result<SetOutcome> {
        let target: PowerState = name.parse()?;
        self.set_power_state(target, options).await
    }

    /// Poll for `target` until `start + timeout`.
    ///
    /// The last sleep is cut short at the deadline, where one final poll runs.
    async fn wait_for(&mut self, target: PowerState, options: &SetOptions) -> Result<SetOutcome> {
        let cancel = options.cancel.clone().unwrap_or_else(CancellationToken::new);
        let poll_interval = options.poll_interval.max(MIN_POLL_INTERVAL);
        let start = Instant::now();
        let deadline = start + options.timeout;
        let mut last_observed = None;
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            let wake_at = (Instant::now() + poll_interval).min(deadline);
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(host = %self.host(), requested = %target, "Wait cancelled");
                    return Err(Error::Cancelled);
                }
                _ = sleep_until(wake_at) => {}
            }

            attempt += 1;
            let observed = self.get_power_state().await?;
            last_observed = Some(observed);
            let elapsed = start.elapsed();
            self.notify(PowerEvent::Polled {
                attempt,
                observed,
                elapsed,
            });

            if observed == ObservedState::Known(target) {
                info!(host = %self.host(), requested = %target, ?elapsed, "Power state confirmed");
                self.notify(PowerEvent::Confirmed { target, elapsed });
                return Ok(SetOutcome::Confirmed(target));
            }
        }

        warn!(
            host = %self.host(),
            requested = %target,
            last = ?last_observed,
            "Timed out waiting for power state"
        );
        self.notify(PowerEvent::TimedOut {
            target,
            last_observed,
        });
        Ok(SetOutcome::TimedOut { last_observed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_options_defaults() {
        let options = SetOptions::default();
        assert!(!options.wait);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert!(options.cancel.is_none());
    }

    #[test]
    fn test_set_options_builder() {
        let token = CancellationToken::new();
        let options = SetOptions::wait(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(250))
            .with_cancel(token);

        assert!(options.wait);
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert!(options.cancel.is_some());
    }

    #[test]
    fn test_poll_interval_floor() {
        let options = SetOptions::wait(Duration::from_secs(5)).with_poll_interval(Duration::ZERO);
        assert_eq!(options.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_outcome_timed_out() {
        assert!(SetOutcome::TimedOut { last_observed: None }.is_timed_out());
        assert!(!SetOutcome::Confirmed(PowerState::On).is_timed_out());
        assert!(!SetOutcome::Requested.is_timed_out());
    }

    #[tokio::test]
    async fn test_named_invalid_state_fails_before_network() {
        // Port 9 on a TEST-NET address; nothing may be sent anyway.
        let config = ConnectionConfig::parse("192.0.2.1:9", "admin", "pw").unwrap();
        let mut power = AmtPower::new(config).unwrap();

        let err = power
            .set_power_state_named("hibernate", &SetOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, Error::InvalidPowerState("hibernate".to_string()));
        assert!(power.client().last_contact().is_none());
    }
}
