//! Output formatting for amtctl
//!
//! Results go to stdout, either as colored text or as one JSON document per
//! command. Wait progress and errors go to stderr.

use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use amtctl::amt::{describe_code, ObservedState, PowerEvent, PowerObserver, PowerState, SetOutcome};

use super::OutputFormat;

/// JSON document printed by `status`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub host: String,
    pub state: String,
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl StatusReport {
    pub fn new(host: &str, observed: ObservedState) -> Self {
        Self {
            host: host.to_string(),
            state: match observed {
                ObservedState::Known(state) => state.to_string(),
                ObservedState::Unknown(_) => "unknown".to_string(),
            },
            code: observed.code(),
            description: describe_code(observed.code()),
        }
    }
}

/// JSON document printed by `set`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SetReport {
    pub host: String,
    pub target: PowerState,
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<StatusReport>,
    pub elapsed_ms: u64,
}

impl SetReport {
    pub fn new(host: &str, target: PowerState, outcome: &SetOutcome, elapsed: Duration) -> Self {
        let (result, last_observed) = match outcome {
            SetOutcome::Requested => ("requested", None),
            SetOutcome::Confirmed(state) => ("confirmed", Some(StatusReport::new(host, (*state).into()))),
            SetOutcome::TimedOut { last_observed } => (
                "timed_out",
                last_observed.map(|observed| StatusReport::new(host, observed)),
            ),
        };
        Self {
            host: host.to_string(),
            target,
            result,
            last_observed,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Prints command results in the selected format
#[derive(Debug, Clone)]
pub struct Printer {
    format: OutputFormat,
    use_color: bool,
}

impl Printer {
    /// Create a new printer
    pub fn new(format: OutputFormat, use_color: bool) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        Self { format, use_color }
    }

    fn paint(&self, text: &str, observed: Option<ObservedState>) -> String {
        if !self.use_color {
            return text.to_string();
        }
        match observed {
            Some(ObservedState::Known(PowerState::On)) => text.green().bold().to_string(),
            Some(ObservedState::Known(PowerState::Off)) => text.red().bold().to_string(),
            Some(_) => text.yellow().bold().to_string(),
            None => text.bold().to_string(),
        }
    }

    /// Render the result of `status`
    pub fn format_status(&self, host: &str, observed: ObservedState) -> String {
        match self.format {
            OutputFormat::Json => to_json(&StatusReport::new(host, observed)),
            OutputFormat::Human => {
                let state = self.paint(&observed.to_string(), Some(observed));
                match describe_code(observed.code()) {
                    Some(description) if observed.state().is_none() => {
                        format!("{}: {} - {}", host, state, description)
                    }
                    _ => format!("{}: {}", host, state),
                }
            }
        }
    }

    /// Render the result of `set`
    pub fn format_set(
        &self,
        host: &str,
        target: PowerState,
        outcome: &SetOutcome,
        elapsed: Duration,
    ) -> String {
        if self.format == OutputFormat::Json {
            return to_json(&SetReport::new(host, target, outcome, elapsed));
        }

        let target_text = self.paint(target.as_str(), Some(target.into()));
        match outcome {
            SetOutcome::Requested => format!("{}: requested {}", host, target_text),
            SetOutcome::Confirmed(_) => format!(
                "{}: {} (confirmed after {:.1}s)",
                host,
                target_text,
                elapsed.as_secs_f64()
            ),
            SetOutcome::TimedOut { last_observed } => {
                let last = match last_observed {
                    Some(observed) => self.paint(&observed.to_string(), Some(*observed)),
                    None => "nothing".to_string(),
                };
                let message = format!(
                    "{}: timed out after {:.1}s waiting for {}, last saw {}",
                    host,
                    elapsed.as_secs_f64(),
                    target_text,
                    last
                );
                if self.use_color {
                    message.yellow().to_string()
                } else {
                    message
                }
            }
        }
    }

    /// Render an error
    pub fn format_error(&self, error: &anyhow::Error) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "error": format!("{:#}", error),
            })),
            OutputFormat::Human if self.use_color => {
                format!("{} {:#}", "error:".red().bold(), error)
            }
            OutputFormat::Human => format!("error: {:#}", error),
        }
    }

    pub fn status(&self, host: &str, observed: ObservedState) {
        println!("{}", self.format_status(host, observed));
    }

    pub fn set(&self, host: &str, target: PowerState, outcome: &SetOutcome, elapsed: Duration) {
        println!("{}", self.format_set(host, target, outcome, elapsed));
    }

    pub fn error(&self, error: &anyhow::Error) {
        match self.format {
            OutputFormat::Json => println!("{}", self.format_error(error)),
            OutputFormat::Human => eprintln!("{}", self.format_error(error)),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

/// Prints wait progress to stderr
#[derive(Debug, Clone)]
pub struct ProgressObserver {
    use_color: bool,
}

impl ProgressObserver {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color: use_color && std::env::var("NO_COLOR").is_err(),
        }
    }

    /// Line printed for `event`, if any
    pub fn line(&self, event: &PowerEvent) -> Option<String> {
        let line = match event {
            PowerEvent::WakeProbe { host } => format!("waking {}", host),
            PowerEvent::Requested { target } => format!("requested {}, waiting", target),
            PowerEvent::Polled {
                attempt,
                observed,
                elapsed,
            } => format!(
                "  [{}] {:>5.1}s  {}",
                attempt,
                elapsed.as_secs_f64(),
                observed
            ),
            PowerEvent::Confirmed { .. } | PowerEvent::TimedOut { .. } => return None,
        };
        Some(if self.use_color {
            line.dimmed().to_string()
        } else {
            line
        })
    }
}

impl PowerObserver for ProgressObserver {
    fn on_event(&self, event: &PowerEvent) {
        if let Some(line) = self.line(event) {
            eprintln!("{}", line);
        }
    }
}
