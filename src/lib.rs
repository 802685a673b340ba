//! # amtctl - Out-of-band power control for Intel AMT hosts
//!
//! amtctl talks to the Intel Active Management Technology service of a machine
//! over WS-Management (SOAP over HTTP) to read and change its power state
//! without any help from the operating system running on it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  CLI (status / set)                      │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │          AmtPower (get / set / wait for state)           │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │   WsManClient (wake-up probe, response classification)   │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │       WsManTransport (SOAP over HTTP, digest auth)       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use amtctl::prelude::*;
//!
//! # async fn example() -> amtctl::Result<()> {
//! let config = ConnectionConfig::parse("10.0.0.5", "admin", "secret")?;
//! let mut power = AmtPower::new(config)?;
//!
//! println!("host is {}", power.get_power_state().await?);
//!
//! match power
//!     .set_power_state(PowerState::On, &SetOptions::wait(Duration::from_secs(30)))
//!     .await?
//! {
//!     SetOutcome::Confirmed(state) => println!("host is {}", state),
//!     other => println!("not confirmed: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub mod amt;
pub mod config;
pub mod error;
pub mod wsman;

pub use error::{Error, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::amt::{
        AmtPower, ObservedState, PowerEvent, PowerObserver, PowerState, SetOptions, SetOutcome,
    };
    pub use crate::config::{Config, Overrides};
    pub use crate::error::{Error, Result};
    pub use crate::wsman::{ConnectionConfig, Outcome, Scheme, WsManClient, WsManTransport};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
