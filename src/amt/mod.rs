//! Intel AMT power control.
//!
//! AMT exposes power control through the CIM power management profile:
//! the current state is read from `CIM_AssociatedPowerManagementService` and a
//! change is requested by invoking `RequestPowerStateChange` on
//! `CIM_PowerManagementService`.
//!
//! The power states as defined by AMT:
//!
//! ```text
//!   2: Power On                   10: Master Bus Reset
//!   3: Sleep - Light              11: Diagnostic Interrupt (NMI)
//!   4: Sleep - Deep               12: Power Off - Soft Graceful
//!   5: Power Cycle (Off - Soft)   13: Power Off - Hard Graceful
//!   6: Power Off - Hard           14: Master Bus Reset Graceful
//!   7: Hibernate (Off - Soft)     15: Power Cycle (Off - Soft Graceful)
//!   8: Power Off - Soft           16: Power Cycle (Off - Hard Graceful)
//!   9: Power Cycle (Off - Hard)
//! ```
//!
//! Only `on`, `cycle`, `off`, `reset` and `nmi` can be requested.

pub mod envelope;
pub mod power;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use envelope::build_power_state_request;
pub use power::{
    AmtPower, PowerEvent, PowerObserver, SetOptions, SetOutcome, DEFAULT_POLL_INTERVAL,
    DEFAULT_WAIT_TIMEOUT, MIN_POLL_INTERVAL, REQUEST_POWER_STATE_CHANGE,
};

/// Root of the DMTF CIM schema resource URIs
pub const CIM_SCHEMA_URL: &str = "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/";

/// Resource reporting the current power state
pub const CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE: &str =
    "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/CIM_AssociatedPowerManagementService";

/// Resource accepting power state change requests
pub const CIM_POWER_MANAGEMENT_SERVICE: &str =
    "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/CIM_PowerManagementService";

/// Resource naming the managed system
pub const CIM_COMPUTER_SYSTEM: &str =
    "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/CIM_ComputerSystem";

/// Instance name of the AMT power management service
pub const POWER_MANAGEMENT_SERVICE_NAME: &str = "Intel(r) AMT Power Management Service";

/// A power state that can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// Power on
    On,
    /// Power cycle (off - soft)
    Cycle,
    /// Power off (soft)
    Off,
    /// Master bus reset
    Reset,
    /// Diagnostic interrupt
    Nmi,
}

impl PowerState {
    /// Every settable state, in code order.
    pub const ALL: [PowerState; 5] = [
        PowerState::On,
        PowerState::Cycle,
        PowerState::Off,
        PowerState::Reset,
        PowerState::Nmi,
    ];

    /// Protocol code of this state.
    pub fn code(self) -> u32 {
        match self {
            PowerState::On => 2,
            PowerState::Cycle => 5,
            PowerState::Off => 8,
            PowerState::Reset => 10,
            PowerState::Nmi => 11,
        }
    }

    /// Settable state for a protocol code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }

    /// Lowercase name as used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Cycle => "cycle",
            PowerState::Off => "off",
            PowerState::Reset => "reset",
            PowerState::Nmi => "nmi",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == name)
            .ok_or_else(|| Error::InvalidPowerState(s.to_string()))
    }
}

/// A power state as reported by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    /// One of the settable states
    Known(PowerState),
    /// Any other code (sleep, hibernate, graceful variants, ...)
    Unknown(u32),
}

impl ObservedState {
    /// Classify a reported code.
    pub fn from_code(code: u32) -> Self {
        match PowerState::from_code(code) {
            Some(state) => ObservedState::Known(state),
            None => ObservedState::Unknown(code),
        }
    }

    /// The reported code.
    pub fn code(self) -> u32 {
        match self {
            ObservedState::Known(state) => state.code(),
            ObservedState::Unknown(code) => code,
        }
    }

    /// The settable state, if this is one.
    pub fn state(self) -> Option<PowerState> {
        match self {
            ObservedState::Known(state) => Some(state),
            ObservedState::Unknown(_) => None,
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedState::Known(state) => write!(f, "{}", state),
            ObservedState::Unknown(code) => write!(f, "unknown state ({})", code),
        }
    }
}

impl From<PowerState> for ObservedState {
    fn from(state: PowerState) -> Self {
        ObservedState::Known(state)
    }
}

/// Human description of any AMT power state code.
pub fn describe_code(code: u32) -> Option<&'static str> {
    let description = match code {
        2 => "Power On",
        3 => "Sleep - Light",
        4 => "Sleep - Deep",
        5 => "Power Cycle (Off - Soft)",
        6 => "Power Off - Hard",
        7 => "Hibernate (Off - Soft)",
        8 => "Power Off - Soft",
        9 => "Power Cycle (Off - Hard)",
        10 => "Master Bus Reset",
        11 => "Diagnostic Interrupt (NMI)",
        12 => "Power Off - Soft Graceful",
        13 => "Power Off - Hard Graceful",
        14 => "Master Bus Reset Graceful",
        15 => "Power Cycle (Off - Soft Graceful)",
        16 => "Power Cycle (Off - Hard Graceful)",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for state in PowerState::ALL {
            assert_eq!(PowerState::from_code(state.code()), Some(state));
            assert_eq!(state.as_str().parse::<PowerState>().unwrap(), state);
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(PowerState::On.code(), 2);
        assert_eq!(PowerState::Cycle.code(), 5);
        assert_eq!(PowerState::Off.code(), 8);
        assert_eq!(PowerState::Reset.code(), 10);
        assert_eq!(PowerState::Nmi.code(), 11);
    }

    #[test]
    fn test_parse_state_names() {
        assert_eq!("ON".parse::<PowerState>().unwrap(), PowerState::On);
        assert_eq!(" nmi ".parse::<PowerState>().unwrap(), PowerState::Nmi);
        assert_eq!(
            "sleep".parse::<PowerState>().unwrap_err(),
            Error::InvalidPowerState("sleep".to_string())
        );
    }

    #[test]
    fn test_observed_state() {
        assert_eq!(ObservedState::from_code(2), ObservedState::Known(PowerState::On));
        assert_eq!(ObservedState::from_code(2).to_string(), "on");

        let unknown = ObservedState::from_code(99);
        assert_eq!(unknown, ObservedState::Unknown(99));
        assert_eq!(unknown.to_string(), "unknown state (99)");
        assert_eq!(unknown.state(), None);

        // Reported by sleeping hosts, never settable.
        assert_eq!(ObservedState::from_code(4), ObservedState::Unknown(4));
    }

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(7), Some("Hibernate (Off - Soft)"));
        assert_eq!(describe_code(11), Some("Diagnostic Interrupt (NMI)"));
        assert_eq!(describe_code(1), None);
    }

    #[test]
    fn test_resource_uris_share_schema_root() {
        for uri in [
            CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE,
            CIM_POWER_MANAGEMENT_SERVICE,
            CIM_COMPUTER_SYSTEM,
        ] {
            assert!(uri.starts_with(CIM_SCHEMA_URL));
        }
    }
}
