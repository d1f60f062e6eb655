use std::fmt;
use std::str::FromStr;

use crate::error::HubwireError;

/// Environment variable some hosts use to publish the process role.
pub const ROLE_ENV: &str = "HUBWIRE_ROLE";

/// Which side of the channel this process plays.
///
/// Fixed when the transport is built and never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Addresses and replies to many endpoints by identifier.
    Hub,
    /// Talks to the hub only.
    Endpoint,
}

impl Role {
    pub fn is_hub(self) -> bool {
        matches!(self, Role::Hub)
    }

    pub fn is_endpoint(self) -> bool {
        matches!(self, Role::Endpoint)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Hub => write!(f, "hub"),
            Role::Endpoint => write!(f, "endpoint"),
        }
    }
}

impl FromStr for Role {
    type Err = HubwireError;

    /// Accepts `hub`/`main` and `endpoint`/`renderer`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hub" | "main" => Ok(Role::Hub),
            "endpoint" | "renderer" => Ok(Role::Endpoint),
            other => Err(HubwireError::Config(format!("unknown role: {other:?}"))),
        }
    }
}
