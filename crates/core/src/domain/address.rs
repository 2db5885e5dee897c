use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::CoreError;

/// IPv4 address of a provisioned machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineAddress(Ipv4Addr);

impl FromStr for MachineAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Ipv4Addr>()
            .map(Self)
            .map_err(|_| CoreError::InvalidAddress(s.to_string()))
    }
}

impl TryFrom<String> for MachineAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MachineAddress> for String {
    fn from(value: MachineAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MachineAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Returns the first line of resolver output that is a bare dotted quad.
///
/// CNAME targets and comments in the output are skipped.
pub fn first_ipv4_line(output: &str) -> Option<MachineAddress> {
    output.lines().find_map(|line| line.trim().parse().ok())
}
