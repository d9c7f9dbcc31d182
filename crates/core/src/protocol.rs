//! Protocol variants under comparison and the winner of a head-to-head.
//!
//! HTTP/2 is variant A and the baseline for every relative metric; HTTP/3 is
//! variant B.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One of the two compared protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Variant A, the baseline.
    H2,
    /// Variant B.
    H3,
}

impl Protocol {
    /// Both variants in execution order (A first).
    pub const ALL: [Protocol; 2] = [Protocol::H2, Protocol::H3];

    /// Short identifier used in flags, file names, and storage (`h2` / `h3`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::H2 => "h2",
            Self::H3 => "h3",
        }
    }

    /// Human-readable label carried in result payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::H2 => "HTTP/2",
            Self::H3 => "HTTP/3",
        }
    }

    /// Whether the client must be started in HTTP/3 mode (`--h3=<bool>`).
    pub fn is_h3(self) -> bool {
        matches!(self, Self::H3)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h2" => Ok(Self::H2),
            "h3" => Ok(Self::H3),
            other => Err(CoreError::InvalidInput(format!(
                "unknown protocol '{other}' (expected h2 or h3)"
            ))),
        }
    }
}

/// Outcome of comparing one scalar between the two variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    H2,
    H3,
    Tie,
}

impl Winner {
    /// Winner when the smaller value is better. Only strict inequality wins.
    pub fn lower_is_better(h2: f64, h3: f64) -> Self {
        if h3 < h2 {
            Self::H3
        } else if h2 < h3 {
            Self::H2
        } else {
            Self::Tie
        }
    }

    /// Winner when the larger value is better. Only strict inequality wins.
    pub fn higher_is_better(h2: f64, h3: f64) -> Self {
        if h3 > h2 {
            Self::H3
        } else if h2 > h3 {
            Self::H2
        } else {
            Self::Tie
        }
    }
}

impl From<Protocol> for Winner {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::H2 => Self::H2,
            Protocol::H3 => Self::H3,
        }
    }
}
