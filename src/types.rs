// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// What the driver does once a node's body has failed.
///
/// - `Stall`: only the failed branch and its dependents stop; every
///   independent branch keeps running (default behaviour).
/// - `Abort`: the first failure cancels every live node and ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Stall,
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stall" => Ok(FailurePolicy::Stall),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"stall\" or \"abort\")"
            )),
        }
    }
}

/// How deployed files are materialised in the install directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Hard-link the source file, falling back to a copy when linking fails
    /// (e.g. source and target live on different devices).
    #[default]
    Hardlink,
    /// Always copy.
    Copy,
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hardlink" | "link" => Ok(LinkMode::Hardlink),
            "copy" => Ok(LinkMode::Copy),
            other => Err(format!(
                "invalid link_mode: {other} (expected \"hardlink\" or \"copy\")"
            )),
        }
    }
}
