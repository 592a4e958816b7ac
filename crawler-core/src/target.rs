//! The immutable result of parsing one raw target line.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Why a target was rejected by the denylist, kept as optional metadata —
/// some deployments want to know whether a hostname or an IP rule fired,
/// others don't care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenylistReason {
    Hostname,
    Ip,
}

/// A single scan target, fully resolved.
///
/// Constructed exclusively by the parser (see `crawler::target_parser`) and
/// immutable thereafter. `ip` is always set once a scan is actually going to
/// run — either given directly as an IP literal or filled in by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub hostname: Option<String>,
    pub ip: Option<IpAddr>,
    pub port: u16,
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denylist_reason: Option<DenylistReason>,
}

impl ScanTarget {
    pub fn new(hostname: Option<String>, ip: Option<IpAddr>, port: u16, rank: Option<u32>) -> Self {
        Self {
            hostname,
            ip,
            port,
            rank,
            denylist_reason: None,
        }
    }

    pub fn with_denylist_reason(mut self, reason: DenylistReason) -> Self {
        self.denylist_reason = Some(reason);
        self
    }

    /// The address a scan should actually be attempted against. Panics if
    /// called before resolution — every target returned from the parser
    /// with a non-error status has this set.
    pub fn socket_ip(&self) -> IpAddr {
        self.ip.expect("ScanTarget.ip must be set before scanning")
    }
}
