//! Scan configuration carried on a bulk scan and distributed to workers.
//!
//! `ScanConfig` is deliberately thin: the fields the orchestration core
//! actually reads (`timeout`, `reexecutions`, `scanner_detail`) are typed;
//! everything else is scanner-specific and travels as an opaque JSON blob
//! the core never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Detail level requested from the (external) scanning engine. The core
/// never interprets this beyond carrying it through to the scanner
/// capability — kept as an enum rather than a raw string only so that CLI
/// parsing can reject a bad value before a bulk scan is even registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanDetail {
    Light,
    Normal,
    Full,
}

impl Default for ScanDetail {
    fn default() -> Self {
        ScanDetail::Normal
    }
}

impl std::str::FromStr for ScanDetail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIGHT" => Ok(ScanDetail::Light),
            "NORMAL" => Ok(ScanDetail::Normal),
            "FULL" => Ok(ScanDetail::Full),
            other => Err(format!("invalid scan detail {other:?} (expected LIGHT, NORMAL or FULL)")),
        }
    }
}

/// Scanner-specific configuration, opaque to the orchestration core beyond
/// the three fields every worker path reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub timeout_ms: u64,
    pub reexecutions: u32,
    pub scanner_detail: ScanDetail,
    /// Everything the concrete scanner needs that the core has no business
    /// knowing about.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl ScanConfig {
    pub fn new(timeout_ms: u64, reexecutions: u32, scanner_detail: ScanDetail) -> Self {
        Self {
            timeout_ms,
            reexecutions,
            scanner_detail,
            extra: HashMap::new(),
        }
    }
}
