//! Turns a raw target line into `(ScanTarget, JobStatus)`.
//!
//! The algorithm never fails the caller for malformed input — every branch
//! ends in a status, not an error. The only place genuine ambiguity exists
//! is DNS resolution: this module resolves through `tokio::net::lookup_host`,
//! which gives real OS-level resolution rather than a hand-rolled
//! reimplementation of the DNS wire protocol.

use crate::denylist::Denylist;
use crawler_core::{JobStatus, ScanTarget};
use std::net::IpAddr;

/// Parses and resolves one raw target line.
///
/// Returns `None` when the line is empty after stripping — per the
/// component design, an empty residual target produces no job and is not
/// counted at all.
pub async fn parse_target(
    raw: &str,
    default_port: u16,
    denylist: Option<&dyn Denylist>,
) -> Option<(ScanTarget, JobStatus)> {
    let (rank, rest) = split_rank(raw);
    let rest = strip_scheme(rest);
    let rest = strip_quotes(rest);

    if rest.is_empty() {
        return None;
    }

    let (address, port) = split_port(rest, default_port);
    if address.is_empty() {
        return None;
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        let target = ScanTarget::new(None, Some(ip), port, rank);
        return Some(apply_denylist(target, None, ip, denylist));
    }

    match resolve(&address).await {
        Ok(ip) => {
            let target = ScanTarget::new(Some(address.clone()), Some(ip), port, rank);
            Some(apply_denylist(target, Some(&address), ip, denylist))
        }
        Err(ResolveFailure::NotFound) => {
            let target = ScanTarget::new(Some(address), None, port, rank);
            Some((target, JobStatus::Unresolvable))
        }
        Err(ResolveFailure::Other) => {
            let target = ScanTarget::new(Some(address), None, port, rank);
            Some((target, JobStatus::ResolutionError))
        }
    }
}

/// Step 6: a target otherwise ready to run (`TO_BE_EXECUTED`) is rejected
/// if the denylist flags it; the resolved ip is what gets checked, never
/// the raw string.
fn apply_denylist(
    target: ScanTarget,
    hostname: Option<&str>,
    ip: IpAddr,
    denylist: Option<&dyn Denylist>,
) -> (ScanTarget, JobStatus) {
    if let Some(denylist) = denylist {
        if let Some(reason) = denylist.check(hostname, ip) {
            return (target.with_denylist_reason(reason), JobStatus::Denylisted);
        }
    }
    (target, JobStatus::ToBeExecuted)
}

/// Step 1: a leading `digits,` prefix is a rank, not part of the address.
fn split_rank(raw: &str) -> (Option<u32>, &str) {
    if let Some(idx) = raw.find(',') {
        let (left, right) = (&raw[..idx], &raw[idx + 1..]);
        if !left.is_empty() && left.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(rank) = left.parse::<u32>() {
                return (Some(rank), right);
            }
        }
    }
    (None, raw)
}

/// Step 2: strip a leading `scheme//` (covers `http://`, bare MX-style `//`).
fn strip_scheme(s: &str) -> &str {
    if let Some(idx) = s.find("//") {
        let prefix = &s[..idx];
        let looks_like_scheme = prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
        if looks_like_scheme {
            return &s[idx + 2..];
        }
    }
    s
}

/// Step 3: strip a pair of surrounding double quotes.
fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Step 4: bracket-aware `addr:port` splitting with default-port fallback.
fn split_port(s: &str, default_port: u16) -> (String, u16) {
    if let Some(stripped) = s.strip_prefix('[') {
        if let Some(close) = stripped.find("]:") {
            let addr = &stripped[..close];
            let tail = &stripped[close + 2..];
            return (addr.to_string(), parse_port(tail, default_port));
        }
        if let Some(addr) = stripped.strip_suffix(']') {
            return (addr.to_string(), default_port);
        }
    }

    let colon_count = s.matches(':').count();
    if colon_count == 1 && !s.contains("::") {
        if let Some(idx) = s.rfind(':') {
            let (addr, tail) = (&s[..idx], &s[idx + 1..]);
            return (addr.to_string(), parse_port(tail, default_port));
        }
    }

    (s.to_string(), default_port)
}

fn parse_port(s: &str, default_port: u16) -> u16 {
    match s.parse::<u16>() {
        Ok(p) if p > 1 && p < 65535 => p,
        _ => default_port,
    }
}

enum ResolveFailure {
    NotFound,
    Other,
}

async fn resolve(hostname: &str) -> Result<IpAddr, ResolveFailure> {
    match tokio::net::lookup_host((hostname, 0)).await {
        Ok(mut addrs) => addrs.next().map(|a| a.ip()).ok_or(ResolveFailure::NotFound),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ResolveFailure::NotFound),
        Err(_) => Err(ResolveFailure::Other),
    }
}
