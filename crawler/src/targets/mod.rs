//! Target-list providers.
//!
//! The Controller only ever sees a `TargetProvider`: an async stream of raw
//! target lines. [`FileTargetProvider`] is the one fully implemented here;
//! [`TrancoProvider`], [`CruxProvider`], and [`MxProvider`] exist so the
//! provider-priority rule (`hostFile → trancoEmail → crux → tranco`) is
//! exercised against real types rather than a stand-in enum — fetching the
//! actual published lists is an external collaborator, out of scope here.

use async_trait::async_trait;
use std::path::PathBuf;

/// A source of raw target lines for a bulk scan.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Returns every raw target line this provider contributes, in whatever
    /// order the underlying source yields them. Publish ordering across the
    /// bulk scan is explicitly not guaranteed, so a provider is free to
    /// buffer this however is convenient for it.
    async fn targets(&self) -> std::io::Result<Vec<String>>;
}

/// Reads one raw target per non-blank line from a file (the `-hostFile`
/// flag).
pub struct FileTargetProvider {
    path: PathBuf,
}

impl FileTargetProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TargetProvider for FileTargetProvider {
    async fn targets(&self) -> std::io::Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(contents.lines().map(str::to_owned).filter(|l| !l.trim().is_empty()).collect())
    }
}

/// Crux top-list tiers, named exactly as the CLI surface accepts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CruxTier {
    Top1k,
    Top5k,
    Top10k,
    Top50k,
    Top100k,
    Top500k,
    Top1m,
}

impl std::str::FromStr for CruxTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TOP_1K" => Ok(CruxTier::Top1k),
            "TOP_5K" => Ok(CruxTier::Top5k),
            "TOP_10K" => Ok(CruxTier::Top10k),
            "TOP_50K" => Ok(CruxTier::Top50k),
            "TOP_100K" => Ok(CruxTier::Top100k),
            "TOP_500K" => Ok(CruxTier::Top500k),
            "TOP_1M" => Ok(CruxTier::Top1m),
            other => Err(format!("invalid crux tier {other:?}")),
        }
    }
}

/// Fetches the Chrome UX Report top-sites list for a tier. The fetch itself
/// is an external collaborator (the published dataset); this type exists so
/// the Controller's provider-priority selection compiles against a real
/// implementation of the trait.
pub struct CruxProvider {
    pub tier: CruxTier,
}

#[async_trait]
impl TargetProvider for CruxProvider {
    async fn targets(&self) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "fetching the published Crux list is outside this orchestrator's scope",
        ))
    }
}

/// Fetches a Tranco top-N list, either the public top-N or an
/// email-gated custom list (`-trancoEmail`).
pub struct TrancoProvider {
    pub top_n: u32,
    pub email_gated: bool,
}

#[async_trait]
impl TargetProvider for TrancoProvider {
    async fn targets(&self) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "fetching the published Tranco list is outside this orchestrator's scope",
        ))
    }
}

/// Resolves MX records for a domain list as targets (the `//`-style MX
/// scheme prefix the parser strips is this provider's wire convention).
pub struct MxProvider {
    pub domains: Vec<String>,
}

#[async_trait]
impl TargetProvider for MxProvider {
    async fn targets(&self) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "MX record resolution is outside this orchestrator's scope",
        ))
    }
}
