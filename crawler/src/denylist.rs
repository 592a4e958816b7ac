//! The denylist capability: a set of hostnames or IP ranges that must never
//! be scanned.

use crawler_core::DenylistReason;
use std::net::IpAddr;

/// Checked once per target, after resolution, by the parser.
pub trait Denylist: Send + Sync {
    /// Returns the reason the target is rejected, or `None` if it may be
    /// scanned.
    fn check(&self, hostname: Option<&str>, ip: IpAddr) -> Option<DenylistReason>;
}

/// A denylist loaded from a flat file: one hostname or IP/CIDR literal per
/// line, blank lines and `#`-prefixed comments ignored.
pub struct FileDenylist {
    hostnames: Vec<String>,
    networks: Vec<ipnet::IpNet>,
}

impl FileDenylist {
    pub fn from_str(contents: &str) -> Self {
        let mut hostnames = Vec::new();
        let mut networks = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Ok(net) = line.parse::<ipnet::IpNet>() {
                networks.push(net);
            } else if let Ok(ip) = line.parse::<IpAddr>() {
                networks.push(ipnet::IpNet::from(ip));
            } else {
                hostnames.push(line.to_ascii_lowercase());
            }
        }

        Self { hostnames, networks }
    }

    pub async fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_str(&contents))
    }
}

impl Denylist for FileDenylist {
    fn check(&self, hostname: Option<&str>, ip: IpAddr) -> Option<DenylistReason> {
        if self.networks.iter().any(|net| net.contains(&ip)) {
            return Some(DenylistReason::Ip);
        }
        if let Some(hostname) = hostname {
            let hostname = hostname.to_ascii_lowercase();
            if self.hostnames.iter().any(|h| h == &hostname) {
                return Some(DenylistReason::Hostname);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_by_ip_network() {
        let denylist = FileDenylist::from_str("10.0.0.0/8\n");
        assert_eq!(denylist.check(None, "10.0.0.1".parse().unwrap()), Some(DenylistReason::Ip));
        assert_eq!(denylist.check(None, "192.168.0.1".parse().unwrap()), None);
    }

    #[test]
    fn denies_by_hostname_case_insensitively() {
        let denylist = FileDenylist::from_str("Example.COM\n# a comment\n\n");
        assert_eq!(
            denylist.check(Some("example.com"), "1.2.3.4".parse().unwrap()),
            Some(DenylistReason::Hostname)
        );
        assert_eq!(denylist.check(Some("other.com"), "1.2.3.4".parse().unwrap()), None);
    }
}
