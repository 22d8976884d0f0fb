//! Trusted-subnet check on the forwarded client address.

use std::net::IpAddr;

use telemon_core::{MetricsError, Result};

/// Header carrying the original client address.
pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// Parsed CIDR block (`10.0.0.0/8`, `fd00::/64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedSubnet {
    network: IpAddr,
    prefix: u8,
}

fn mask_v4(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_v6(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl TrustedSubnet {
    pub fn parse(cidr: &str) -> Result<Self> {
        let bad = || MetricsError::BadRequest(format!("invalid trusted subnet: {cidr}"));

        let (addr, prefix) = cidr.trim().split_once('/').ok_or_else(bad)?;
        let addr: IpAddr = addr.parse().map_err(|_| bad())?;
        let prefix: u8 = prefix.parse().map_err(|_| bad())?;

        let network = match addr {
            IpAddr::V4(v4) if prefix <= 32 => {
                IpAddr::from((u32::from(v4) & mask_v4(prefix)).to_be_bytes())
            }
            IpAddr::V6(v6) if prefix <= 128 => {
                IpAddr::from((u128::from(v6) & mask_v6(prefix)).to_be_bytes())
            }
            _ => return Err(bad()),
        };
        Ok(Self { network, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                u32::from(ip) & mask_v4(self.prefix) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                u128::from(ip) & mask_v6(self.prefix) == u128::from(net)
            }
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }

    /// Check a raw `X-Real-IP` header value.
    pub fn check_header(&self, header: Option<&str>) -> Result<()> {
        let raw = header
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MetricsError::AccessDenied(format!("{REAL_IP_HEADER} is not set")))?;
        let ip: IpAddr = raw.parse().map_err(|_| {
            MetricsError::AccessDenied(format!("{REAL_IP_HEADER}={raw} is not a valid IP"))
        })?;
        self.check_ip(ip)
    }

    pub fn check_ip(&self, ip: IpAddr) -> Result<()> {
        if self.contains(ip) {
            Ok(())
        } else {
            Err(MetricsError::AccessDenied("Access denied".into()))
        }
    }
}

impl std::fmt::Display for TrustedSubnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_membership() {
        let net = TrustedSubnet::parse("192.168.1.0/24").unwrap();
        assert!(net.contains("192.168.1.77".parse().unwrap()));
        assert!(!net.contains("192.168.2.1".parse().unwrap()));
        assert_eq!(net.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn host_bits_are_masked() {
        let net = TrustedSubnet::parse("10.1.2.3/8").unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn three_distinct_rejections() {
        let net = TrustedSubnet::parse("127.0.0.0/8").unwrap();
        let msg = |h: Option<&str>| net.check_header(h).map_err(|e| e.to_string()).err();
        assert_eq!(msg(None).as_deref(), Some("X-Real-IP is not set"));
        assert_eq!(msg(Some("bad")).as_deref(), Some("X-Real-IP=bad is not a valid IP"));
        assert_eq!(msg(Some("8.8.8.8")).as_deref(), Some("Access denied"));
        assert_eq!(msg(Some("127.0.0.1")), None);
    }

    #[test]
    fn malformed_cidr() {
        assert!(TrustedSubnet::parse("10.0.0.0").is_err());
        assert!(TrustedSubnet::parse("10.0.0.0/33").is_err());
        assert!(TrustedSubnet::parse("nope/8").is_err());
        assert!(TrustedSubnet::parse("::1/129").is_err());
        assert!(TrustedSubnet::parse("0.0.0.0/0").is_ok());
    }
}
