//! Reverse-zone names for IP literals
//!
//! - IPv4: octets reversed under `in-addr.arpa.`
//!   (`10.5.199.71` → `71.199.5.10.in-addr.arpa.`)
//! - IPv6: all 32 nibbles, least significant first, under `ip6.arpa.`
//!
//! Anything that does not parse as an IP yields [`NotAnIp`]; callers treat
//! that side as absent rather than failing the event.

use std::fmt::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// The value handed to the resolver is not an IP literal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an IP address: {0:?}")]
pub struct NotAnIp(pub String);

/// Map an IP literal to its absolute reverse-lookup name
pub fn reverse_name(ip: &str) -> Result<String, NotAnIp> {
    let addr: IpAddr = ip.trim().parse().map_err(|_| NotAnIp(ip.to_string()))?;

    Ok(match addr {
        IpAddr::V4(v4) => reverse_name_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => reverse_name_v4(v4),
            None => reverse_name_v6(v6),
        },
    })
}

/// `a.b.c.d` → `d.c.b.a.in-addr.arpa.`
pub fn reverse_name_v4(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa.", d, c, b, a)
}

/// Nibble-reversed `ip6.arpa.` name
pub fn reverse_name_v6(ip: Ipv6Addr) -> String {
    let mut name = String::with_capacity(72);
    for byte in ip.octets().iter().rev() {
        // Infallible: writing to a String
        let _ = write!(name, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
    }
    name.push_str("ip6.arpa.");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_reverse_name() {
        assert_eq!(
            reverse_name("10.5.199.71").unwrap(),
            "71.199.5.10.in-addr.arpa."
        );
        assert_eq!(reverse_name(" 192.0.2.1 ").unwrap(), "1.2.0.192.in-addr.arpa.");
    }

    #[test]
    fn test_ipv6_reverse_name() {
        assert_eq!(
            reverse_name("2001:db8::567:89ab").unwrap(),
            "b.a.9.8.7.6.5.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa."
        );
        assert_eq!(
            reverse_name("::1").unwrap(),
            "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.ip6.arpa."
        );
    }

    #[test]
    fn test_ipv4_mapped_ipv6_uses_in_addr() {
        assert_eq!(
            reverse_name("::ffff:10.5.199.71").unwrap(),
            "71.199.5.10.in-addr.arpa."
        );
    }

    #[test]
    fn test_not_an_ip() {
        assert_eq!(
            reverse_name("not-an-ip"),
            Err(NotAnIp("not-an-ip".to_string()))
        );
        assert!(reverse_name("").is_err());
        assert!(reverse_name("10.5.199").is_err());
        assert!(reverse_name("host.example.com.").is_err());
    }
}
