// Snapshot ordering: IPv4 identities by address, then IPv6, then everything else lexically.
// Ties fall back to the raw identity, so the order is total.

use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::models::{ServerId, StatusRecord};

/// Sort key derived from a server identity. Variant order is group order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey<'a> {
    V4(Ipv4Addr, &'a str),
    V6(Ipv6Addr, &'a str),
    Name(&'a str),
}

/// Interpret `host[:port]` as an address when possible (`10.0.0.5`, `10.0.0.5:67`,
/// `::1`, `[::1]:67`).
pub fn parse_address(id: &str) -> Option<IpAddr> {
    if let Ok(sock) = id.parse::<SocketAddr>() {
        return Some(sock.ip());
    }
    let bare = id
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(id);
    bare.parse::<IpAddr>().ok()
}

pub fn sort_key(id: &ServerId) -> SortKey<'_> {
    let raw = id.as_str();
    match parse_address(raw) {
        Some(IpAddr::V4(a)) => SortKey::V4(a, raw),
        Some(IpAddr::V6(a)) => SortKey::V6(a, raw),
        None => SortKey::Name(raw),
    }
}

pub fn compare(a: &StatusRecord, b: &StatusRecord) -> Ordering {
    sort_key(&a.server).cmp(&sort_key(&b.server))
}

/// Sort records in place into snapshot order.
pub fn sort_records(records: &mut [StatusRecord]) {
    records.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(records: &[StatusRecord]) -> Vec<&str> {
        records.iter().map(|r| r.server.as_str()).collect()
    }

    #[test]
    fn addresses_sort_numerically_not_lexically() {
        let mut records: Vec<StatusRecord> = ["10.0.0.10", "10.0.0.9", "10.0.1.1", "9.255.0.1"]
            .into_iter()
            .map(|s| StatusRecord::offline(s.into()))
            .collect();
        sort_records(&mut records);
        assert_eq!(
            ids(&records),
            ["9.255.0.1", "10.0.0.9", "10.0.0.10", "10.0.1.1"]
        );
    }

    #[test]
    fn groups_v4_then_v6_then_names() {
        let mut records: Vec<StatusRecord> = ["zeta", "[::1]:8080", "alpha", "10.0.0.1:8080"]
            .into_iter()
            .map(|s| StatusRecord::offline(s.into()))
            .collect();
        sort_records(&mut records);
        assert_eq!(
            ids(&records),
            ["10.0.0.1:8080", "[::1]:8080", "alpha", "zeta"]
        );
    }

    #[test]
    fn same_address_breaks_tie_on_raw_identity() {
        let a = ServerId::from("10.0.0.1:9000");
        let b = ServerId::from("10.0.0.1:8000");
        assert_eq!(sort_key(&b).cmp(&sort_key(&a)), Ordering::Less);
    }

    #[test]
    fn parses_bracketed_v6_without_port() {
        assert_eq!(
            parse_address("[fe80::1]"),
            Some("fe80::1".parse().unwrap())
        );
        assert_eq!(parse_address("bad-host"), None);
    }
}
