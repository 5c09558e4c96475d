//! Reference IP-range taxonomy used by the SSRF validator.
//!
//! `std::net`'s `is_global`/`is_shared` classifiers are nightly-only, so this
//! mirrors the same taxonomy ordinary `ipaddr`-style libraries expose
//! (unicast / private / link-local / loopback / multicast / reserved /
//! broadcast) using only stable `Ipv4Addr`/`Ipv6Addr` methods plus the
//! handful of ranges stable std doesn't cover (CGNAT, 6to4 relay, IETF
//! protocol assignments, benchmarking, future-use).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A classified address range. Only [`Range::Unicast`] is an allowed fetch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    Unicast,
    Private,
    LinkLocal,
    Loopback,
    Multicast,
    Reserved,
    Broadcast,
    Unspecified,
}

/// Classifies `ip` into the taxonomy above.
pub fn classify(ip: IpAddr) -> Range {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => classify_v6(v6),
    }
}

/// `true` only for [`Range::Unicast`] — the sole range the SSRF validator allows.
pub fn is_unicast(ip: IpAddr) -> bool {
    classify(ip) == Range::Unicast
}

fn classify_v4(ip: Ipv4Addr) -> Range {
    if ip.is_unspecified() {
        return Range::Unspecified;
    }
    if ip.is_loopback() {
        return Range::Loopback;
    }
    if ip.is_private() {
        return Range::Private;
    }
    if is_carrier_grade_nat(ip) {
        return Range::Private;
    }
    if ip.is_link_local() {
        return Range::LinkLocal;
    }
    if ip.is_broadcast() {
        return Range::Broadcast;
    }
    if ip.is_multicast() {
        return Range::Multicast;
    }
    if ip.is_documentation() || is_ietf_protocol_assignment(ip) || is_six_to_four_relay(ip) || is_future_use(ip) || is_benchmarking(ip)
    {
        return Range::Reserved;
    }
    Range::Unicast
}

fn classify_v6(ip: Ipv6Addr) -> Range {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_v4(v4);
    }
    if ip.is_unspecified() {
        return Range::Unspecified;
    }
    if ip.is_loopback() {
        return Range::Loopback;
    }
    if ip.is_multicast() {
        return Range::Multicast;
    }
    if is_unique_local(ip) {
        return Range::Private;
    }
    if is_link_local_v6(ip) {
        return Range::LinkLocal;
    }
    if is_documentation_v6(ip) || is_discard_only(ip) {
        return Range::Reserved;
    }
    Range::Unicast
}

/// 100.64.0.0/10 — shared address space for carrier-grade NAT (RFC 6598).
fn is_carrier_grade_nat(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 100 && (64..=127).contains(&b)
}

/// 192.0.0.0/24 — IETF protocol assignments (RFC 6890).
fn is_ietf_protocol_assignment(ip: Ipv4Addr) -> bool {
    ip.octets()[0..3] == [192, 0, 0]
}

/// 192.88.99.0/24 — 6to4 relay anycast (RFC 3068).
fn is_six_to_four_relay(ip: Ipv4Addr) -> bool {
    ip.octets()[0..3] == [192, 88, 99]
}

/// 198.18.0.0/15 — benchmarking (RFC 2544).
fn is_benchmarking(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 198 && (18..=19).contains(&b)
}

/// 240.0.0.0/4 — reserved for future use (RFC 1112), and the all-ones broadcast's neighbor class.
fn is_future_use(ip: Ipv4Addr) -> bool {
    ip.octets()[0] >= 240 && ip != Ipv4Addr::BROADCAST
}

/// fc00::/7 — unique local addresses (RFC 4193).
fn is_unique_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10 — link-local (RFC 4291).
fn is_link_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// 2001:db8::/32 — documentation (RFC 3849).
fn is_documentation_v6(ip: Ipv6Addr) -> bool {
    ip.segments()[0] == 0x2001 && ip.segments()[1] == 0x0db8
}

/// 100::/64 — discard-only address block (RFC 6666).
fn is_discard_only(ip: Ipv6Addr) -> bool {
    ip.segments()[0] == 0x0100 && ip.segments()[1..4] == [0, 0, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn public_address_is_unicast() {
        assert_eq!(classify(v4("93.184.216.34")), Range::Unicast);
        assert!(is_unicast(v4("93.184.216.34")));
    }

    #[test]
    fn rfc1918_is_private() {
        assert_eq!(classify(v4("192.168.0.1")), Range::Private);
        assert_eq!(classify(v4("10.0.0.1")), Range::Private);
        assert_eq!(classify(v4("172.16.0.1")), Range::Private);
        assert!(!is_unicast(v4("192.168.0.1")));
    }

    #[test]
    fn loopback_and_link_local_are_rejected() {
        assert_eq!(classify(v4("127.0.0.1")), Range::Loopback);
        assert_eq!(classify(v4("169.254.1.1")), Range::LinkLocal);
    }

    #[test]
    fn carrier_grade_nat_is_private() {
        assert_eq!(classify(v4("100.64.0.1")), Range::Private);
        assert_eq!(classify(v4("100.100.0.1")), Range::Private);
        assert_eq!(classify(v4("100.128.0.1")), Range::Unicast);
    }

    #[test]
    fn broadcast_and_multicast_are_rejected() {
        assert_eq!(classify(v4("255.255.255.255")), Range::Broadcast);
        assert_eq!(classify(v4("224.0.0.1")), Range::Multicast);
    }

    #[test]
    fn reserved_ranges_are_rejected() {
        assert_eq!(classify(v4("192.0.2.1")), Range::Reserved);
        assert_eq!(classify(v4("192.0.0.1")), Range::Reserved);
        assert_eq!(classify(v4("192.88.99.1")), Range::Reserved);
        assert_eq!(classify(v4("240.0.0.1")), Range::Reserved);
    }

    #[test]
    fn ipv4_mapped_ipv6_classifies_as_the_inner_v4() {
        let mapped: IpAddr = "::ffff:192.168.0.1".parse().unwrap();
        assert_eq!(classify(mapped), Range::Private);
    }

    #[test]
    fn ipv6_unique_local_and_link_local_are_rejected() {
        assert_eq!(classify(v4("fc00::1")), Range::Private);
        assert_eq!(classify(v4("fe80::1")), Range::LinkLocal);
    }

    #[test]
    fn ipv6_public_is_unicast() {
        assert_eq!(classify(v4("2606:2800:220:1:248:1893:25c8:1946")), Range::Unicast);
    }
}
