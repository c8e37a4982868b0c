use std::net::IpAddr;
use mediafront::net::ip_filter::IpFilter;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[test]
fn empty_filter_allows_everyone() {
    let f = IpFilter::parse("");
    assert!(f.is_empty());
    assert!(f.allowed(ip("8.8.8.8")));
    assert!(f.allowed(ip("::1")));
}

#[test]
fn exact_address() {
    let f = IpFilter::parse("192.168.1.5");
    assert!(f.allowed(ip("192.168.1.5")));
    assert!(!f.allowed(ip("192.168.1.6")));
}

#[test]
fn wildcard_octet() {
    let f = IpFilter::parse("192.168.1.*");
    assert!(f.allowed(ip("192.168.1.200")));
    assert!(!f.allowed(ip("192.168.2.1")));
}

#[test]
fn octet_range() {
    let f = IpFilter::parse("10.0.0.10-20");
    assert!(f.allowed(ip("10.0.0.10")));
    assert!(f.allowed(ip("10.0.0.20")));
    assert!(!f.allowed(ip("10.0.0.21")));
}

#[test]
fn full_span_in_either_order() {
    let f = IpFilter::parse("10.0.1.50-10.0.0.250");
    assert!(f.allowed(ip("10.0.0.251")));
    assert!(f.allowed(ip("10.0.1.1")));
    assert!(!f.allowed(ip("10.0.1.51")));
}

#[test]
fn several_rules_any_match_admits() {
    let f = IpFilter::parse("127.0.0.1, 192.168.0.*");
    assert!(f.allowed(ip("127.0.0.1")));
    assert!(f.allowed(ip("192.168.0.7")));
    assert!(!f.allowed(ip("172.16.0.1")));
}

#[test]
fn ipv4_mapped_ipv6_peer_matches_ipv4_rule() {
    let f = IpFilter::parse("192.168.1.*");
    assert!(f.allowed(ip("::ffff:192.168.1.9")));
}

#[test]
fn ipv6_exact_rule() {
    let f = IpFilter::parse("::1");
    assert!(f.allowed(ip("::1")));
    assert!(!f.allowed(ip("127.0.0.1")));
}

#[test]
fn garbage_rules_are_skipped() {
    let f = IpFilter::parse("not-an-ip, 300.1.1.1, 10.0.0.1");
    assert!(!f.is_empty());
    assert!(f.allowed(ip("10.0.0.1")));
    assert!(!f.allowed(ip("10.0.0.2")));
}

#[test]
fn only_garbage_means_allow_all() {
    assert!(IpFilter::parse("bogus").allowed(ip("1.2.3.4")));
}
