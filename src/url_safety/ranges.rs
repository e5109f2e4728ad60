//! Deny-listed address ranges

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// (network, prefix length)
const BLOCKED_V4: &[([u8; 4], u8)] = &[
    ([10, 0, 0, 0], 8),       // private
    ([172, 16, 0, 0], 12),    // private
    ([192, 168, 0, 0], 16),   // private
    ([127, 0, 0, 0], 8),      // loopback
    ([169, 254, 0, 0], 16),   // link-local, cloud metadata
    ([0, 0, 0, 0], 8),        // "this" network
    ([100, 64, 0, 0], 10),    // carrier-grade NAT
    ([192, 0, 0, 0], 24),     // IETF protocol assignments
    ([192, 0, 2, 0], 24),     // TEST-NET-1
    ([198, 51, 100, 0], 24),  // TEST-NET-2
    ([203, 0, 113, 0], 24),   // TEST-NET-3
    ([224, 0, 0, 0], 4),      // multicast
    ([240, 0, 0, 0], 4),      // reserved, broadcast
];

const BLOCKED_V6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::LOCALHOST, 128),
    (Ipv6Addr::UNSPECIFIED, 128),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),  // unique local
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10), // link-local
    (Ipv6Addr::new(0xff00, 0, 0, 0, 0, 0, 0, 0), 8),  // multicast
];

/// Metadata endpoints, listed apart from the ranges that already cover them
const METADATA_IPS: &[IpAddr] = &[
    IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)),
    IpAddr::V4(Ipv4Addr::new(169, 254, 170, 2)),
    IpAddr::V6(Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x0254)),
];

fn v4_in(ip: Ipv4Addr, network: [u8; 4], prefix: u8) -> bool {
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    (u32::from(ip) & mask) == (u32::from(Ipv4Addr::from(network)) & mask)
}

fn v6_in(ip: Ipv6Addr, network: Ipv6Addr, prefix: u8) -> bool {
    let mask = if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    };
    (u128::from(ip) & mask) == (u128::from(network) & mask)
}

/// Whether an address is internal, reserved or a metadata endpoint
///
/// IPv4-mapped IPv6 addresses are checked as their IPv4 form.
#[must_use]
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    if METADATA_IPS.contains(&ip) {
        return true;
    }
    match ip {
        IpAddr::V4(v4) => BLOCKED_V4.iter().any(|&(net, prefix)| v4_in(v4, net, prefix)),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_blocked_ip(IpAddr::V4(v4));
            }
            BLOCKED_V6.iter().any(|&(net, prefix)| v6_in(v6, net, prefix))
        }
    }
}
