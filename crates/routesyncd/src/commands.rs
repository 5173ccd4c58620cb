//! Shell command builders for route operations

use std::net::IpAddr;

use crate::error::{Result, RouteSyncError};
use crate::shell;
use crate::types::RouteAction;

/// Build `ip route add|del <cidr> via <gateway>`
pub fn build_route_cmd(ip_cmd: &str, action: RouteAction, cidr: &str, gateway: &str) -> String {
    format!(
        "{} route {} {} via {}",
        ip_cmd,
        action.as_str(),
        shell::shellquote(cidr),
        shell::shellquote(gateway)
    )
}

/// Check that `cidr` is a prefix and `gateway` an address of the same family.
pub fn validate_route(cidr: &str, gateway: &str) -> Result<()> {
    let invalid = |reason: &str| RouteSyncError::InvalidRoute {
        cidr: cidr.to_string(),
        gateway: gateway.to_string(),
        reason: reason.to_string(),
    };

    let (addr, len) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("destination is not in CIDR notation"))?;
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| invalid("destination address is not an IP address"))?;
    let len: u8 = len
        .parse()
        .map_err(|_| invalid("prefix length is not a number"))?;
    let max_len = if addr.is_ipv4() { 32 } else { 128 };
    if len > max_len {
        return Err(invalid("prefix length out of range"));
    }

    let gw: IpAddr = gateway
        .parse()
        .map_err(|_| invalid("gateway is not an IP address"))?;
    if gw.is_ipv4() != addr.is_ipv4() {
        return Err(invalid("gateway and destination address families differ"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_add_route_cmd() {
        let cmd = build_route_cmd(
            shell::IP_CMD,
            RouteAction::Add,
            "10.244.229.192/26",
            "12.1.0.252",
        );
        assert_eq!(
            cmd,
            "/sbin/ip route add \"10.244.229.192/26\" via \"12.1.0.252\""
        );
    }

    #[test]
    fn test_build_del_route_cmd() {
        let cmd = build_route_cmd("ip", RouteAction::Del, "10.244.229.192/26", "12.1.0.252");
        assert!(cmd.starts_with("ip route del"));
        assert!(cmd.contains("via \"12.1.0.252\""));
    }

    #[test]
    fn test_shellquote_safety() {
        let cmd = build_route_cmd("ip", RouteAction::Add, "10.0.0.0/8; reboot", "$(id)");
        assert!(cmd.contains("\"10.0.0.0/8; reboot\""));
        assert!(cmd.contains("\"\\$(id)\""));
    }

    #[test]
    fn test_validate_route_ok() {
        assert!(validate_route("10.244.229.192/26", "12.1.0.252").is_ok());
        assert!(validate_route("0.0.0.0/0", "10.0.0.1").is_ok());
        assert!(validate_route("fd00:10:244::/122", "fd00::1").is_ok());
    }

    #[test]
    fn test_validate_route_rejects() {
        let bad = [
            ("", "12.1.0.252"),
            ("10.244.229.192/26", ""),
            ("10.244.229.192", "12.1.0.252"),
            ("10.244.229.300/26", "12.1.0.252"),
            ("10.244.229.192/33", "12.1.0.252"),
            ("10.244.229.192/x", "12.1.0.252"),
            ("10.244.229.192/26", "node-1"),
            ("10.244.229.192/26", "fd00::1"),
            ("10.0.0.0/8; reboot", "12.1.0.252"),
        ];
        for (cidr, gw) in bad {
            assert!(
                matches!(
                    validate_route(cidr, gw),
                    Err(RouteSyncError::InvalidRoute { .. })
                ),
                "{:?} via {:?} should be rejected",
                cidr,
                gw
            );
        }
    }
}
