//! Local address discovery.
//!
//! The server binds to every interface, so the user needs to be told which
//! address to open in a browser. Interfaces are ranked by name: wired beats
//! wireless beats anything else beats loopback.

use std::fmt::Display;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::error::Result;

/// Preference class of an interface, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceRank {
    /// Name too short to classify; never advertised.
    Unnamed = 0,
    /// `lo*`
    Loopback = 1,
    Other = 2,
    /// `wl*`
    Wireless = 3,
    /// `en*`
    Wired = 4,
}

/// Classify an interface by its name prefix.
pub fn rank_interface(name: &str) -> InterfaceRank {
    let prefix = name.as_bytes();
    if prefix.len() < 2 {
        return InterfaceRank::Unnamed;
    }
    match &prefix[..2] {
        b"en" => InterfaceRank::Wired,
        b"wl" => InterfaceRank::Wireless,
        b"lo" => InterfaceRank::Loopback,
        _ => InterfaceRank::Other,
    }
}

/// One IPv4 address bound to a named interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub addr: Ipv4Addr,
    pub rank: InterfaceRank,
}

impl InterfaceAddr {
    pub fn new(name: impl Into<String>, addr: Ipv4Addr) -> Self {
        let name = name.into();
        let rank = rank_interface(&name);
        Self { name, addr, rank }
    }
}

/// Pick the highest-ranked address. Among equal ranks the first one wins.
pub fn pick_best(addrs: &[InterfaceAddr]) -> Option<&InterfaceAddr> {
    let mut best: Option<&InterfaceAddr> = None;
    for candidate in addrs {
        let current = best.map_or(InterfaceRank::Unnamed, |b| b.rank);
        if candidate.rank > current {
            best = Some(candidate);
        }
    }
    best
}

/// Enumerate IPv4 interface addresses in system order.
#[cfg(unix)]
pub fn ipv4_interfaces() -> Result<Vec<InterfaceAddr>> {
    use std::ffi::CStr;

    use crate::error::TransportError;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `head` is a valid out-pointer; on success the list is released
    // below with `freeifaddrs` exactly once.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(TransportError::Interfaces(std::io::Error::last_os_error()));
    }

    let mut out = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` is non-null and points into the list returned by
        // `getifaddrs`, which stays alive until `freeifaddrs`.
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        if ifa.ifa_addr.is_null() || ifa.ifa_name.is_null() {
            continue;
        }
        // SAFETY: `ifa_addr` was checked to be non-null.
        let family = unsafe { (*ifa.ifa_addr).sa_family };
        if i32::from(family) != libc::AF_INET {
            continue;
        }

        // SAFETY: an AF_INET address is laid out as `sockaddr_in`.
        let sin = unsafe { &*ifa.ifa_addr.cast::<libc::sockaddr_in>() };
        let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        // SAFETY: `ifa_name` is a non-null NUL-terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();
        out.push(InterfaceAddr::new(name, addr));
    }

    // SAFETY: `head` came from a successful `getifaddrs` call and is freed once.
    unsafe { libc::freeifaddrs(head) };
    Ok(out)
}

/// Enumerate IPv4 interface addresses in system order.
#[cfg(not(unix))]
pub fn ipv4_interfaces() -> Result<Vec<InterfaceAddr>> {
    Ok(Vec::new())
}

/// The address to advertise, or `0.0.0.0` when nothing usable is found.
pub fn preferred_ipv4() -> Ipv4Addr {
    match ipv4_interfaces() {
        Ok(addrs) => match pick_best(&addrs) {
            Some(best) => {
                debug!(interface = %best.name, addr = %best.addr, "advertised address selected");
                best.addr
            }
            None => Ipv4Addr::UNSPECIFIED,
        },
        Err(err) => {
            warn!(error = %err, "interface enumeration failed");
            Ipv4Addr::UNSPECIFIED
        }
    }
}

/// URL of the viewer page served at `addr:port`.
pub fn viewer_url(addr: impl Display, port: u16, page: &str) -> String {
    format!("http://{addr}:{port}/{}", page.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_by_prefix() {
        assert_eq!(rank_interface("enp3s0"), InterfaceRank::Wired);
        assert_eq!(rank_interface("wlan0"), InterfaceRank::Wireless);
        assert_eq!(rank_interface("lo"), InterfaceRank::Loopback);
        assert_eq!(rank_interface("docker0"), InterfaceRank::Other);
        assert_eq!(rank_interface("x"), InterfaceRank::Unnamed);
        assert!(InterfaceRank::Wired > InterfaceRank::Wireless);
        assert!(InterfaceRank::Other > InterfaceRank::Loopback);
    }

    #[test]
    fn wired_beats_wireless_beats_loopback() {
        let addrs = vec![
            InterfaceAddr::new("lo", Ipv4Addr::LOCALHOST),
            InterfaceAddr::new("wlp2s0", Ipv4Addr::new(192, 168, 1, 20)),
            InterfaceAddr::new("enp0s31f6", Ipv4Addr::new(10, 0, 0, 5)),
            InterfaceAddr::new("docker0", Ipv4Addr::new(172, 17, 0, 1)),
        ];
        assert_eq!(pick_best(&addrs).unwrap().addr, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn first_of_equal_rank_wins() {
        let addrs = vec![
            InterfaceAddr::new("wlan0", Ipv4Addr::new(192, 168, 1, 2)),
            InterfaceAddr::new("wlan1", Ipv4Addr::new(192, 168, 1, 3)),
        ];
        assert_eq!(pick_best(&addrs).unwrap().name, "wlan0");
    }

    #[test]
    fn unnamed_only_yields_nothing() {
        let addrs = vec![InterfaceAddr::new("e", Ipv4Addr::new(1, 2, 3, 4))];
        assert!(pick_best(&addrs).is_none());
        assert!(pick_best(&[]).is_none());
    }

    #[test]
    fn url_format() {
        assert_eq!(
            viewer_url(Ipv4Addr::new(10, 0, 0, 5), 8000, "view.html"),
            "http://10.0.0.5:8000/view.html"
        );
        assert_eq!(
            viewer_url("0.0.0.0", 9000, "/index.html"),
            "http://0.0.0.0:9000/index.html"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn enumeration_succeeds() {
        let addrs = ipv4_interfaces().unwrap();
        assert!(addrs.iter().all(|a| !a.name.is_empty()));
    }
}
