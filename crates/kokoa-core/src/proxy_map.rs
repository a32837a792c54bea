//! Deterministic nginx map generation.
//!
//! Turns a snapshot of routes joined with their origins into the text block
//! edge nodes drop into their nginx configuration, plus a SHA-256 fingerprint
//! of the exact rendered bytes. Edge agents compare fingerprints to decide
//! whether anything changed, so the output must depend only on the multiset
//! of input rows, never on their order.

use std::fmt::Write;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const MAP_HEADER: &str = "map $host $kokoa_backend {\n    default \"\";\n";
const MAP_FOOTER: &str = "}\n";

/// A route joined with the origin it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RouteWithOrigin {
    pub hostname: String,
    pub target_port: i64,
    pub origin_id: String,
    pub origin_name: String,
    pub wg_ip: String,
}

/// A hostname and the `address:port` it is proxied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpstream {
    pub hostname: String,
    pub upstream: String,
}

/// Rendered proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// The nginx `map` block.
    pub map: String,
    /// Hostnames in ascending order.
    pub hostnames: Vec<String>,
    /// Routes in the same order as `hostnames`.
    pub routes: Vec<RouteUpstream>,
    /// Lowercase hex SHA-256 of `map`.
    pub config_hash: String,
}

/// Build the proxy configuration for a route snapshot.
///
/// Never fails; an empty snapshot renders the header and footer only.
pub fn build_config(routes: &[RouteWithOrigin]) -> ProxyConfig {
    let mut sorted: Vec<&RouteWithOrigin> = routes.iter().collect();
    sorted.sort_by(|a, b| {
        a.hostname
            .cmp(&b.hostname)
            .then_with(|| a.wg_ip.cmp(&b.wg_ip))
            .then_with(|| a.target_port.cmp(&b.target_port))
    });

    let mut map = String::from(MAP_HEADER);
    let mut hostnames = Vec::with_capacity(sorted.len());
    let mut out_routes = Vec::with_capacity(sorted.len());

    for route in sorted {
        let upstream = upstream(route);
        let _ = writeln!(map, "    {} {};", route.hostname, upstream);
        hostnames.push(route.hostname.clone());
        out_routes.push(RouteUpstream {
            hostname: route.hostname.clone(),
            upstream,
        });
    }
    map.push_str(MAP_FOOTER);

    let config_hash = fingerprint(map.as_bytes());
    ProxyConfig {
        map,
        hostnames,
        routes: out_routes,
        config_hash,
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `address:port`, bracketing IPv6 literals.
fn upstream(route: &RouteWithOrigin) -> String {
    match route.wg_ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{ip}]:{}", route.target_port),
        _ => format!("{}:{}", route.wg_ip, route.target_port),
    }
}
