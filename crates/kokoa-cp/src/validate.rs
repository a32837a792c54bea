//! Field validation for API requests, applied before the store is touched.

use std::net::IpAddr;

/// Longest permitted DNS label.
const MAX_LABEL_LEN: usize = 63;

/// A request field failed validation. The message is safe to return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

/// Validate origin fields.
pub fn validate_origin(name: &str, wg_ip: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError("name is required"));
    }
    if wg_ip.is_empty() {
        return Err(ValidationError("wg_ip is required"));
    }
    if wg_ip.parse::<IpAddr>().is_err() {
        return Err(ValidationError("wg_ip must be a valid IP address"));
    }
    Ok(())
}

/// Validate route fields, returning the port narrowed to `u16`.
pub fn validate_route(
    hostname: &str,
    port: i64,
    origin_id: &str,
) -> Result<u16, ValidationError> {
    if hostname.trim().is_empty() || origin_id.is_empty() {
        return Err(ValidationError("hostname and origin_id are required"));
    }
    if !valid_hostname(hostname) {
        return Err(ValidationError("hostname is invalid"));
    }
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(ValidationError("target_port must be between 1 and 65535")),
    }
}

/// Strip one trailing dot. This is the form routes are stored and rendered in,
/// matching what nginx puts in `$host`.
pub fn normalize_hostname(hostname: &str) -> &str {
    hostname.strip_suffix('.').unwrap_or(hostname)
}

/// Lowercase DNS name with at least two labels. One trailing dot is allowed.
pub fn valid_hostname(hostname: &str) -> bool {
    let hostname = normalize_hostname(hostname);
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| valid_label(label))
}

fn valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .bytes()
        .all(|c| c == b'-' || c.is_ascii_lowercase() || c.is_ascii_digit())
}
