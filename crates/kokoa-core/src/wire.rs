//! JSON bodies exchanged between edge agents and the control plane.

use serde::{Deserialize, Serialize};

use crate::proxy_map::{ProxyConfig, RouteUpstream};

/// Alternate header carrying the bootstrap secret on enrollment.
pub const BOOTSTRAP_HEADER: &str = "x-bootstrap-token";

/// Enrollment endpoint, relative to the control plane base URL.
pub const ENROLL_PATH: &str = "/api/v1/edge-nodes/register";

/// Configuration poll endpoint, relative to the control plane base URL.
pub const CONFIG_PATH: &str = "/api/v1/edge-nodes/me/config";

/// Body of `POST /api/v1/edge-nodes/register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Response to a successful enrollment. The token is shown exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub edge_node_id: String,
    pub token: String,
}

/// Response to `GET /api/v1/edge-nodes/me/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfigResponse {
    pub config_hash: String,
    pub hostnames: Vec<String>,
    pub nginx_map: String,
    pub routes: Vec<RouteUpstream>,
}

impl From<ProxyConfig> for EdgeConfigResponse {
    fn from(config: ProxyConfig) -> Self {
        Self {
            config_hash: config.config_hash,
            hostnames: config.hostnames,
            nginx_map: config.map,
            routes: config.routes,
        }
    }
}

/// `{"error": "..."}` body returned for every failed API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::proxy_map::build_config;

    #[test]
    fn config_response_field_names() {
        let response = EdgeConfigResponse::from(build_config(&[]));
        let json = serde_json::to_value(&response).unwrap();
        for key in ["config_hash", "hostnames", "nginx_map", "routes"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn enroll_request_name_is_optional() {
        let req: EnrollRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_none());
        assert_eq!(serde_json::to_string(&EnrollRequest::default()).unwrap(), "{}");
    }
}
