use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body size in bytes.
    ///
    /// Bodies above this limit are rejected before the pipeline runs, so an
    /// oversized upload cannot tie up a rate-limit slot or a backend call.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Key guarding the `/admin/reload` endpoint.
    ///
    /// When unset, reload is disabled entirely. This is the gateway's own
    /// operational credential and is never part of the caller credential
    /// table.
    #[serde(default)]
    pub admin_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            admin_key: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}
