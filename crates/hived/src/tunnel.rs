//! Public-tunnel client
//!
//! Talks to the tunnel provider's local agent over its HTTP API: open a
//! tunnel to the proxy's listen port, read back the public URL, delete
//! the tunnel on teardown. The public URL is always normalized to the
//! https scheme before anyone sees it.

use serde::{Deserialize, Serialize};

use hive_core::config::TunnelConfig;
use hive_core::TunnelError;

/// Name the tunnel is registered under with the agent
const TUNNEL_NAME: &str = "hive";

/// An open tunnel and its public URL (https)
#[derive(Debug, Clone)]
pub struct Tunnel {
    /// Publicly reachable URL, https scheme
    pub public_url: String,
    name: String,
}

#[derive(Serialize)]
struct OpenRequest<'a> {
    name: &'a str,
    proto: &'a str,
    addr: String,
}

#[derive(Deserialize)]
struct OpenReply {
    public_url: Option<String>,
}

/// Client for the tunnel agent's local API
pub struct TunnelClient {
    http: reqwest::Client,
    base: String,
}

impl TunnelClient {
    /// Create a client for the configured agent
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: config.agent_api.trim_end_matches('/').to_string(),
        }
    }

    /// Open a tunnel to `127.0.0.1:port` and return its public URL
    pub async fn open(&self, port: u16) -> Result<Tunnel, TunnelError> {
        let request = OpenRequest {
            name: TUNNEL_NAME,
            proto: "http",
            addr: port.to_string(),
        };
        let response = self
            .http
            .post(format!("{}/api/tunnels", self.base))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunnelError::Agent(status.as_u16()));
        }

        let reply: OpenReply = response.json().await?;
        let public_url = reply.public_url.ok_or(TunnelError::MissingUrl)?;
        let public_url = force_https(&public_url);
        tracing::info!("tunnel open: {} -> 127.0.0.1:{}", public_url, port);

        Ok(Tunnel {
            public_url,
            name: TUNNEL_NAME.to_string(),
        })
    }

    /// Delete the tunnel at the agent
    pub async fn close(&self, tunnel: &Tunnel) -> Result<(), TunnelError> {
        let response = self
            .http
            .delete(format!("{}/api/tunnels/{}", self.base, tunnel.name))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunnelError::Agent(status.as_u16()));
        }
        tracing::info!("tunnel closed");
        Ok(())
    }
}

/// Rewrite an http URL to https; anything else passes through untouched
pub fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_https_rewrites_http() {
        assert_eq!(
            force_https("http://abc123.tunnel.example"),
            "https://abc123.tunnel.example"
        );
    }

    #[test]
    fn test_force_https_keeps_https() {
        assert_eq!(
            force_https("https://abc123.tunnel.example"),
            "https://abc123.tunnel.example"
        );
    }

    #[test]
    fn test_open_reply_parsing() {
        let reply: OpenReply =
            serde_json::from_str(r#"{"name":"hive","public_url":"http://x.example"}"#).unwrap();
        assert_eq!(reply.public_url.as_deref(), Some("http://x.example"));

        let bare: OpenReply = serde_json::from_str(r#"{"name":"hive"}"#).unwrap();
        assert!(bare.public_url.is_none());
    }
}
