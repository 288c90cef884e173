//! Websocket endpoint selection and route resolution
//!
//! Development builds talk to a fixed local server. Production builds derive
//! the endpoint from the page origin: `http` becomes `ws`, `https` becomes
//! `wss`, and the socket path is appended.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed local development endpoint
pub const DEV_URL: &str = "ws://localhost:8080/ws";

/// Path of the shell view
pub const SHELL_ROUTE: &str = "/shell/";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Production mode needs a page origin")]
    MissingOrigin,

    #[error("Unsupported origin scheme in {0:?} (expected http or https)")]
    Scheme(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

/// Where the socket lives relative to the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointShape {
    /// Application served at the root: `/ws`
    #[default]
    Fixed,
    /// Application served under the shell route: `/shell/ws`
    Routed,
}

impl EndpointShape {
    pub fn path(self) -> &'static str {
        match self {
            EndpointShape::Fixed => "/ws",
            EndpointShape::Routed => "/shell/ws",
        }
    }
}

/// Pick the websocket URL for this build
pub fn select_endpoint(
    mode: BuildMode,
    origin: Option<&str>,
    shape: EndpointShape,
    dev_url: &str,
) -> Result<String, EndpointError> {
    match mode {
        BuildMode::Development => Ok(dev_url.to_string()),
        BuildMode::Production => {
            let origin = origin.ok_or(EndpointError::MissingOrigin)?;
            let socket_origin = if let Some(rest) = origin.strip_prefix("https://") {
                format!("wss://{}", rest)
            } else if let Some(rest) = origin.strip_prefix("http://") {
                format!("ws://{}", rest)
            } else {
                return Err(EndpointError::Scheme(origin.to_string()));
            };
            Ok(format!("{}{}", socket_origin.trim_end_matches('/'), shape.path()))
        }
    }
}

/// Result of resolving a client-side path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Render the shell view
    Shell,
    /// Navigate to the given path instead
    Redirect(&'static str),
}

/// The shell view is the only route; everything else lands on it
pub fn resolve_route(path: &str) -> Route {
    match path {
        "/shell/" | "/shell" => Route::Shell,
        _ => Route::Redirect(SHELL_ROUTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_uses_fixed_url() {
        let url = select_endpoint(
            BuildMode::Development,
            Some("https://ignored"),
            EndpointShape::Routed,
            DEV_URL,
        );
        assert_eq!(url.unwrap(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_production_derives_from_origin() {
        let production =
            |origin, shape| select_endpoint(BuildMode::Production, origin, shape, DEV_URL);

        let url = production(Some("http://host:8080"), EndpointShape::Fixed);
        assert_eq!(url.unwrap(), "ws://host:8080/ws");

        let url = production(Some("https://example.com/"), EndpointShape::Routed);
        assert_eq!(url.unwrap(), "wss://example.com/shell/ws");
    }

    #[test]
    fn test_production_rejects_bad_origin() {
        assert_eq!(
            select_endpoint(BuildMode::Production, None, EndpointShape::Fixed, DEV_URL),
            Err(EndpointError::MissingOrigin)
        );
        let url = select_endpoint(
            BuildMode::Production,
            Some("ftp://host"),
            EndpointShape::Fixed,
            DEV_URL,
        );
        assert_eq!(url, Err(EndpointError::Scheme("ftp://host".to_string())));
    }

    #[test]
    fn test_routes() {
        assert_eq!(resolve_route("/shell/"), Route::Shell);
        assert_eq!(resolve_route("/shell"), Route::Shell);
        assert_eq!(resolve_route("/"), Route::Redirect("/shell/"));
        assert_eq!(resolve_route("/other/page"), Route::Redirect("/shell/"));
    }
}
