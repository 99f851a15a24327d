//! Base URL resolution for the REST surface and the push stream.
//!
//! Two deployments are supported:
//! - Same-origin: no API base configured; REST paths stay relative (a reverse
//!   proxy routes them) and the stream URL is derived from the page origin.
//! - Cross-origin: an absolute API base; the stream scheme is derived from it
//!   (`http` -> `ws`, `https` -> `wss`).

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid URL '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{0}': expected http, https, ws or wss")]
    UnsupportedScheme(String),

    #[error("URL '{0}' has no host")]
    MissingHost(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiBase {
    SameOrigin { origin: Url },
    CrossOrigin { base: String },
}

impl ApiBase {
    /// Resolve from an optional configured base. Empty or whitespace-only
    /// values count as absent.
    pub fn from_env_value(api_url: Option<&str>, origin: &str) -> Result<Self, EndpointError> {
        match api_url.map(str::trim).filter(|v| !v.is_empty()) {
            Some(base) => {
                let base = base.trim_end_matches('/').to_string();
                let parsed = parse(&base)?;
                http_scheme(&parsed)?;
                if parsed.host_str().is_none() {
                    return Err(EndpointError::MissingHost(base));
                }
                Ok(Self::CrossOrigin { base })
            }
            None => {
                let origin = parse(origin)?;
                http_scheme(&origin)?;
                if origin.host_str().is_none() {
                    return Err(EndpointError::MissingHost(origin.to_string()));
                }
                Ok(Self::SameOrigin { origin })
            }
        }
    }

    pub fn is_cross_origin(&self) -> bool {
        matches!(self, Self::CrossOrigin { .. })
    }

    /// REST URL for `endpoint`. Relative in same-origin mode.
    pub fn api_url(&self, endpoint: &str) -> String {
        let path = normalize_path(endpoint);
        match self {
            Self::CrossOrigin { base } => format!("{}{}", base, path),
            Self::SameOrigin { .. } => path,
        }
    }

    /// Stream URL for `endpoint`.
    pub fn ws_url(&self, endpoint: &str) -> Result<String, EndpointError> {
        let path = normalize_path(endpoint);
        match self {
            Self::CrossOrigin { base } => {
                // `http` prefix covers `https` as well.
                let ws_base = match base.strip_prefix("http") {
                    Some(rest) => format!("ws{}", rest),
                    None => base.clone(),
                };
                Ok(format!("{}{}", ws_base, path))
            }
            Self::SameOrigin { origin } => {
                let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
                let host = origin
                    .host_str()
                    .ok_or_else(|| EndpointError::MissingHost(origin.to_string()))?;
                let authority = match origin.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                Ok(format!("{}://{}{}", scheme, authority, path))
            }
        }
    }
}

/// Same URL with the port replaced; used for the alternate-port fallback.
pub fn with_port(url: &str, port: u16) -> Result<String, EndpointError> {
    let mut parsed = parse(url)?;
    parsed
        .set_port(Some(port))
        .map_err(|_| EndpointError::MissingHost(url.to_string()))?;
    Ok(parsed.to_string())
}

fn normalize_path(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{}", endpoint)
    }
}

fn parse(url: &str) -> Result<Url, EndpointError> {
    Url::parse(url).map_err(|source| EndpointError::Invalid {
        url: url.to_string(),
        source,
    })
}

fn http_scheme(url: &Url) -> Result<(), EndpointError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(EndpointError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_ORIGIN: &str = "http://localhost:5173";

    #[test]
    fn cross_origin_trims_trailing_slash() {
        let base = ApiBase::from_env_value(Some("https://zentinel.example.com/"), DEV_ORIGIN)
            .expect("resolve");
        assert!(base.is_cross_origin());
        assert_eq!(
            base.api_url("/api/v1/zones"),
            "https://zentinel.example.com/api/v1/zones"
        );
    }

    #[test]
    fn cross_origin_maps_https_to_wss() {
        let base = ApiBase::from_env_value(Some("https://zentinel.example.com"), DEV_ORIGIN)
            .expect("resolve");
        assert_eq!(
            base.ws_url("/api/v1/ws").expect("ws"),
            "wss://zentinel.example.com/api/v1/ws"
        );
    }

    #[test]
    fn cross_origin_maps_http_to_ws_and_keeps_port() {
        let base =
            ApiBase::from_env_value(Some("http://10.0.0.5:8000"), DEV_ORIGIN).expect("resolve");
        assert_eq!(
            base.ws_url("api/v1/ws").expect("ws"),
            "ws://10.0.0.5:8000/api/v1/ws"
        );
    }

    #[test]
    fn empty_value_selects_same_origin() {
        let base = ApiBase::from_env_value(Some("  "), DEV_ORIGIN).expect("resolve");
        assert!(!base.is_cross_origin());
        assert_eq!(base.api_url("api/v1/stop"), "/api/v1/stop");
        assert_eq!(
            base.ws_url("/api/v1/ws").expect("ws"),
            "ws://localhost:5173/api/v1/ws"
        );
    }

    #[test]
    fn secure_origin_uses_wss() {
        let base = ApiBase::from_env_value(None, "https://ops.example.com").expect("resolve");
        assert_eq!(
            base.ws_url("/api/v1/ws").expect("ws"),
            "wss://ops.example.com/api/v1/ws"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        let err = ApiBase::from_env_value(Some("ftp://files.example.com"), DEV_ORIGIN)
            .expect_err("must reject");
        assert!(matches!(err, EndpointError::UnsupportedScheme(_)));
    }

    #[test]
    fn rejects_garbage_base() {
        let err = ApiBase::from_env_value(Some("not a url"), DEV_ORIGIN).expect_err("reject");
        assert!(err.to_string().contains("invalid URL"));
    }

    #[test]
    fn with_port_replaces_port() {
        assert_eq!(
            with_port("ws://localhost:5173/api/v1/ws", 8000).expect("port"),
            "ws://localhost:8000/api/v1/ws"
        );
        assert_eq!(
            with_port("wss://ops.example.com/api/v1/ws", 8000).expect("port"),
            "wss://ops.example.com:8000/api/v1/ws"
        );
    }
}
