//! Header allow-listing in both directions.
//!
//! # Responsibilities
//! - Pick the inbound headers that may reach the upstream
//! - Supply a default User-Agent when the caller sent none
//! - Strip hop-by-hop headers from the upstream reply and fix Content-Length
//!
//! # Design Decisions
//! - Outbound is an allow-list: SOAPAction, User-Agent and the trusted prefix
//! - Inbound Content-Length is never forwarded; the body is rewritten
//! - Prefix matching is case-insensitive because header names are normalized

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::UpstreamConfig;
use crate::upstream::SOAP_CONTENT_TYPE;

pub const SOAP_ACTION: HeaderName = HeaderName::from_static("soapaction");

const FALLBACK_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Which inbound headers travel upstream.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    default_user_agent: HeaderValue,
    trusted_prefix: String,
}

impl HeaderPolicy {
    pub fn new(default_user_agent: &str, trusted_prefix: &str) -> Self {
        let default_user_agent = HeaderValue::from_str(default_user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_USER_AGENT));
        Self {
            default_user_agent,
            trusted_prefix: trusted_prefix.to_ascii_lowercase(),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(&config.default_user_agent, &config.forwarded_header_prefix)
    }

    /// Headers for the upstream request.
    pub fn outbound(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));

        if let Some(action) = non_empty(inbound, &SOAP_ACTION) {
            headers.insert(SOAP_ACTION, action.clone());
        }

        let user_agent = non_empty(inbound, &header::USER_AGENT)
            .cloned()
            .unwrap_or_else(|| self.default_user_agent.clone());
        headers.insert(header::USER_AGENT, user_agent);

        for (name, value) in inbound {
            if self.is_trusted(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        headers
    }

    /// The bare prefix is not a header of its own; something must follow it.
    fn is_trusted(&self, name: &HeaderName) -> bool {
        let name = name.as_str();
        !self.trusted_prefix.is_empty()
            && name.len() > self.trusted_prefix.len()
            && name.starts_with(&self.trusted_prefix)
    }
}

/// Headers for the client response carrying a rewritten body of `body_len` bytes.
pub fn client_headers(upstream: &HeaderMap, body_len: usize) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 1);
    for (name, value) in upstream {
        if name == header::CONTENT_LENGTH || HOP_BY_HOP.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(SOAP_CONTENT_TYPE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_len));
    headers
}

fn non_empty<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a HeaderValue> {
    headers.get(name).filter(|value| !value.is_empty())
}
