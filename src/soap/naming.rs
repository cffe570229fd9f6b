//! Operation name translation between the client and upstream conventions.
//!
//! Clients call `ettevottegaSeotudIsikudV1`, the registry answers to
//! `ettevottegaSeotudIsikud_v1`. Translation is literal byte substitution of
//! the operation token and its response-suffixed variant; nothing is parsed.

use crate::config::OperationConfig;

/// Which side of the bridge the content is travelling towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client payload on its way to the upstream service.
    ToUpstream,
    /// Upstream payload on its way back to the client.
    ToClient,
}

/// Rewrites one operation's identifiers between two renderings.
#[derive(Debug, Clone)]
pub struct NameTranslator {
    client: String,
    client_response: String,
    upstream: String,
    upstream_response: String,
}

impl NameTranslator {
    pub fn new(client: &str, upstream: &str, response_suffix: &str) -> Self {
        Self {
            client: client.to_string(),
            client_response: format!("{client}{response_suffix}"),
            upstream: upstream.to_string(),
            upstream_response: format!("{upstream}{response_suffix}"),
        }
    }

    pub fn from_config(config: &OperationConfig) -> Self {
        Self::new(&config.client_name, &config.upstream_name, &config.response_suffix)
    }

    /// Rewrite every occurrence of the source rendering into the target one.
    ///
    /// The response token is substituted before the bare token so the longer
    /// identifier is never split by the shorter replacement.
    pub fn translate(&self, content: &[u8], direction: Direction) -> Vec<u8> {
        let (from, from_response, to, to_response) = match direction {
            Direction::ToUpstream => (
                &self.client,
                &self.client_response,
                &self.upstream,
                &self.upstream_response,
            ),
            Direction::ToClient => (
                &self.upstream,
                &self.upstream_response,
                &self.client,
                &self.client_response,
            ),
        };

        let content = replace_all(content, from_response.as_bytes(), to_response.as_bytes());
        replace_all(&content, from.as_bytes(), to.as_bytes())
    }
}

/// Non-overlapping, left-to-right replacement of `from` with `to`.
fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
