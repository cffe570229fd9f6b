//! Best-effort recognition of the proxied operation inside an envelope body.
//!
//! Used only to put the operation and its business identifier into the logs.
//! Any mismatch yields `None`; the result never influences forwarding.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::OperationConfig;

/// What the probe found in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub operation: String,
    pub business_id: String,
}

/// Looks for one known operation element and reads a field below it.
#[derive(Debug, Clone)]
pub struct OperationProbe {
    operation: String,
    id_path: Vec<String>,
}

impl OperationProbe {
    pub fn new(operation: impl Into<String>, id_path: Vec<String>) -> Self {
        Self {
            operation: operation.into(),
            id_path,
        }
    }

    pub fn from_config(config: &OperationConfig) -> Self {
        Self::new(config.client_name.clone(), config.business_id_path.clone())
    }

    /// Inspect the inner content of a SOAP `Body`.
    ///
    /// Elements are matched by local name; the namespace prefixes declared on
    /// the envelope are not visible once the body has been cut out.
    pub fn inspect(&self, body: &[u8]) -> Option<OperationRecord> {
        let mut reader = Reader::from_reader(body);
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut business_id = String::new();

        loop {
            match reader.read_event().ok()? {
                Event::Start(start) => {
                    let local = start.local_name().as_ref().to_vec();
                    if stack.is_empty() && local != self.operation.as_bytes() {
                        return None;
                    }
                    stack.push(local);
                }
                Event::Empty(start) => {
                    if stack.is_empty() {
                        return (start.local_name().as_ref() == self.operation.as_bytes())
                            .then(|| self.record(String::new()));
                    }
                }
                Event::Text(text) if self.at_id(&stack) => {
                    business_id.push_str(&text.unescape().ok()?);
                }
                Event::CData(data) if self.at_id(&stack) => {
                    business_id.push_str(std::str::from_utf8(&data).ok()?);
                }
                Event::End(_) => {
                    stack.pop();
                    if stack.is_empty() {
                        return Some(self.record(business_id.trim().to_string()));
                    }
                }
                Event::Eof => return None,
                _ => {}
            }
        }
    }

    fn at_id(&self, stack: &[Vec<u8>]) -> bool {
        stack.len() == self.id_path.len() + 1
            && stack[1..]
                .iter()
                .zip(&self.id_path)
                .all(|(open, want)| open.as_slice() == want.as_bytes())
    }

    fn record(&self, business_id: String) -> OperationRecord {
        OperationRecord {
            operation: self.operation.clone(),
            business_id,
        }
    }
}
