//! SOAP 1.1 envelope validation.
//!
//! The bridge only needs to know that an inbound payload is a well-formed
//! envelope with a body; everything inside `Header` and `Body` stays opaque
//! and is handed on as slices of the original buffer.

use bytes::Bytes;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

/// Namespace of SOAP 1.1 envelope elements.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Reasons a payload is not accepted as an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("document has no root element")]
    NoRoot,

    #[error("expected SOAP Envelope root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("document ended before the envelope was closed")]
    Truncated,

    #[error("text content outside the envelope")]
    ContentOutsideRoot,

    #[error("envelope has no Body")]
    MissingBody,

    #[error("envelope has more than one {0}")]
    DuplicateSection(&'static str),
}

/// A validated envelope. Sections are zero-copy views into the inbound payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    header: Option<Bytes>,
    body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Body,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Header => "Header",
            Section::Body => "Body",
        }
    }
}

impl Envelope {
    /// Inner content of `Header`, if the envelope carries one.
    pub fn header(&self) -> Option<&Bytes> {
        self.header.as_ref()
    }

    /// Inner content of `Body`.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Validate `payload` as a SOAP envelope.
    pub fn parse(payload: &Bytes) -> Result<Self, EnvelopeError> {
        let mut reader = NsReader::from_reader(payload.as_ref());
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut open: Option<(Section, usize)> = None;
        let mut header: Option<Bytes> = None;
        let mut body: Option<Bytes> = None;

        loop {
            let before = reader.buffer_position() as usize;
            let (ns, event) = reader.read_resolved_event()?;
            let in_soap_ns = is_soap_ns(ns);

            match event {
                Event::Start(start) => {
                    for attr in start.attributes() {
                        attr?;
                    }
                    let local = start.local_name();
                    if depth == 0 {
                        if !(in_soap_ns && local.as_ref() == b"Envelope") {
                            return Err(EnvelopeError::UnexpectedRoot(display_name(start.name().as_ref())));
                        }
                        seen_root = true;
                    } else if depth == 1 && in_soap_ns {
                        if let Some(section) = section_of(local.as_ref()) {
                            check_unique(section, &header, &body)?;
                            open = Some((section, reader.buffer_position() as usize));
                        }
                    }
                    depth += 1;
                }
                Event::Empty(start) => {
                    for attr in start.attributes() {
                        attr?;
                    }
                    let local = start.local_name();
                    if depth == 0 {
                        if in_soap_ns && local.as_ref() == b"Envelope" {
                            return Err(EnvelopeError::MissingBody);
                        }
                        return Err(EnvelopeError::UnexpectedRoot(display_name(start.name().as_ref())));
                    }
                    if depth == 1 && in_soap_ns {
                        if let Some(section) = section_of(local.as_ref()) {
                            check_unique(section, &header, &body)?;
                            store(section, Bytes::new(), &mut header, &mut body);
                        }
                    }
                }
                Event::End(_) => {
                    depth = depth.checked_sub(1).ok_or(EnvelopeError::ContentOutsideRoot)?;
                    if depth == 1 {
                        if let Some((section, start)) = open.take() {
                            store(section, payload.slice(start..before), &mut header, &mut body);
                        }
                    }
                    if depth == 0 {
                        break;
                    }
                }
                Event::Text(text) if depth == 0 => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(EnvelopeError::ContentOutsideRoot);
                    }
                }
                Event::CData(_) if depth == 0 => return Err(EnvelopeError::ContentOutsideRoot),
                Event::Eof => {
                    return Err(if seen_root {
                        EnvelopeError::Truncated
                    } else {
                        EnvelopeError::NoRoot
                    });
                }
                _ => {}
            }
        }

        let body = body.ok_or(EnvelopeError::MissingBody)?;
        Ok(Self { header, body })
    }
}

fn is_soap_ns(ns: ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == SOAP_ENV_NS.as_bytes())
}

fn section_of(local: &[u8]) -> Option<Section> {
    match local {
        b"Header" => Some(Section::Header),
        b"Body" => Some(Section::Body),
        _ => None,
    }
}

fn check_unique(
    section: Section,
    header: &Option<Bytes>,
    body: &Option<Bytes>,
) -> Result<(), EnvelopeError> {
    let taken = match section {
        Section::Header => header.is_some(),
        Section::Body => body.is_some(),
    };
    if taken {
        Err(EnvelopeError::DuplicateSection(section.name()))
    } else {
        Ok(())
    }
}

fn store(section: Section, content: Bytes, header: &mut Option<Bytes>, body: &mut Option<Bytes>) {
    match section {
        Section::Header => *header = Some(content),
        Section::Body => *body = Some(content),
    }
}

fn display_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
