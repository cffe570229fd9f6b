//! Service description (WSDL) for the client-facing operation.
//!
//! The document only advertises the client spelling of the operation and
//! points its SOAP address back at this bridge, using the host the caller
//! reached us on. It is rendered per request and never forwarded upstream.

use axum::{
    extract::{ConnectInfo, State},
    http::{header, request::Parts, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use quick_xml::escape::escape;
use std::net::SocketAddr;

use crate::config::OperationConfig;
use crate::http::server::{AppState, SOAP_PATH};
use crate::upstream::SOAP_CONTENT_TYPE;

const FALLBACK_HOST: &str = "localhost";

/// GET, or a `wsdl`/`WSDL` query key with any value, asks for the description.
pub fn wants_discovery(method: &Method, uri: &Uri) -> bool {
    if method == Method::GET {
        return true;
    }
    uri.query().is_some_and(|query| {
        url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == "wsdl" || key == "WSDL")
    })
}

/// Host the caller used to reach the bridge.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(authority) = uri.authority() {
        return authority.to_string();
    }
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .unwrap_or(FALLBACK_HOST)
        .to_string()
}

/// `/wsdl` endpoint. Accepts any method.
pub async fn wsdl_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> Response {
    let (parts, _body) = request.into_parts();
    wsdl_response(&state, remote, &parts)
}

pub(crate) fn wsdl_response(state: &AppState, remote: SocketAddr, parts: &Parts) -> Response {
    tracing::info!(
        remote = %remote,
        version = ?parts.version,
        method = %parts.method,
        path = %parts.uri.path(),
        "Serving WSDL"
    );

    let host = request_host(&parts.headers, &parts.uri);
    let document = render_wsdl(&state.config.operation, &host);
    ([(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)], document).into_response()
}

#[derive(Clone, Copy)]
enum Leaf {
    Text,
    Any,
}

/// Render the WSDL 1.1 document for `operation`, addressed at `host`.
pub fn render_wsdl(operation: &OperationConfig, host: &str) -> String {
    let ns = escape(operation.namespace.as_str());
    let service = escape(operation.service_name.as_str());
    let name = escape(operation.client_name.as_str());
    let response_name = format!("{}{}", operation.client_name, operation.response_suffix);
    let response = escape(response_name.as_str());
    let description = escape(operation.description.as_str());
    let location = format!("http://{host}{SOAP_PATH}");
    let address = escape(location.as_str());

    let mut request_schema = String::new();
    nested_element(&mut request_schema, &operation.business_id_path, 6, Leaf::Text);
    let mut response_schema = String::new();
    nested_element(
        &mut response_schema,
        &operation.business_id_path[..operation.business_id_path.len().min(1)],
        6,
        Leaf::Any,
    );

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions name="{service}Service"
             targetNamespace="{ns}"
             xmlns="http://schemas.xmlsoap.org/wsdl/"
             xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
             xmlns:tns="{ns}"
             xmlns:xsd="http://www.w3.org/2001/XMLSchema">

    <types>
        <xsd:schema targetNamespace="{ns}">
            <xsd:element name="{name}">
                <xsd:complexType>
                    <xsd:sequence>
{request_schema}                    </xsd:sequence>
                </xsd:complexType>
            </xsd:element>

            <xsd:element name="{response}">
                <xsd:complexType>
                    <xsd:sequence>
{response_schema}                    </xsd:sequence>
                </xsd:complexType>
            </xsd:element>
        </xsd:schema>
    </types>

    <message name="{name}Request">
        <part name="parameters" element="tns:{name}"/>
    </message>

    <message name="{response}">
        <part name="parameters" element="tns:{response}"/>
    </message>

    <portType name="{service}PortType">
        <operation name="{name}">
            <input message="tns:{name}Request"/>
            <output message="tns:{response}"/>
        </operation>
    </portType>

    <binding name="{service}Binding" type="tns:{service}PortType">
        <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>

        <operation name="{name}">
            <soap:operation soapAction="{name}"/>
            <input>
                <soap:body use="literal"/>
            </input>
            <output>
                <soap:body use="literal"/>
            </output>
        </operation>
    </binding>

    <service name="{service}Service">
        <documentation>{description}</documentation>
        <port name="{service}Port" binding="tns:{service}Binding">
            <soap:address location="{address}"/>
        </port>
    </service>

</definitions>
"#
    )
}

/// Schema for `path` as nested sequences, one level per segment.
fn nested_element(out: &mut String, path: &[String], level: usize, leaf: Leaf) {
    let Some((head, rest)) = path.split_first() else {
        if let Leaf::Any = leaf {
            line(
                out,
                level,
                r#"<xsd:any minOccurs="0" maxOccurs="unbounded" processContents="lax"/>"#,
            );
        }
        return;
    };

    let head = escape(head.as_str());
    if rest.is_empty() {
        if let Leaf::Text = leaf {
            line(out, level, &format!(r#"<xsd:element name="{head}" type="xsd:string"/>"#));
            return;
        }
    }

    line(out, level, &format!(r#"<xsd:element name="{head}">"#));
    line(out, level + 1, "<xsd:complexType>");
    line(out, level + 2, "<xsd:sequence>");
    nested_element(out, rest, level + 3, leaf);
    line(out, level + 2, "</xsd:sequence>");
    line(out, level + 1, "</xsd:complexType>");
    line(out, level, "</xsd:element>");
}

fn line(out: &mut String, level: usize, text: &str) {
    out.extend(std::iter::repeat("    ").take(level));
    out.push_str(text);
    out.push('\n');
}
