//! Request pipeline tests against the router with a stub upstream.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

use common::*;
use soap_bridge::upstream::{TimeoutPhase, TransportError, UpstreamError, UpstreamResponse};

fn soap_post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/soap")
        .header(header::HOST, "bridge.local:1236")
        .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn operation_is_renamed_both_ways() {
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);
    let app = app(upstream.clone());

    let response = app.oneshot(soap_post(CLIENT_REQUEST)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    let sent = std::str::from_utf8(&calls[0].body).unwrap();
    assert!(sent.contains("<prod:ettevottegaSeotudIsikud_v1>"));
    assert!(sent.contains("</prod:ettevottegaSeotudIsikud_v1>"));
    assert!(!sent.contains("ettevottegaSeotudIsikudV1"));
    assert!(sent.contains("<prod:ariregistri_kood>10000018</prod:ariregistri_kood>"));

    let declared: usize = response.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = body_string(response).await;
    assert_eq!(declared, body.len());
    assert!(body.contains("<ns1:ettevottegaSeotudIsikudV1Response>"));
    assert!(!body.contains("ettevottegaSeotudIsikud_v1"));
    assert!(body.contains("Mari Maasikas"));
}

#[tokio::test]
async fn response_without_operation_name_is_unchanged() {
    const FAULT: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><SOAP-ENV:Fault><faultstring>Päringu viga</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;
    let upstream = StubUpstream::replying(|_| {
        let mut reply = ok_response(FAULT);
        reply.status = StatusCode::INTERNAL_SERVER_ERROR;
        Ok(reply)
    });

    let response = app(upstream).oneshot(soap_post(CLIENT_REQUEST)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, FAULT);
}

#[tokio::test]
async fn non_post_methods_are_rejected() {
    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);
        let request = Request::builder()
            .method(method.clone())
            .uri("/soap")
            .body(Body::from(CLIENT_REQUEST))
            .unwrap();

        let response = app(upstream.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(
            body_string(response).await.trim_end(),
            "Only POST method is allowed for SOAP requests"
        );
        assert_eq!(upstream.call_count(), 0);
    }
}

#[tokio::test]
async fn invalid_envelopes_never_reach_upstream() {
    let cases = [
        "",
        "not xml at all",
        "<soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\"><soapenv:Body>",
        "<Envelope><Body/></Envelope>",
        "<soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\"><soapenv:Header/></soapenv:Envelope>",
        "<root><soapenv:Body xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\"/></root>",
    ];

    for case in cases {
        let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);
        let response = app(upstream.clone()).oneshot(soap_post(case)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{case:?}");
        assert_eq!(body_string(response).await.trim_end(), "Error parsing SOAP envelope");
        assert_eq!(upstream.call_count(), 0, "{case:?}");
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = test_config();
    config.listener.max_body_bytes = 64;
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);

    let response = app_with_config(config, upstream.clone())
        .oneshot(soap_post(CLIENT_REQUEST))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await.trim_end(), "Error reading request body");
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn discovery_is_served_locally() {
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);

    let requests = [
        Request::get("/soap")
            .header(header::HOST, "bridge.local:1236")
            .body(Body::empty())
            .unwrap(),
        Request::post("/soap?wsdl")
            .header(header::HOST, "bridge.local:1236")
            .body(Body::from(CLIENT_REQUEST))
            .unwrap(),
        Request::post("/soap?WSDL")
            .header(header::HOST, "bridge.local:1236")
            .body(Body::empty())
            .unwrap(),
        Request::get("/wsdl")
            .header(header::HOST, "bridge.local:1236")
            .body(Body::empty())
            .unwrap(),
    ];

    for request in requests {
        let uri = request.uri().clone();
        let response = app(upstream.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml; charset=utf-8");
        let body = body_string(response).await;
        assert!(body.contains("http://bridge.local:1236/soap"), "{uri}");
        assert!(body.contains("ettevottegaSeotudIsikudV1"));
    }
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn only_allow_listed_headers_are_forwarded() {
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);
    let request = Request::post("/soap")
        .header("SOAPAction", "\"ettevottegaSeotudIsikudV1\"")
        .header("X-Road-Client", "EE/COM/12345678/client")
        .header("X-Road-Id", "abc-123")
        .header("Authorization", "Basic c2VjcmV0")
        .header("Cookie", "session=1")
        .header("X-Forwarded-For", "203.0.113.7")
        .body(Body::from(CLIENT_REQUEST))
        .unwrap();

    let response = app(upstream.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = &upstream.calls()[0].headers;
    assert_eq!(headers["soapaction"], "\"ettevottegaSeotudIsikudV1\"");
    assert_eq!(headers["x-road-client"], "EE/COM/12345678/client");
    assert_eq!(headers["x-road-id"], "abc-123");
    assert_eq!(headers["user-agent"], concat!("soap-bridge/", env!("CARGO_PKG_VERSION")));
    assert_eq!(headers["content-type"], "text/xml; charset=utf-8");
    for dropped in ["authorization", "cookie", "x-forwarded-for", "x-request-id", "host"] {
        assert!(headers.get(dropped).is_none(), "{dropped} leaked upstream");
    }
}

#[tokio::test]
async fn transport_failures_become_bad_gateway() {
    let cases: [(fn() -> TransportError, &str); 4] = [
        (
            || TransportError::ConnectionRefused { detail: "connect: refused".into() },
            "Backend service refused connection. Service may be down.",
        ),
        (
            || TransportError::Timeout {
                phase: TimeoutPhase::ResponseHeaders,
                after: Duration::from_secs(30),
            },
            "Backend service timeout. Service may be unavailable.",
        ),
        (
            || TransportError::Tls { detail: "UnknownIssuer".into() },
            "TLS/SSL connection error. Check certificate configuration.",
        ),
        (
            || TransportError::Other { detail: "reset".into() },
            "Error forwarding request to backend.",
        ),
    ];

    for (make, message) in cases {
        let upstream = StubUpstream::failing(move || UpstreamError::Transport(make()));
        let response = app(upstream.clone()).oneshot(soap_post(CLIENT_REQUEST)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        let body = body_string(response).await;
        assert_eq!(body.trim_end(), message);
        assert!(!body.contains("refused:") && !body.contains("UnknownIssuer"));
        assert_eq!(upstream.call_count(), 1, "exactly one attempt");
    }
}

#[tokio::test]
async fn upstream_hop_by_hop_headers_are_dropped() {
    let upstream = StubUpstream::replying(|_| {
        let mut reply: UpstreamResponse = ok_response(UPSTREAM_RESPONSE);
        reply.headers.insert("connection", "close".parse().unwrap());
        reply.headers.insert("x-upstream-trace", "t-1".parse().unwrap());
        Ok(reply)
    });

    let response = app(upstream).oneshot(soap_post(CLIENT_REQUEST)).await.unwrap();

    assert!(response.headers().get("connection").is_none());
    assert_eq!(response.headers()["x-upstream-trace"], "t-1");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);
    let response = app(upstream).oneshot(soap_post(CLIENT_REQUEST)).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn health_and_landing_pages() {
    let upstream = StubUpstream::with_body(UPSTREAM_RESPONSE);

    let response = app(upstream.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["target"], "https://ariregxmlv6.rik.ee/");

    for path in ["/", "/anything/else"] {
        let response = app(upstream.clone())
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("POST SOAP requests to /soap endpoint"));
        assert!(body.contains("Target: https://ariregxmlv6.rik.ee/"));
    }

    assert_eq!(upstream.call_count(), 0);
}
