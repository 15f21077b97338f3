//! End-to-end forwarding through the gate: caller auth, round-robin,
//! token refresh, buffered and streamed relays, and failure mapping.

mod common;

use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use http::{Method, StatusCode};

use common::{single_endpoint_config, start, two_endpoint_config, Reply, CALLER_TOKEN};
use imagegate::config::model::{OCTET_STREAM, ZIP_ARCHIVE};

#[tokio::test]
async fn json_result_is_relayed_with_status_and_type() {
    let gate = start(
        single_endpoint_config(),
        vec![Reply::json(StatusCode::OK, r#"{"ok":true}"#)],
    )
    .await;

    let resp = gate.generate("?param=1", r#"{"input":"a cat"}"#).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    assert!(resp.headers().contains_key("x-correlation-id"));
    assert_eq!(resp.text().await.unwrap(), r#"{"ok":true}"#);

    let seen = gate.upstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(
        seen[0].uri,
        "https://api.example.net/ai/generate-image?param=1"
    );
    assert_eq!(&seen[0].body[..], br#"{"input":"a cat"}"#);
    assert_eq!(seen[0].headers[AUTHORIZATION], "Bearer tok-1");
    assert_eq!(seen[0].headers[ACCEPT], ZIP_ARCHIVE);
    assert_eq!(seen[0].headers[CONTENT_TYPE], "application/json");
    assert_eq!(seen[0].headers[ORIGIN], "https://novelai.net");
}

#[tokio::test]
async fn caller_correlation_id_is_echoed() {
    let gate = start(single_endpoint_config(), vec![]).await;

    let resp = reqwest::Client::new()
        .get(gate.url("/ai/generate-image"))
        .header(AUTHORIZATION, format!("Bearer {CALLER_TOKEN}"))
        .header("x-correlation-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-correlation-id"], "trace-42");
    assert_eq!(gate.upstream.seen()[0].method, Method::GET);
}

#[tokio::test]
async fn missing_or_unknown_caller_token_is_rejected_before_upstream() {
    let gate = start(two_endpoint_config(), vec![]).await;
    let client = reqwest::Client::new();

    let missing = client
        .post(gate.url("/ai/generate-image"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);
    assert_eq!(missing.headers()[CONTENT_TYPE], "text/plain");
    assert_eq!(missing.text().await.unwrap(), "Unauthorized");

    let unknown = client
        .post(gate.url("/ai/generate-image"))
        .header(AUTHORIZATION, "Bearer not-on-the-list")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 401);

    let wrong_scheme = client
        .post(gate.url("/ai/generate-image"))
        .header(AUTHORIZATION, CALLER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_scheme.status(), 401);

    assert!(gate.upstream.seen().is_empty());
    assert_eq!(gate.state.dispatcher.lanes().map(|l| l.pending()).sum::<usize>(), 0);

    let health: imagegate::health::HealthResponse = reqwest::get(gate.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.stats.requests_rejected, 3);
}

#[tokio::test]
async fn calls_alternate_between_endpoints() {
    let gate = start(two_endpoint_config(), vec![]).await;

    for _ in 0..6 {
        assert_eq!(gate.generate("", "{}").await.status(), 200);
    }

    let hosts: Vec<String> = gate
        .upstream
        .seen()
        .iter()
        .map(|s| s.uri.split('/').nth(2).unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        hosts,
        vec![
            "api.example.net",
            "image.example.net",
            "api.example.net",
            "image.example.net",
            "api.example.net",
            "image.example.net",
        ]
    );
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_stream_relayed_intact() {
    let payload: Vec<u8> = (0..3 * 8192 + 5).map(|i| (i % 251) as u8).collect();
    let gate = start(
        single_endpoint_config(),
        vec![
            Reply::text(StatusCode::UNAUTHORIZED, "token expired"),
            Reply::binary(OCTET_STREAM, payload.clone(), 1000),
        ],
    )
    .await;
    assert_eq!(gate.upstream.logins(), 1);

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[CONTENT_TYPE], OCTET_STREAM);
    assert_eq!(&resp.bytes().await.unwrap()[..], &payload[..]);

    assert_eq!(gate.upstream.logins(), 2);
    let seen = gate.upstream.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].headers[AUTHORIZATION], "Bearer tok-1");
    assert_eq!(seen[1].headers[AUTHORIZATION], "Bearer tok-2");

    // The refreshed token is used by later calls without another login.
    assert_eq!(gate.generate("", "{}").await.status(), 200);
    assert_eq!(gate.upstream.logins(), 2);
    assert_eq!(gate.upstream.seen()[2].headers[AUTHORIZATION], "Bearer tok-2");
}

#[tokio::test]
async fn second_rejection_is_surfaced_without_another_retry() {
    let gate = start(
        single_endpoint_config(),
        vec![
            Reply::text(StatusCode::UNAUTHORIZED, "token expired"),
            Reply::text(StatusCode::UNAUTHORIZED, "still no"),
        ],
    )
    .await;

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("401 Client Error"), "{body}");
    assert!(body.contains("still no"), "{body}");

    assert_eq!(gate.upstream.seen().len(), 2);
    assert_eq!(gate.upstream.logins(), 2);
}

#[tokio::test]
async fn archive_result_is_streamed_as_200() {
    let gate = start(
        single_endpoint_config(),
        vec![Reply::binary(ZIP_ARCHIVE, b"PK\x03\x04rest".to_vec(), 3)],
    )
    .await;

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[CONTENT_TYPE], ZIP_ARCHIVE);
    assert_eq!(&resp.bytes().await.unwrap()[..], b"PK\x03\x04rest");
}

#[tokio::test]
async fn upstream_error_status_is_preserved() {
    let gate = start(
        single_endpoint_config(),
        vec![Reply::text(StatusCode::PAYMENT_REQUIRED, "out of credits")],
    )
    .await;

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 402);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
    let body = resp.text().await.unwrap();
    assert!(body.contains("402 Client Error"), "{body}");
    assert!(body.contains("https://api.example.net/ai/generate-image"), "{body}");
    assert_eq!(gate.upstream.logins(), 1);
}

#[tokio::test]
async fn transport_failure_is_500() {
    let gate = start(
        single_endpoint_config(),
        vec![Reply::Fail("connection refused")],
    )
    .await;

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
    assert!(resp.text().await.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn failed_refresh_is_500() {
    let gate = start(
        single_endpoint_config(),
        vec![Reply::text(StatusCode::UNAUTHORIZED, "token expired")],
    )
    .await;
    gate.upstream.set_login_fails(true);

    let resp = gate.generate("", "{}").await;
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("authentication"));
    assert_eq!(gate.upstream.seen().len(), 1);
}

#[tokio::test]
async fn one_worker_serves_its_queue_in_order() {
    let gate = start(
        single_endpoint_config(),
        vec![
            Reply::json(StatusCode::OK, r#"{"n":1}"#).delayed(Duration::from_millis(150)),
            Reply::json(StatusCode::OK, r#"{"n":2}"#),
        ],
    )
    .await;

    let first = gate.generate("?n=1", "{}");
    let second = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        gate.generate("?n=2", "{}").await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.text().await.unwrap(), r#"{"n":1}"#);
    assert_eq!(second.text().await.unwrap(), r#"{"n":2}"#);

    let uris: Vec<String> = gate.upstream.seen().into_iter().map(|s| s.uri).collect();
    assert!(uris[0].ends_with("?n=1"));
    assert!(uris[1].ends_with("?n=2"));
}

#[tokio::test]
async fn large_body_under_the_limit_is_forwarded_intact() {
    let gate = start(single_endpoint_config(), vec![]).await;
    let body = format!(r#"{{"image":"{}"}}"#, "A".repeat(3 * 1024 * 1024));

    let resp = gate.generate("", &body).await;
    assert_eq!(resp.status(), 200);

    let seen = gate.upstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body.len(), body.len());
    assert_eq!(&seen[0].body[..], body.as_bytes());
}
