//! Single-flight deduplication of concurrent identical GETs.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use service_relay::{RelayConfig, ServiceClient, TargetConfig};

mod common;

use common::FakeTransport;

#[derive(Debug, Deserialize, PartialEq)]
struct Book {
    id: String,
    title: String,
}

fn client_for(
    transport: std::sync::Arc<FakeTransport>,
) -> ServiceClient<std::sync::Arc<FakeTransport>> {
    common::init_tracing();
    let config = RelayConfig::default()
        .target(TargetConfig::new("books", "http://api-books"));
    ServiceClient::with_transport(config, transport)
}

#[tokio::test(start_paused = true)]
async fn four_concurrent_identical_gets_share_one_upstream_call() {
    let transport = FakeTransport::slow(
        200,
        "{\"id\":\"1\",\"title\":\"Dune\"}",
        Duration::from_millis(20),
    );
    let client = client_for(transport.clone());

    let call = || {
        client
            .service("books")
            .path("books/1")
            .query("deleted", Some("true"))
            .get_json::<Book>()
    };
    let (a, b, c, d) = tokio::join!(call(), call(), call(), call());

    assert_eq!(transport.invocations(), 1);
    for response in [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()] {
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.content,
            Some(Book {
                id: "1".to_string(),
                title: "Dune".to_string(),
            })
        );
    }
}

#[tokio::test(start_paused = true)]
async fn different_paths_do_not_share_a_call() {
    let transport = FakeTransport::slow(200, "{}", Duration::from_millis(20));
    let client = client_for(transport.clone());

    let (a, b) = tokio::join!(
        client.service("books").path("books/1").get(),
        client.service("books").path("books/2").get(),
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(transport.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn skip_dedup_forces_separate_calls() {
    let transport = FakeTransport::slow(200, "{}", Duration::from_millis(20));
    let client = client_for(transport.clone());

    let (a, b) = tokio::join!(
        client.service("books").path("books/1").skip_dedup().get(),
        client.service("books").path("books/1").skip_dedup().get(),
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(transport.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn posts_are_never_deduplicated() {
    let transport = FakeTransport::slow(201, "{}", Duration::from_millis(20));
    let client = client_for(transport.clone());

    let body = serde_json::json!({"title": "Dune"});
    let (a, b) = tokio::join!(
        client.service("books").path("books").post_body(&body),
        client.service("books").path("books").post_body(&body),
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(transport.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn the_dedup_window_closes_when_the_call_completes() {
    let transport = FakeTransport::slow(200, "{}", Duration::from_millis(20));
    let client = client_for(transport.clone());

    client.service("books").path("books/1").get().await.unwrap();
    client.service("books").path("books/1").get().await.unwrap();

    assert_eq!(transport.invocations(), 2);
}
