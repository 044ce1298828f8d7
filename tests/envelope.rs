//! Envelope semantics: typed decoding, failure hooks, problem details.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use service_relay::{RelayConfig, ServiceClient, TargetConfig};

mod common;

use common::FakeTransport;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
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

#[tokio::test]
async fn success_bodies_decode_into_typed_content() {
    let transport = FakeTransport::status(200, "{\"id\":\"1\",\"title\":\"Dune\"}");
    let client = client_for(transport);

    let response = client
        .service("books")
        .path("/books/1")
        .get_json::<Book>()
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.content,
        Some(Book {
            id: "1".to_string(),
            title: "Dune".to_string(),
        })
    );
    assert!(response.problem_details.is_none());
}

#[tokio::test]
async fn failure_hook_sees_the_status_and_raw_body() {
    let transport = FakeTransport::status(422, "{\"error\":\"bad title\"}");
    let client = client_for(transport);

    let invoked = Arc::new(AtomicU32::new(0));
    let observed = invoked.clone();
    let response = client
        .service("books")
        .path("/books")
        .on_failure(Arc::new(move |status, body| {
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body, b"{\"error\":\"bad title\"}");
            observed.fetch_add(1, Ordering::SeqCst);
        }))
        .get_json::<Book>()
        .await
        .unwrap();

    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert!(response.content.is_none());
    // the hook consumed the failure body, so nothing is decoded
    assert!(response.problem_details.is_none());
}

#[tokio::test]
async fn failure_body_decodes_as_problem_details_when_no_hook_is_set() {
    let transport = FakeTransport::status(422, "{\"error\":\"bad title\"}");
    let client = client_for(transport);

    let response = client
        .service("books")
        .path("/books")
        .get_json::<Book>()
        .await
        .unwrap();

    assert!(response.content.is_none());
    assert_eq!(
        response.problem_details,
        Some(serde_json::json!({"error": "bad title"}))
    );
}

#[tokio::test]
async fn json_bodies_are_serialized_with_a_content_type() {
    let transport = FakeTransport::status(201, "{\"id\":\"2\",\"title\":\"Emma\"}");
    let client = client_for(transport.clone());

    let book = Book {
        id: "2".to_string(),
        title: "Emma".to_string(),
    };
    let response = client
        .service("books")
        .path("/books")
        .post_body_json::<_, Book>(&book)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.content, Some(book));

    let seen = transport.seen_requests();
    assert_eq!(
        seen[0].body.as_deref(),
        Some(&b"{\"id\":\"2\",\"title\":\"Emma\"}"[..])
    );
    assert!(seen[0]
        .headers
        .iter()
        .any(|(n, v)| n == "content-type" && v == "application/json"));
}
