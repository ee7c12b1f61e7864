//! `ChatClient` against a local mock of an OpenAI-compatible endpoint.

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::chat::{ChatSession, ReplyStatus};
use parley::types::{Provider, Turn};
use parley::{ChatClient, ClientOptions, Error, FailureKind, Transport};

fn client_for(server: &MockServer, key: &str) -> ChatClient {
    ChatClient::with_options(
        Some(key.to_string()),
        ClientOptions::new(Provider::DeepSeek)
            .with_base_url(format!("{}/v1", server.uri()))
            .with_model("test-model")
            .with_temperature(Some(0.5)),
    )
    .unwrap()
}

fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::from(": keep-alive\n\n");
    body.push_str(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
    );
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": fragment}}]})
        ));
    }
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn streams_fragments_into_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.5,
            "stream": true,
            "messages": [
                {"role": "system", "content": "You are a calculator."},
                {"role": "user", "content": "2+2?"}
            ]
        })))
        .respond_with(event_stream(sse_body(&["[Assist", "ant]: 4"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server, "sk-test"), "You are a calculator.");
    let status = session.submit("2+2?").unwrap().finish().await.unwrap();
    assert_eq!(status, ReplyStatus::Completed);
    assert_eq!(
        session.history(),
        &[
            Turn::system("You are a calculator."),
            Turn::user("2+2?"),
            Turn::assistant("[Assistant]: 4"),
        ]
    );
}

#[tokio::test]
async fn openrouter_requests_carry_attribution() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("x-title", "parley"))
        .and(header("http-referer", "https://crates.io/crates/parley"))
        .respond_with(event_stream(sse_body(&["hi"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::with_options(
        Some("sk-or-test".to_string()),
        ClientOptions::new(Provider::OpenRouter).with_base_url(format!("{}/api/v1", server.uri())),
    )
    .unwrap();
    let mut session = ChatSession::new(client, "s");
    let status = session.submit("hello").unwrap().finish().await.unwrap();
    assert_eq!(status, ReplyStatus::Completed);
    assert_eq!(session.history()[2], Turn::assistant("hi"));
}

#[tokio::test]
async fn unauthorized_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid API key", "type": "authentication_error"}
        })))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server, "sk-bad"), "s");
    let mut reply = session.submit("hello").unwrap();
    let err = reply.next().await.unwrap().unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(reply.status(), ReplyStatus::Failed(FailureKind::Authentication));
    drop(reply);
    assert_eq!(session.history(), &[Turn::system("s")]);
}

#[tokio::test]
async fn server_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("retry-after", "3")
                .set_body_string("upstream overloaded"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, "sk-test");
    let items: Vec<_> = client
        .complete(&[Turn::system("s"), Turn::user("u")])
        .collect()
        .await;
    assert_eq!(items.len(), 1);
    match &items[0] {
        Err(Error::ServiceUnavailable {
            message,
            retry_after,
        }) => {
            assert_eq!(message, "upstream overloaded");
            assert_eq!(*retry_after, Some(3));
        }
        other => panic!("expected service unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn mid_stream_error_rolls_back() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": "par"}}]}),
        json!({"error": {"message": "Provider returned error", "code": 502}})
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server, "sk-test"), "s");
    let err = session.submit("u").unwrap().finish().await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Transport);
    assert_eq!(session.turn_count(), 1);
}

#[tokio::test]
async fn empty_stream_is_empty_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(event_stream(sse_body(&[])))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server, "sk-test"), "s");
    let status = session.submit("u").unwrap().finish().await.unwrap();
    assert_eq!(status, ReplyStatus::Empty);
    assert_eq!(session.turn_count(), 2);
}

#[tokio::test]
async fn verify_lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "test-model", "object": "model", "owned_by": "tests"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, "sk-test");
    let models = client.list_models().await.unwrap();
    assert!(models.contains("test-model"));
    client.verify().await.unwrap();
}

#[tokio::test]
async fn verify_rejects_bad_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Authentication Fails", "type": "authentication_error"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, "sk-bad").verify().await.unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn nothing_is_sent_until_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream(sse_body(&["x"])))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, "sk-test");
    let stream = client.complete(&[Turn::system("s"), Turn::user("u")]);
    drop(stream);
}

#[tokio::test]
#[ignore] // Requires a real API key
async fn live_endpoint_round_trip() {
    let api_key = std::env::var(parley::client::API_KEY_ENV).ok();
    if api_key.is_none() {
        eprintln!("Skipping test: PARLEY_API_KEY not set");
        return;
    }

    let client = ChatClient::new(api_key).expect("Failed to create client");
    let mut session = ChatSession::new(client, "Answer with a single word.");
    let status = session
        .submit("What color is the sky on a clear day?")
        .unwrap()
        .finish()
        .await;
    assert!(status.is_ok(), "Request should succeed with valid API key");
}
