use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ollama_translate::backend::{Backend, OllamaBackend};
use ollama_translate::config::Config;
use ollama_translate::error::TranslateError;
use ollama_translate::model::ModelState;
use ollama_translate::orchestrator::Orchestrator;

const MODEL: &str = "mistral-small:latest";

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "model": MODEL,
        "created_at": "2024-11-02T10:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

#[tokio::test]
async fn test_list_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": MODEL, "size": 14_000_000_000u64 },
                { "name": "llama3.2:3b", "size": 2_000_000_000u64 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(Some(&server.uri())).unwrap();
    let models = backend.list_models().await.unwrap();

    assert_eq!(models, vec![MODEL.to_string(), "llama3.2:3b".to_string()]);
}

#[tokio::test]
async fn test_chat_sends_system_then_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "stream": false,
            "messages": [
                { "role": "system", "content": "translate please" },
                { "role": "user", "content": "Hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Bonjour")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(Some(&server.uri())).unwrap();
    let reply = backend.chat(MODEL, "translate please", "Hello").await.unwrap();

    assert_eq!(reply, "Bonjour");
}

#[tokio::test]
async fn test_server_error_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model runner crashed"))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(Some(&server.uri())).unwrap();
    let result = backend.chat(MODEL, "s", "t").await;

    match result {
        Err(TranslateError::Backend(msg)) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("model runner crashed"));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pull_reads_progress_stream() {
    let server = MockServer::start().await;
    let stream = concat!(
        "{\"status\":\"pulling manifest\"}\n",
        "{\"status\":\"downloading\",\"digest\":\"sha256:abc\",\"total\":100,\"completed\":50}\n",
        "{\"status\":\"verifying sha256 digest\"}\n",
        "{\"status\":\"success\"}\n"
    );
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(json!({ "model": MODEL, "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(Some(&server.uri())).unwrap();
    backend.pull_model(MODEL).await.unwrap();
}

#[tokio::test]
async fn test_pull_error_event_fails_the_pull() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"status\":\"pulling manifest\"}\n{\"error\":\"pull model manifest: file does not exist\"}\n",
        ))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(Some(&server.uri())).unwrap();
    let result = backend.pull_model("no-such-model").await;

    assert!(matches!(result, Err(TranslateError::Backend(msg)) if msg.contains("file does not exist")));
}

#[tokio::test]
async fn test_abort_all_cancels_in_flight_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("too late"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let backend = Arc::new(OllamaBackend::new(Some(&server.uri())).unwrap());
    let in_flight = tokio::spawn({
        let backend = Arc::clone(&backend);
        async move { backend.chat(MODEL, "s", "t").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    backend.abort_all();
    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .expect("aborted request should finish promptly")
        .unwrap();
    assert!(matches!(result, Err(TranslateError::Aborted)));

    // The handle stays usable after an abort
    assert!(backend.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_fails_lifecycle() {
    let backend = Arc::new(OllamaBackend::new(Some("http://127.0.0.1:9")).unwrap());
    let orchestrator = Orchestrator::start(Config::default(), backend);

    match orchestrator.lifecycle().wait_settled().await {
        ModelState::Failed { error } => assert!(error.contains("Failed to connect")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_model_is_pulled_then_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"success\"}\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Au revoir")))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        language: "French".to_string(),
        address: Some(server.uri()),
        ..Config::default()
    };
    let backend = Arc::new(OllamaBackend::new(config.address.as_deref()).unwrap());
    let orchestrator = Orchestrator::start(config, backend);

    assert_eq!(orchestrator.lifecycle().wait_settled().await, ModelState::Ready);

    let first = orchestrator.update_decorations("x = 1  # Bye").await;
    assert_eq!(first.translations.len(), 1);
    assert_eq!(first.translations[0].text, "Au revoir");

    // Served from the cache; the chat mock only accepts one request
    let second = orchestrator.update_decorations("x = 1  # Bye").await;
    assert!(second.translations[0].cached);
}
