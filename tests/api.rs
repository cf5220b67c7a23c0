//! End-to-end tests for the JSON HTTP API.
//!
//! Each test binds the server to an ephemeral port and points both
//! providers at a wiremock server standing in for the inference API, so
//! the full ingest → retrieve → generate path runs without real network
//! dependencies.

use std::net::SocketAddr;

use ragkit::answer::{EMPTY_KB_ANSWER, NO_CONTEXT_AVAILABLE, NO_RELEVANT_CONTEXT};
use ragkit::config::Config;
use ragkit::server::{serve, AppState};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBED_PATH: &str = "/pipeline/feature-extraction/test-embedder";
const GENERATE_PATH: &str = "/models/test-generator";

fn test_config(mock_uri: &str) -> Config {
    let mut config = Config::default();
    config.embedding.provider = "hf".to_string();
    config.embedding.model = Some("test-embedder".to_string());
    config.embedding.dims = 3;
    config.embedding.base_url = Some(mock_uri.to_string());
    config.embedding.max_retries = 0;
    config.generation.provider = "hf".to_string();
    config.generation.model = Some("test-generator".to_string());
    config.generation.base_url = Some(mock_uri.to_string());
    config.generation.max_retries = 0;
    config
}

async fn spawn_app(config: Config) -> SocketAddr {
    let state = AppState::from_config(&config).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, state).await.unwrap();
    });
    addr
}

async fn post_json(
    addr: SocketAddr,
    route: &str,
    body: serde_json::Value,
) -> (reqwest::StatusCode, serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}{}", addr, route))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn get_json(addr: SocketAddr, route: &str) -> serde_json::Value {
    reqwest::get(format!("http://{}{}", addr, route))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Embedding mock for a specific input text.
fn embed_mock(needle: &str, vector: Vec<f32>) -> Mock {
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([vector])))
}

#[tokio::test]
async fn test_health() {
    let mock = MockServer::start().await;
    let addr = spawn_app(test_config(&mock.uri())).await;

    let body = get_json(addr, "/health").await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ask_on_empty_store_makes_no_provider_calls() {
    let mock = MockServer::start().await;

    // Any provider call at all fails the test.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    let (status, body) = post_json(addr, "/ask", serde_json::json!({"question": "anything"})).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["answer"], EMPTY_KB_ANSWER);
    assert_eq!(body["context"], NO_CONTEXT_AVAILABLE);
    assert!(body.get("score").is_none());

    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 0);
}

#[tokio::test]
async fn test_ingest_then_ask_found() {
    let mock = MockServer::start().await;

    embed_mock("O curso dura 3 anos.", vec![1.0, 0.0, 0.0])
        .mount(&mock)
        .await;
    embed_mock("Quanto tempo dura o curso?", vec![0.8, 0.6, 0.0])
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!([{"generated_text": "O curso dura 3 anos."}]),
        ))
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    let (status, body) = post_json(
        addr,
        "/ingest",
        serde_json::json!({"text": "O curso dura 3 anos."}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["status"], "added");
    assert_eq!(body["chunks_created"], 1);

    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 1);

    let (status, body) = post_json(
        addr,
        "/ask",
        serde_json::json!({"question": "Quanto tempo dura o curso?"}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["answer"], "O curso dura 3 anos.");
    assert_eq!(body["context"], "O curso dura 3 anos.");
    let score = body["score"].as_f64().unwrap();
    assert!((score - 0.8).abs() < 1e-4, "score was {}", score);
}

#[tokio::test]
async fn test_ask_below_threshold() {
    let mock = MockServer::start().await;

    embed_mock("O curso dura 3 anos.", vec![1.0, 0.0, 0.0])
        .mount(&mock)
        .await;
    // Orthogonal to the stored passage: best score 0 < threshold 0.5.
    embed_mock("Qual a capital da Franca?", vec![0.0, 0.0, 1.0])
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    post_json(
        addr,
        "/ingest",
        serde_json::json!({"text": "O curso dura 3 anos."}),
    )
    .await;

    let (status, body) = post_json(
        addr,
        "/ask",
        serde_json::json!({"question": "Qual a capital da Franca?"}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .contains("suficientemente relevantes"));
    assert_eq!(body["context"], NO_RELEVANT_CONTEXT);
    assert!(body.get("score").is_none());
}

#[tokio::test]
async fn test_ingest_csv_batch() {
    let mock = MockServer::start().await;

    // One batched call embeds both rows.
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ])))
        .expect(1)
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    let csv = "id,context\n1,O curso dura 3 anos.\n2,As aulas sao noturnas.\n";
    let response = reqwest::Client::new()
        .post(format!("http://{}/ingest-csv", addr))
        .body(csv.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["documents_processed"], 2);
    assert_eq!(body["chunks_created"], 2);

    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 2);
}

#[tokio::test]
async fn test_ingest_csv_without_text_is_rejected() {
    let mock = MockServer::start().await;

    // Malformed input must abort before any provider call.
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/ingest-csv", addr))
        .body("context\n\n\n".to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "malformed_input");

    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 0);
}

#[tokio::test]
async fn test_clear_resets_stats() {
    let mock = MockServer::start().await;

    embed_mock("O curso dura 3 anos.", vec![1.0, 0.0, 0.0])
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    post_json(
        addr,
        "/ingest",
        serde_json::json!({"text": "O curso dura 3 anos."}),
    )
    .await;
    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 1);

    let (status, body) = post_json(addr, "/clear", serde_json::json!({})).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["status"], "cleared");

    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 0);

    // The emptied knowledge base answers like a fresh one.
    let (_, body) = post_json(addr, "/ask", serde_json::json!({"question": "qualquer"})).await;
    assert_eq!(body["answer"], EMPTY_KB_ANSWER);
}

#[tokio::test]
async fn test_generation_failure_degrades_to_diagnostic_answer() {
    let mock = MockServer::start().await;

    embed_mock("O curso dura 3 anos.", vec![1.0, 0.0, 0.0])
        .mount(&mock)
        .await;
    embed_mock("Quanto tempo dura o curso?", vec![1.0, 0.0, 0.0])
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("model is loading"))
        .mount(&mock)
        .await;

    let addr = spawn_app(test_config(&mock.uri())).await;

    post_json(
        addr,
        "/ingest",
        serde_json::json!({"text": "O curso dura 3 anos."}),
    )
    .await;

    let (status, body) = post_json(
        addr,
        "/ask",
        serde_json::json!({"question": "Quanto tempo dura o curso?"}),
    )
    .await;

    // Provider outage is not an HTTP error; the answer carries the detail.
    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .starts_with("Erro ao gerar resposta:"));
    assert_eq!(body["context"], "O curso dura 3 anos.");

    // The store stayed consistent through the failure.
    let stats = get_json(addr, "/stats").await;
    assert_eq!(stats["total_passages"], 1);
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let mock = MockServer::start().await;
    let addr = spawn_app(test_config(&mock.uri())).await;

    let (status, body) = post_json(addr, "/ask", serde_json::json!({"question": "   "})).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
