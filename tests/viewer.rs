use std::net::SocketAddr;
use std::sync::Arc;

use greetshell::auth::Unauthenticated;
use greetshell::viewer::{GreetingViewer, HttpGreetingSource, GREETING_PATH};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

mod common;

#[tokio::test]
async fn shows_fetched_greeting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GREETING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "hello"}))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut viewer = GreetingViewer::mount(HttpGreetingSource::new(&server.uri()).unwrap());
    assert_eq!(viewer.render(), "The current greeting is Unknown");

    assert!(viewer.changed().await);
    assert_eq!(viewer.render(), "The current greeting is hello");
    assert_eq!(viewer.state().message, "hello");
}

#[tokio::test]
async fn server_error_leaves_greeting_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GREETING_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut viewer = GreetingViewer::mount(HttpGreetingSource::new(&server.uri()).unwrap());
    viewer.settled().await;
    assert_eq!(viewer.render(), "The current greeting is Unknown");
}

#[tokio::test]
async fn malformed_body_leaves_greeting_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GREETING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"greeting": "hi"})))
        .mount(&server)
        .await;

    let mut viewer = GreetingViewer::mount(HttpGreetingSource::new(&server.uri()).unwrap());
    viewer.settled().await;
    assert_eq!(viewer.render(), "The current greeting is Unknown");
}

#[tokio::test]
async fn unreachable_server_leaves_greeting_unchanged() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let mut viewer =
        GreetingViewer::mount(HttpGreetingSource::new(&format!("http://{}", addr)).unwrap());
    viewer.settled().await;
    assert_eq!(viewer.render(), "The current greeting is Unknown");
}

#[tokio::test]
async fn against_greeting_api() {
    let app = common::app(Arc::new(Unauthenticated));
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    let mut viewer =
        GreetingViewer::mount(HttpGreetingSource::new(&format!("http://{}", addr)).unwrap());
    viewer.settled().await;
    assert_eq!(viewer.render(), "The current greeting is Hello World");
}
