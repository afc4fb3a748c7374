#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{body::Body, http::Request, response::Response, Router};
use greetshell::{
    auth::SharedAuthenticator,
    config::ProviderLogLevel,
    openid::{OidcConfig, OidcProvider},
    shell::RouteTable,
    store::Store,
    AppState,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const KEY: &str = include_str!("../fixtures/test_key.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");
const REALM: &str = "/realms/test";

pub const CLIENT_ID: &str = "greetshell";
pub const REDIRECT_URI: &str = "http://localhost:8080/authentication/callback";

/// A mocked identity provider publishing the fixture key.
pub struct Idp {
    pub server: MockServer,
}

impl Idp {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let issuer = format!("{}{}", server.uri(), REALM);
        Mock::given(method("GET"))
            .and(path(format!("{}/.well-known/openid-configuration", REALM)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "jwks_uri": format!("{}/certs", issuer),
                "authorization_endpoint": format!("{}/auth", issuer),
                "token_endpoint": format!("{}/token", issuer),
                "end_session_endpoint": format!("{}/logout", issuer),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/certs", REALM)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .mount(&server)
            .await;
        Idp { server }
    }

    pub fn issuer(&self) -> String {
        format!("{}{}", self.server.uri(), REALM)
    }

    pub fn config(&self) -> OidcConfig {
        OidcConfig {
            discovery_url: format!("{}/.well-known/openid-configuration", self.issuer()),
            client_id: Some(CLIENT_ID.to_owned()),
            client_secret: Some("secret".to_owned()),
            redirect_uri: Some(REDIRECT_URI.to_owned()),
            scope: "openid profile".to_owned(),
            audience: None,
            post_logout_redirect_uri: None,
            refresh_secs: 0,
        }
    }

    pub async fn provider(&self) -> Arc<OidcProvider> {
        OidcProvider::init(self.config(), ProviderLogLevel::Debug)
            .await
            .unwrap()
    }

    pub fn claims(&self, sub: &str, username: &str, scope: &str) -> Value {
        json!({
            "iss": self.issuer(),
            "sub": sub,
            "preferred_username": username,
            "scope": scope,
            "exp": now() + 300,
        })
    }

    pub fn token(&self, sub: &str, username: &str, scope: &str) -> String {
        sign(&self.claims(sub, username, scope))
    }
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

pub fn sign(claims: &Value) -> String {
    sign_with_kid(claims, "test-key")
}

pub fn app(auth: SharedAuthenticator) -> Router {
    app_with_cookies(auth, false)
}

pub fn app_with_cookies(auth: SharedAuthenticator, secure_cookies: bool) -> Router {
    greetshell::router(AppState {
        auth,
        store: Arc::new(Store::open(":memory:").unwrap()),
        routes: Arc::new(RouteTable::standard().unwrap()),
        secure_cookies,
    })
}

pub async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_with_token(app: &Router, uri: &str, token: &str) -> Response {
    send(
        app,
        Request::get(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn text_body(resp: Response) -> String {
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn json_body(resp: Response) -> Value {
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
