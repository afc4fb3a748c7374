use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Greeting {
    pub message: String,
}

impl Greeting {
    fn hello(name: &str) -> Json<Self> {
        Json(Greeting {
            message: format!("Hello {}", name),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    name: Option<String>,
}

pub async fn v1() -> Json<Greeting> {
    Greeting::hello("World")
}

pub async fn v2(Query(query): Query<NameQuery>) -> Json<Greeting> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("World");
    Greeting::hello(name)
}

/// Greets whoever the bearer token asserts.
pub async fn v3(identity: Identity) -> Json<Greeting> {
    Greeting::hello(identity.name())
}
