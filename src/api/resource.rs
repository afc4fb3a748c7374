use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;
use crate::auth::Identity;
use crate::store::{Owner, Resource};
use crate::AppState;

pub const READ_SCOPE: &str = "greetshell-resource-read";
pub const WRITE_SCOPE: &str = "greetshell-resource-write";

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Serialize)]
pub struct Resources {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct ResourceInput {
    name: String,
}

/// The `:id` path segment. Anything but an integer is answered with the JSON
/// error body instead of the router's plain-text rejection.
pub struct ResourceId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadIdentifier(e.body_text()))?;
        Ok(ResourceId(id))
    }
}

fn caller(identity: &Identity, scope: &str) -> Result<(), ApiError> {
    identity.require_scope(scope)?;
    tracing::info!("Called by {} ({})", identity.name(), identity.sub);
    Ok(())
}

fn owner(identity: &Identity) -> Owner<'_> {
    Owner {
        client_id: &identity.sub,
        name: identity.name(),
    }
}

/// Empty bodies, `null` and `{}` carry no input; anything else has to be a
/// valid resource.
fn parse_input(body: &[u8]) -> Result<ResourceInput, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::NoInput);
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
    match value {
        Value::Null => return Err(ApiError::NoInput),
        Value::Object(ref o) if o.is_empty() => return Err(ApiError::NoInput),
        _ => {}
    }
    let input: ResourceInput =
        serde_json::from_value(value).map_err(|e| ApiError::Validation(e.to_string()))?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(ResourceInput {
        name: name.to_owned(),
    })
}

pub async fn get_all(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Resources>, ApiError> {
    caller(&identity, READ_SCOPE)?;
    let resources = state.store.list()?;
    Ok(Json(Resources { resources }))
}

pub async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    ResourceId(id): ResourceId,
) -> Result<Json<Resource>, ApiError> {
    caller(&identity, READ_SCOPE)?;
    state
        .store
        .get(id)?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    body: Bytes,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    caller(&identity, WRITE_SCOPE)?;
    let input = parse_input(&body)?;
    let resource = state.store.create(&owner(&identity), &input.name)?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn modify(
    State(state): State<AppState>,
    identity: Identity,
    ResourceId(id): ResourceId,
    body: Bytes,
) -> Result<Json<Resource>, ApiError> {
    caller(&identity, WRITE_SCOPE)?;
    let input = parse_input(&body)?;
    state
        .store
        .update(id, &owner(&identity), &input.name)?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    ResourceId(id): ResourceId,
) -> Result<StatusCode, ApiError> {
    caller(&identity, WRITE_SCOPE)?;
    if state.store.delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Gone)
    }
}
