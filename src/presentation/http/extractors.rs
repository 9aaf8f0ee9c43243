//! Custom Extractors
//!
//! Axum extractors that resolve the resource segment of the path and turn
//! body rejections into the JSON error shape.

use std::collections::HashMap;

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::domain::schema::ResourceSchema;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// The `{resource}`, `{id}` and `{relation}` segments of a route, with the
/// resource resolved against the served catalog.
#[derive(Debug, Clone)]
pub struct ResourcePath {
    pub schema: &'static ResourceSchema,
    pub id: Option<String>,
    pub relation: Option<String>,
}

impl ResourcePath {
    pub fn id(&self) -> Result<&str, AppError> {
        self.id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing record id".into()))
    }

    pub fn relation(&self) -> Result<&str, AppError> {
        self.relation
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing relation name".into()))
    }

    /// Schema of the children behind the `{relation}` segment.
    pub fn child_schema(&self, state: &AppState) -> Result<&'static ResourceSchema, AppError> {
        let name = self.relation()?;
        self.schema
            .relation(name)
            .and_then(|r| state.catalog.child_link(r))
            .map(|link| link.child)
            .ok_or_else(|| {
                AppError::NotFound(format!("{} has no relation named {}", self.schema.name, name))
            })
    }
}

impl<S> FromRequestParts<S> for ResourcePath
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(mut params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let app = AppState::from_ref(state);
        let name = params
            .remove("resource")
            .ok_or_else(|| AppError::BadRequest("Missing resource segment".into()))?;
        let schema = app
            .catalog
            .resource_by_path(&name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown resource '{}'", name)))?;

        Ok(Self {
            schema,
            id: params.remove("id"),
            relation: params.remove("relation"),
        })
    }
}

/// `Json` whose rejections answer with [`AppError::BadRequest`].
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}
