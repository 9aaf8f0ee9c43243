//! Relation Handlers
//!
//! `/api/{resource}/{id}/{relation}` endpoints over has-many relations.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::resource::map_resource_error;
use crate::application::dto::{find_many_args, ResourceDto, WhereUniqueInput};
use crate::application::services::{RelationService, RelationServiceImpl};
use crate::domain::record::RecordRepository;
use crate::presentation::http::extractors::{JsonBody, ResourcePath};
use crate::shared::error::AppError;
use crate::startup::AppState;

fn relation_service(state: &AppState) -> RelationServiceImpl<dyn RecordRepository> {
    RelationServiceImpl::new(state.repository.clone(), state.catalog)
}

/// Connect children to the parent
pub async fn connect(
    State(state): State<AppState>,
    path: ResourcePath,
    JsonBody(children): JsonBody<Vec<WhereUniqueInput>>,
) -> Result<StatusCode, AppError> {
    relation_service(&state)
        .connect(path.schema, path.id()?, path.relation()?, children)
        .await
        .map_err(map_resource_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Disconnect children from the parent
pub async fn disconnect(
    State(state): State<AppState>,
    path: ResourcePath,
    JsonBody(children): JsonBody<Vec<WhereUniqueInput>>,
) -> Result<StatusCode, AppError> {
    relation_service(&state)
        .disconnect(path.schema, path.id()?, path.relation()?, children)
        .await
        .map_err(map_resource_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the parent's children
pub async fn find_children(
    State(state): State<AppState>,
    path: ResourcePath,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ResourceDto>>, AppError> {
    let args = find_many_args(path.child_schema(&state)?, &params)?;

    let children = relation_service(&state)
        .find_children(path.schema, path.id()?, path.relation()?, args)
        .await
        .map_err(map_resource_error)?;

    Ok(Json(children))
}

/// Replace the parent's children
pub async fn update_children(
    State(state): State<AppState>,
    path: ResourcePath,
    JsonBody(children): JsonBody<Vec<WhereUniqueInput>>,
) -> Result<StatusCode, AppError> {
    relation_service(&state)
        .update_children(path.schema, path.id()?, path.relation()?, children)
        .await
        .map_err(map_resource_error)?;

    Ok(StatusCode::NO_CONTENT)
}
