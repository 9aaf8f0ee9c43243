//! Resource Handlers
//!
//! `/api/{resource}` and `/api/{resource}/{id}` endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::application::dto::{
    filter_from_query, find_many_args, MetadataDto, RecordInput, ResourceDto,
};
use crate::application::services::{ResourceError, ResourceService, ResourceServiceImpl};
use crate::domain::record::RecordRepository;
use crate::presentation::http::extractors::{JsonBody, ResourcePath};
use crate::shared::error::AppError;
use crate::startup::AppState;

pub(crate) fn map_resource_error(e: ResourceError) -> AppError {
    match e {
        ResourceError::NotFound(msg) => AppError::NotFound(msg),
        ResourceError::BadRequest(msg) => AppError::BadRequest(msg),
        ResourceError::Validation(msg) => AppError::Validation(msg),
        ResourceError::Conflict(msg) => AppError::Conflict(msg),
        ResourceError::Internal(msg) => AppError::Internal(msg),
    }
}

fn resource_service(state: &AppState) -> ResourceServiceImpl<dyn RecordRepository> {
    ResourceServiceImpl::new(state.repository.clone(), state.catalog)
}

/// Create a record
pub async fn create(
    State(state): State<AppState>,
    path: ResourcePath,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let input = RecordInput::parse(path.schema, body)?;

    let dto = resource_service(&state)
        .create(path.schema, input)
        .await
        .map_err(map_resource_error)?;

    let location = format!("/api/{}/{}", path.schema.path, dto.id().unwrap_or_default());
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(dto)))
}

/// List records
pub async fn find_many(
    State(state): State<AppState>,
    path: ResourcePath,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ResourceDto>>, AppError> {
    let args = find_many_args(path.schema, &params)?;

    let dtos = resource_service(&state)
        .find_many(path.schema, args)
        .await
        .map_err(map_resource_error)?;

    Ok(Json(dtos))
}

/// Count records matching the query filters
pub async fn meta(
    State(state): State<AppState>,
    path: ResourcePath,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<MetadataDto>, AppError> {
    let filter = filter_from_query(path.schema, &params)?;

    let meta = resource_service(&state)
        .meta(path.schema, filter)
        .await
        .map_err(map_resource_error)?;

    Ok(Json(meta))
}

/// Get a record by id
pub async fn find_one(
    State(state): State<AppState>,
    path: ResourcePath,
) -> Result<Json<ResourceDto>, AppError> {
    let dto = resource_service(&state)
        .find_one(path.schema, path.id()?)
        .await
        .map_err(map_resource_error)?;

    Ok(Json(dto))
}

/// Update a record
pub async fn update(
    State(state): State<AppState>,
    path: ResourcePath,
    JsonBody(body): JsonBody<Value>,
) -> Result<StatusCode, AppError> {
    let input = RecordInput::parse(path.schema, body)?;

    resource_service(&state)
        .update(path.schema, path.id()?, input)
        .await
        .map_err(map_resource_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a record
pub async fn delete(
    State(state): State<AppState>,
    path: ResourcePath,
) -> Result<StatusCode, AppError> {
    resource_service(&state)
        .delete(path.schema, path.id()?)
        .await
        .map_err(map_resource_error)?;

    Ok(StatusCode::NO_CONTENT)
}
