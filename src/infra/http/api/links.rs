use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use url::Url;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::UpsertLinkParams;

use super::models::LinkRequest;
use crate::infra::http::state::AppState;

fn validate(request: &LinkRequest) -> Result<(), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("link name must not be empty"));
    }
    match Url::parse(request.url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(AppError::validation(format!(
            "link url scheme {:?} is not allowed",
            parsed.scheme()
        ))),
        Err(err) => Err(AppError::validation(format!("link url is invalid: {err}"))),
    }
}

fn to_params(request: LinkRequest) -> UpsertLinkParams {
    UpsertLinkParams {
        name: request.name,
        url: request.url,
        description: request.description,
        sort_order: request.sort_order,
    }
}

pub async fn list_links(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.links_repo.list_links().await?))
}

pub async fn create_link(
    State(state): State<AppState>,
    Json(request): Json<LinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&request)?;
    let link = state.links_repo.insert_link(to_params(request)).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&request)?;
    let link = state.links_repo.update_link(id, to_params(request)).await?;
    Ok(Json(link))
}

pub async fn delete_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.links_repo.delete_link(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
