use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::error::AppError;

use crate::infra::http::state::AppState;

pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.settings_repo.load_settings().await?;
    let values: BTreeMap<String, String> = snapshot
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Ok(Json(values))
}

/// Settings feed every rendered page, so an update schedules a full rebuild.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(values): Json<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entries: Vec<(String, String)> = values.into_iter().collect();
    state.settings_repo.upsert_settings(&entries).await?;
    state.posts.rebuild_all();

    get_settings(State(state)).await
}
