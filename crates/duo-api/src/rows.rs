use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use uuid::Uuid;

use duo_types::Table;
use duo_types::api::{Claims, ListQuery};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::authorize;
use crate::state::{AppState, blocking};

/// GET /couples/{couple_id}/{table}?limit=
///
/// Clients page by widening the limit, so it is never clamped.
pub async fn list_rows(
    State(state): State<AppState>,
    ApiPath((couple_id, table)): ApiPath<(Uuid, Table)>,
    ApiQuery(query): ApiQuery<ListQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Value>>, ApiError> {
    authorize(&claims, couple_id)?;

    let rows = blocking(&state, move |db| db.list_rows(table, couple_id, query.limit)).await?;
    Ok(Json(rows))
}

/// POST /couples/{couple_id}/{table}
pub async fn insert_row(
    State(state): State<AppState>,
    ApiPath((couple_id, table)): ApiPath<(Uuid, Table)>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<Value>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, couple_id)?;

    let (row, change) = blocking(&state, move |db| db.insert_row(table, couple_id, payload)).await?;
    state.feed.publish(change);

    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /couples/{couple_id}/{table}/{row_id}
pub async fn update_row(
    State(state): State<AppState>,
    ApiPath((couple_id, table, row_id)): ApiPath<(Uuid, Table, Uuid)>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<Value>,
) -> Result<Json<Value>, ApiError> {
    authorize(&claims, couple_id)?;

    let (row, change) =
        blocking(&state, move |db| db.update_row(table, couple_id, row_id, payload)).await?;
    state.feed.publish(change);

    Ok(Json(row))
}

/// DELETE /couples/{couple_id}/{table}/{row_id}
pub async fn delete_row(
    State(state): State<AppState>,
    ApiPath((couple_id, table, row_id)): ApiPath<(Uuid, Table, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    authorize(&claims, couple_id)?;

    let change = blocking(&state, move |db| db.delete_row(table, couple_id, row_id)).await?;
    state.feed.publish(change);

    Ok(StatusCode::NO_CONTENT)
}
