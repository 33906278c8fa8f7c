use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use duo_db::StoreError;
use duo_types::api::{
    ClaimPartnerRequest, Claims, CodeQuery, CodeResponse, CoupleSession, CreateCoupleRequest,
};
use duo_types::models::Couple;
use duo_types::validation::{Draft, normalize_code};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{authorize, create_token};
use crate::state::{AppState, blocking};

/// POST /rpc/generate_couple_code
pub async fn generate_code(State(state): State<AppState>) -> Result<Json<CodeResponse>, ApiError> {
    let code = blocking(&state, |db| Ok(db.generate_couple_code()?)).await?;
    Ok(Json(CodeResponse { code }))
}

/// POST /couples
pub async fn create_couple(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateCoupleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let req = req.normalized().map_err(StoreError::from)?;

    let couple = blocking(&state, move |db| {
        db.insert_couple(&req.couple_code, &req.partner_name, req.anniversary_date)
    })
    .await?;

    info!("Couple {} created with code {}", couple.id, couple.couple_code);

    Ok((StatusCode::CREATED, Json(session_for(&state, couple)?)))
}

/// GET /couples/lookup?code=
pub async fn lookup_couple(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CodeQuery>,
) -> Result<Json<CoupleSession>, ApiError> {
    let code = normalize_code(&query.code).map_err(StoreError::from)?;

    let couple = blocking(&state, move |db| Ok(db.get_couple_by_code(&code)?))
        .await?
        .ok_or_else(|| ApiError::NotFound("couple not found".into()))?;

    Ok(Json(session_for(&state, couple)?))
}

/// GET /couples/{couple_id}?code=
///
/// Re-validates a persisted identity.
pub async fn verify_couple(
    State(state): State<AppState>,
    ApiPath(couple_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CodeQuery>,
) -> Result<Json<CoupleSession>, ApiError> {
    let couple = blocking(&state, move |db| {
        Ok(db.get_couple_by_id_and_code(couple_id, &query.code)?)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("couple not found".into()))?;

    Ok(Json(session_for(&state, couple)?))
}

/// POST /couples/{couple_id}/partner
///
/// Fills the second partner's name once.
pub async fn claim_partner(
    State(state): State<AppState>,
    ApiPath(couple_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ClaimPartnerRequest>,
) -> Result<Json<Couple>, ApiError> {
    authorize(&claims, couple_id)?;
    let req = req.normalized().map_err(StoreError::from)?;

    let couple = blocking(&state, move |db| {
        Ok(db.claim_partner_slot(couple_id, &req.partner_name)?)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("couple not found".into()))?;

    Ok(Json(couple))
}

fn session_for(state: &AppState, couple: Couple) -> Result<CoupleSession, ApiError> {
    let token = create_token(&state.jwt_secret, couple.id)?;
    Ok(CoupleSession { couple, token })
}
