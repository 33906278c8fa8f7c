use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use duo_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the public client key, as hosted row stores expect it.
pub const API_KEY_HEADER: &str = "apikey";

const SESSION_DAYS: i64 = 30;

/// Reject requests that don't carry the configured anon key.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if key != state.anon_key {
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}

/// Extract and validate the couple session token from the Authorization header.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.jwt_secret, token).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// A session token only ever covers the couple it was issued for.
pub fn authorize(claims: &Claims, couple_id: Uuid) -> Result<(), ApiError> {
    if claims.sub != couple_id {
        return Err(ApiError::Forbidden(format!(
            "session does not cover couple {}",
            couple_id
        )));
    }
    Ok(())
}

pub fn create_token(secret: &str, couple_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: couple_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_and_reject_wrong_secret() {
        let couple_id = Uuid::new_v4();
        let token = create_token("s3cret", couple_id).unwrap();
        assert_eq!(decode_token("s3cret", &token).unwrap().sub, couple_id);
        assert!(decode_token("other", &token).is_none());
    }

    #[test]
    fn authorize_checks_couple() {
        let couple_id = Uuid::new_v4();
        let claims = Claims { sub: couple_id, exp: 0 };
        assert!(authorize(&claims, couple_id).is_ok());
        assert!(matches!(authorize(&claims, Uuid::new_v4()), Err(ApiError::Forbidden(_))));
    }
}
