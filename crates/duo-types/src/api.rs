use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Couple, PARTNER_NAME_MAX};
use crate::validation::{Draft, ValidationError, normalize_code, required};

// -- Session token claims --

/// Claims carried by the couple session token. Row routes and feed
/// subscriptions compare `sub` against the couple in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Couples --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCoupleRequest {
    pub couple_code: String,
    pub partner_name: String,
    pub anniversary_date: NaiveDate,
}

impl Draft for CreateCoupleRequest {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            couple_code: normalize_code(&self.couple_code)?,
            partner_name: required("name", &self.partner_name, PARTNER_NAME_MAX)?,
            anniversary_date: self.anniversary_date,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimPartnerRequest {
    pub partner_name: String,
}

impl Draft for ClaimPartnerRequest {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            partner_name: required("name", &self.partner_name, PARTNER_NAME_MAX)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeQuery {
    pub code: String,
}

/// A couple row plus the token that unlocks its rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoupleSession {
    pub couple: Couple,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeResponse {
    pub code: String,
}

// -- Rows --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
