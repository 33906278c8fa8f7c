//! Who this client is: the couple it belongs to and the partner using it.
//!
//! The identity is three persisted strings (couple id, join code, partner
//! name). On startup it is only trusted once the backend confirms a couple
//! with both that id and that code exists; anything else clears it.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use duo_types::api::CreateCoupleRequest;
use duo_types::models::{Couple, PARTNER_NAME_MAX};
use duo_types::validation::{ValidationError, normalize_code, required};

use crate::backend::Backend;
use crate::error::{BackendError, ClientError};
use crate::storage::KeyValueStore;

pub const COUPLE_ID_KEY: &str = "couple-id";
pub const COUPLE_CODE_KEY: &str = "couple-code";
pub const PARTNER_NAME_KEY: &str = "partner-name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoupleContext {
    pub couple_id: Uuid,
    pub couple_code: String,
    pub partner_name: String,
    pub anniversary_date: NaiveDate,
}

impl CoupleContext {
    fn new(couple: &Couple, partner_name: String) -> Self {
        Self {
            couple_id: couple.id,
            couple_code: couple.couple_code.clone(),
            partner_name,
            anniversary_date: couple.anniversary_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Restore hasn't finished yet.
    Loading,
    Unauthenticated,
    Authenticated(CoupleContext),
}

pub struct Session {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            store,
            state: RwLock::new(SessionState::Loading),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn context(&self) -> Option<CoupleContext> {
        match &*self.state.read().await {
            SessionState::Authenticated(ctx) => Some(ctx.clone()),
            _ => None,
        }
    }

    /// Re-check the persisted identity against the backend. A partial,
    /// unparseable or unconfirmed identity is cleared.
    pub async fn restore(&self) -> SessionState {
        let state = match self.verify_persisted().await {
            Some(ctx) => {
                info!("Restored session for couple {}", ctx.couple_id);
                SessionState::Authenticated(ctx)
            }
            None => {
                self.clear_persisted();
                SessionState::Unauthenticated
            }
        };
        *self.state.write().await = state.clone();
        state
    }

    async fn verify_persisted(&self) -> Option<CoupleContext> {
        let id = self.store.get(COUPLE_ID_KEY)?;
        let code = self.store.get(COUPLE_CODE_KEY)?;
        let partner_name = self.store.get(PARTNER_NAME_KEY)?;

        let Ok(couple_id) = Uuid::parse_str(&id) else {
            warn!("Persisted couple id {:?} is not a uuid", id);
            return None;
        };

        match self.backend.find_couple(couple_id, &code).await {
            Ok(Some(couple)) => Some(CoupleContext::new(&couple, partner_name)),
            Ok(None) => {
                warn!("Couple {} with the saved code no longer exists", couple_id);
                None
            }
            Err(e) => {
                warn!("Could not verify couple {}: {}", couple_id, e);
                None
            }
        }
    }

    /// Start a new couple with a freshly generated join code.
    pub async fn create(&self, partner_name: &str, anniversary_date: NaiveDate) -> Result<CoupleContext, ClientError> {
        let partner_name = validate_name(partner_name)?;

        let code = self.backend.generate_code().await?;
        let couple = self
            .backend
            .create_couple(&CreateCoupleRequest {
                couple_code: code,
                partner_name: partner_name.clone(),
                anniversary_date,
            })
            .await?;

        info!("Created couple {} with code {}", couple.id, couple.couple_code);
        self.authenticate(CoupleContext::new(&couple, partner_name)).await
    }

    /// Join an existing couple by code. The second partner slot is filled
    /// only while it is empty, so joining again never overwrites it.
    pub async fn join(&self, code: &str, partner_name: &str) -> Result<CoupleContext, ClientError> {
        let partner_name = validate_name(partner_name)?;
        let code = normalize_code(code)?;

        let couple = self
            .backend
            .find_couple_by_code(&code)
            .await?
            .ok_or(ClientError::CodeNotFound)?;

        let slot_empty = couple
            .partner2_name
            .as_deref()
            .is_none_or(|name| name.trim().is_empty());
        let couple = if slot_empty {
            match self.backend.claim_partner_slot(couple.id, &partner_name).await {
                Ok(updated) => updated,
                Err(BackendError::NotFound) => return Err(ClientError::CodeNotFound),
                Err(e) => return Err(e.into()),
            }
        } else {
            couple
        };

        info!("Joined couple {} as {}", couple.id, partner_name);
        self.authenticate(CoupleContext::new(&couple, partner_name)).await
    }

    /// Clear the persisted identity. Always succeeds from the caller's view.
    pub async fn logout(&self) {
        self.clear_persisted();
        self.backend.end_session();
        *self.state.write().await = SessionState::Unauthenticated;
        info!("Logged out");
    }

    async fn authenticate(&self, ctx: CoupleContext) -> Result<CoupleContext, ClientError> {
        self.store.set(COUPLE_ID_KEY, &ctx.couple_id.to_string())?;
        self.store.set(COUPLE_CODE_KEY, &ctx.couple_code)?;
        self.store.set(PARTNER_NAME_KEY, &ctx.partner_name)?;
        *self.state.write().await = SessionState::Authenticated(ctx.clone());
        Ok(ctx)
    }

    fn clear_persisted(&self) {
        for key in [COUPLE_ID_KEY, COUPLE_CODE_KEY, PARTNER_NAME_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Could not clear {}: {}", key, e);
            }
        }
    }
}

fn validate_name(name: &str) -> Result<String, ClientError> {
    required("name", name, PARTNER_NAME_MAX).map_err(|e| match e {
        ValidationError::Empty(_) => ClientError::EmptyName,
        other => other.into(),
    })
}
