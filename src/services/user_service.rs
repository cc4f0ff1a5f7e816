// ==================== USER SESSION ====================
// One user per device. Logging in replaces whatever was stored before;
// logging out (or an expired session the client gives up on) removes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::User, store::EntityStore, utils::AppError};

/// Login result handed over by the registration API
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct NewUser {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub diet: String,
    pub token: String,
    #[serde(default)]
    pub barcode: String,
    /// Base64 encoded barcode image
    #[serde(default, with = "crate::utils::encoding")]
    #[schema(value_type = String)]
    pub barcode_data: Vec<u8>,
    pub expiration_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    /// The stored login ran out; the client should prefill this email
    Expired { email: String },
    Active { user_id: i64, name: String, expires_at: DateTime<Utc> },
}

/// Stores `new_user` as the device's only user.
pub async fn store_user(store: &EntityStore, new_user: NewUser) -> Result<User, AppError> {
    if new_user.email.trim().is_empty() || new_user.token.trim().is_empty() {
        return Err(AppError::InvalidRequest("email and token are required".to_string()));
    }

    let user = User {
        user_id: new_user.user_id,
        name: new_user.name,
        email: new_user.email,
        school: new_user.school,
        major: new_user.major,
        role: new_user.role,
        diet: new_user.diet,
        token: new_user.token,
        barcode: new_user.barcode,
        barcode_data: new_user.barcode_data,
        init_time: Utc::now(),
        expiration_time: new_user.expiration_time,
    };

    let mut tx = store.begin().await;
    if let Some(previous) = tx.user() {
        log::info!("👤 Replacing stored user {} with {}", previous.user_id, user.user_id);
    }
    tx.set_user(Some(user.clone()));
    tx.commit()?;

    store.save_in_background();
    log::info!("👤 User {} logged in, session expires {}", user.user_id, user.expiration_time);

    Ok(user)
}

pub async fn current_user(store: &EntityStore) -> Option<User> {
    store.load::<User>().await.into_iter().next()
}

pub async fn session_state(store: &EntityStore, now: DateTime<Utc>) -> SessionState {
    match current_user(store).await {
        None => SessionState::LoggedOut,
        Some(user) if user.is_expired(now) => SessionState::Expired { email: user.email },
        Some(user) => SessionState::Active {
            user_id: user.user_id,
            name: user.name,
            expires_at: user.expiration_time,
        },
    }
}

/// Removes the stored user. Returns false when nobody was logged in.
pub async fn logout(store: &EntityStore) -> Result<bool, AppError> {
    let mut tx = store.begin().await;
    let Some(user_id) = tx.user().map(|u| u.user_id) else {
        return Ok(false);
    };

    tx.set_user(None);
    tx.commit()?;

    store.save_in_background();
    log::info!("👋 User {} logged out", user_id);

    Ok(true)
}
