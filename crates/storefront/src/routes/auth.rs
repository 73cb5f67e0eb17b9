//! Session establishment routes.
//!
//! Login mechanics (OAuth, passwords, passkeys) live in the external
//! identity provider; these routes only consume its output. The deployment
//! fronts `POST /auth/session` with the provider's gateway, which forwards
//! the verified user id after authentication succeeds.
//!
//! Establishing a session also resolves the cart identity, which runs the
//! guest -> user merge right away instead of waiting for the next cart
//! request.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use clementine_core::UserId;

use crate::error::Result;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::cart::resolve_identity;
use crate::state::AppState;

/// Session establishment request body (verified upstream).
#[derive(Debug, Deserialize)]
pub struct EstablishSessionRequest {
    pub user_id: UserId,
}

/// Establish the authenticated session and merge any guest cart.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<EstablishSessionRequest>,
) -> Result<StatusCode> {
    // Rotate the session id on privilege change.
    session.cycle_id().await?;

    let user = CurrentUser { id: form.user_id };
    set_current_user(&session, &user).await?;

    // Runs the guest -> user merge if a guest token is present; a merge
    // failure is absorbed and retried on the next request.
    resolve_identity(&state, &session, Some(user)).await?;

    tracing::info!(user_id = %form.user_id, "session established");
    Ok(StatusCode::NO_CONTENT)
}

/// Logout: drop the authenticated user from the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    session.cycle_id().await?;
    tracing::info!("session cleared");
    Ok(StatusCode::NO_CONTENT)
}
