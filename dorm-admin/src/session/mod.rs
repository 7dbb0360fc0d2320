//! Auth state kept in the server-side session: bearer token, the cached
//! staff profile and a LINE user id remembered from a deep link.

pub mod gate;

pub use gate::{authorize, Access, GrantSource};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use thiserror::Error;
use tower_sessions::Session;

use crate::models::{Capability, StaffProfile};
use crate::services::{ApiClient, ApiError, StaffDirectory};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const PROFILE_KEY: &str = "staff_profile";
pub const LINE_USER_KEY: &str = "line_user_id";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone)]
pub struct SessionContext {
    session: Session,
    token: Option<String>,
    profile: Option<StaffProfile>,
    line_user_id: Option<String>,
}

impl SessionContext {
    pub async fn load(session: Session) -> Result<Self, SessionError> {
        let token = session.get::<String>(ACCESS_TOKEN_KEY).await?;
        let profile = session.get::<StaffProfile>(PROFILE_KEY).await?;
        let line_user_id = session.get::<String>(LINE_USER_KEY).await?;

        Ok(Self {
            session,
            token,
            profile,
            line_user_id,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn profile(&self) -> Option<&StaffProfile> {
        self.profile.as_ref()
    }

    pub fn line_user_id(&self) -> Option<&str> {
        self.line_user_id.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some() && self.profile.is_some()
    }

    pub async fn sign_in(&mut self, token: String, profile: StaffProfile) -> Result<(), SessionError> {
        // New id on privilege change.
        self.session.cycle_id().await?;
        self.session.insert(ACCESS_TOKEN_KEY, &token).await?;
        self.session.insert(PROFILE_KEY, &profile).await?;

        tracing::info!(staff_id = %profile.id, role = profile.role.as_str(), "Staff signed in");
        self.token = Some(token);
        self.profile = Some(profile);
        Ok(())
    }

    /// Re-fetch the profile for the stored token. A 401 means the token is no
    /// longer valid and clears the auth state; other failures are returned.
    pub async fn refresh(&mut self, api: &ApiClient) -> Result<(), SessionError> {
        let Some(token) = self.token.clone() else {
            return Ok(());
        };

        match api.current_profile(&token).await {
            Ok(profile) => {
                self.session.insert(PROFILE_KEY, &profile).await?;
                self.profile = Some(profile);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Stored token rejected by backend, clearing session auth");
                self.clear_auth().await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remember_line_user(&mut self, line_user_id: &str) -> Result<(), SessionError> {
        let line_user_id = line_user_id.trim();
        if line_user_id.is_empty() || self.line_user_id.as_deref() == Some(line_user_id) {
            return Ok(());
        }
        self.session.insert(LINE_USER_KEY, line_user_id).await?;
        self.line_user_id = Some(line_user_id.to_string());
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<(), SessionError> {
        self.session.flush().await?;
        self.token = None;
        self.profile = None;
        self.line_user_id = None;
        Ok(())
    }

    pub async fn authorize(&self, capability: Capability, directory: &dyn StaffDirectory) -> Access {
        authorize(self.profile(), self.line_user_id(), capability, directory).await
    }

    async fn clear_auth(&mut self) -> Result<(), SessionError> {
        self.session.remove::<String>(ACCESS_TOKEN_KEY).await?;
        self.session.remove::<StaffProfile>(PROFILE_KEY).await?;
        self.token = None;
        self.profile = None;
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        SessionContext::load(session).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load session");
            (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable")
        })
    }
}
