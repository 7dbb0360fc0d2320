use askama::Template;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;
use service_core::middleware::RequestId;
use validator::Validate;

use super::{error_fragment, hx_redirect};
use crate::middleware::auth::is_htmx;
use crate::services::ApiError;
use crate::session::SessionContext;
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

pub async fn login_page(ctx: SessionContext) -> Response {
    if ctx.is_signed_in() {
        return Redirect::to("/dashboard").into_response();
    }
    LoginTemplate {}.into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    mut ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Form(payload): Form<LoginRequest>,
) -> Response {
    if payload.validate().is_err() {
        return error_fragment(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Please enter your username and password",
        );
    }

    let api = state
        .api
        .scoped(None, request_id.as_ref().map(|Extension(id)| id.as_str()));
    let username = payload.username.trim();

    let signed_in = async {
        let token = api.login(username, &payload.password).await?;
        let profile = api.current_profile(&token).await?;
        Ok::<_, ApiError>((token, profile))
    }
    .await;

    match signed_in {
        Ok((token, profile)) => {
            if let Err(e) = ctx.sign_in(token, profile).await {
                tracing::error!(error = %e, "Failed to store session");
                return error_fragment(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not start a session, please try again",
                );
            }
            hx_redirect("/dashboard")
        }
        Err(ApiError::Status { status, .. }) if status == 400 || status == 401 => {
            tracing::info!(username, "Login rejected");
            error_fragment(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid username or password",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            error_fragment(
                StatusCode::BAD_GATEWAY,
                "Login is unavailable right now, please try again later",
            )
        }
    }
}

pub async fn logout_handler(mut ctx: SessionContext, headers: HeaderMap) -> Response {
    if let Err(e) = ctx.sign_out().await {
        tracing::error!(error = %e, "Failed to clear session");
    }

    if is_htmx(&headers) {
        hx_redirect("/login")
    } else {
        Redirect::to("/login").into_response()
    }
}
