use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::session::SessionContext;

/// Pages behind this layer need a signed-in staff member. htmx requests get
/// an `HX-Redirect` so the whole page navigates instead of swapping a
/// fragment with the login form.
pub async fn require_login(
    ctx: SessionContext,
    request: Request<Body>,
    next: Next,
) -> Response {
    if ctx.is_signed_in() {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "No session, redirecting to login");
    if is_htmx(request.headers()) {
        return (
            StatusCode::OK,
            [("HX-Redirect", HeaderValue::from_static("/login"))],
        )
            .into_response();
    }
    Redirect::to("/login").into_response()
}

pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .is_some_and(|v| v.as_bytes() == b"true")
}
