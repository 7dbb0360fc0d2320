use askama::Template;
use axum::response::{IntoResponse, Redirect, Response};

use crate::session::SessionContext;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {}

pub async fn index(ctx: SessionContext) -> Response {
    if ctx.is_signed_in() {
        return Redirect::to("/dashboard").into_response();
    }
    IndexTemplate {}.into_response()
}

pub async fn health_check() -> &'static str {
    "OK"
}
