use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use dorm_admin::config::ApiSettings;
use dorm_admin::meter::AnnexRule;
use dorm_admin::services::ApiClient;
use dorm_admin::startup::{build_router, RouterOptions};
use dorm_admin::AppState;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

/// Router wired to a backend address nothing listens on; only routes that
/// never call the backend are exercised here.
fn app() -> Router {
    let settings = ApiSettings {
        base_url: "http://127.0.0.1:9/api".to_string(),
        request_timeout_secs: 1,
        service_token: None,
        host_overrides: Vec::new(),
    };
    let api = ApiClient::new(&settings, None).expect("client builds");
    build_router(
        AppState::new(api, AnnexRule::default()),
        RouterOptions {
            secure_cookies: false,
            static_dir: "static".to_string(),
        },
    )
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::X_CONTENT_TYPE_OPTIONS));
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn login_page_renders_form() {
    let response = app()
        .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("hx-post=\"/login\""));
    assert!(body.contains("name=\"password\""));
}

#[tokio::test]
async fn dashboard_without_session_redirects_to_login() {
    let response = app()
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn htmx_request_without_session_gets_hx_redirect() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/chats/recent")
                .header("HX-Request", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["HX-Redirect"], "/login");
}

#[tokio::test]
async fn meter_without_session_or_line_user_redirects_to_login() {
    let response = app()
        .oneshot(Request::builder().uri("/meter").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn login_with_blank_fields_is_rejected_without_calling_backend() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=&password="))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Please enter your username and password"));
}

#[tokio::test]
async fn metrics_is_not_found_without_exporter() {
    let response = app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stylesheet_is_served() {
    let response = app()
        .oneshot(Request::builder().uri("/static/app.css").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
