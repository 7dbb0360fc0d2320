use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use dorm_admin::config::ApiSettings;
use dorm_admin::models::{BillingPeriod, MeterReadingQuery, NewMeterReading};
use dorm_admin::services::{ApiClient, ApiError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

async fn serve(router: Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let settings = ApiSettings {
        base_url: format!("http://{}/api/", address),
        request_timeout_secs: 5,
        service_token: None,
        host_overrides: Vec::new(),
    };
    ApiClient::new(&settings, None).unwrap()
}

#[tokio::test]
async fn rooms_accept_numeric_and_string_ids() {
    let api = serve(Router::new().route(
        "/api/rooms",
        get(|| async {
            Json(json!([
                {"id": 7, "roomNumber": 101, "floor": 1, "buildingId": "b1", "status": "occupied", "monthlyPrice": "3500"},
                {"id": "r8", "number": "A2", "buildingId": 2, "status": "something_new"}
            ]))
        }),
    ))
    .await;

    let rooms = api.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].id, "7");
    assert_eq!(rooms[0].number, "101");
    assert_eq!(rooms[0].monthly_price, 3500.0);
    assert_eq!(rooms[1].building_id, "2");
    assert_eq!(rooms[1].status.as_str(), "unknown");
}

#[tokio::test]
async fn meter_reading_query_sends_period() {
    let api = serve(Router::new().route(
        "/api/meter-readings",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            assert_eq!(query.get("month").map(String::as_str), Some("12"));
            assert_eq!(query.get("year").map(String::as_str), Some("2025"));
            assert!(!query.contains_key("roomId"));
            Json(json!([
                {"id": 1, "roomId": 7, "month": 12, "year": 2025, "waterReading": "120.5", "electricReading": 900, "createdAt": "2025-12-28T10:00:00Z"}
            ]))
        }),
    ))
    .await;

    let period = BillingPeriod::new(1, 2026).unwrap();
    let readings = api
        .list_meter_readings(&MeterReadingQuery::for_period(period.previous()))
        .await
        .unwrap();
    assert_eq!(readings[0].room_id, "7");
    assert_eq!(readings[0].water_reading, 120.5);
}

#[tokio::test]
async fn error_message_is_taken_from_json_body() {
    let api = serve(Router::new().route(
        "/api/meter-readings",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": ["waterReading must be a number", "month is invalid"]})),
            )
        }),
    ))
    .await;

    let err = api
        .create_meter_reading(&NewMeterReading {
            room_id: "7".into(),
            month: 1,
            year: 2026,
            water_reading: 1.0,
            electric_reading: 2.0,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.to_string(),
        "waterReading must be a number; month is invalid (HTTP 400)"
    );
}

#[tokio::test]
async fn unknown_line_user_is_not_staff() {
    let api = serve(Router::new().route(
        "/api/staff/line/:id",
        get(|Path(id): Path<String>| async move {
            if id == "U-staff" {
                Ok(Json(json!({"isStaff": true, "role": "staff", "permissions": ["meter"]})))
            } else {
                Err((StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))))
            }
        }),
    ))
    .await;

    let staff = api.staff_by_line_user("U-staff").await.unwrap().unwrap();
    assert!(staff.is_staff);
    assert!(api.staff_by_line_user("U-guest").await.unwrap().is_none());
}

#[tokio::test]
async fn login_then_profile_uses_bearer_token() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorded = seen.clone();
    let api = serve(
        Router::new()
            .route(
                "/api/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" {
                        Ok(Json(json!({"accessToken": "tok-1"})))
                    } else {
                        Err((StatusCode::UNAUTHORIZED, "bad credentials"))
                    }
                }),
            )
            .route(
                "/api/auth/me",
                get(move |headers: HeaderMap| {
                    let recorded = recorded.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        recorded.lock().unwrap().push(auth);
                        Json(json!({"id": 3, "username": "somchai", "role": "admin"}))
                    }
                }),
            ),
    )
    .await;

    let token = api.login("somchai", "secret").await.unwrap();
    assert_eq!(token, "tok-1");
    let profile = api.current_profile(&token).await.unwrap();
    assert_eq!(profile.id, "3");
    assert_eq!(seen.lock().unwrap().as_slice(), ["Bearer tok-1"]);

    let err = api.login("somchai", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(matches!(err, ApiError::Status { ref message, .. } if message == "bad credentials"));
}
