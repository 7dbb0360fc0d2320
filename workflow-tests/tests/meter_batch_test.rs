//! Meter reading batches from a LINE staff member's point of view.

use workflow_tests::{batch_id_from, BackendCall, MockBackend, TestApp, SERVICE_TOKEN};

const PERIOD: [(&str, &str); 2] = [("month", "3"), ("year", "2026")];

fn form<'a>(readings: &[(&'a str, &'a str)], confirmed: bool) -> Vec<(&'a str, &'a str)> {
    let mut fields = PERIOD.to_vec();
    fields.extend_from_slice(readings);
    if confirmed {
        fields.push(("confirmed", "true"));
    }
    fields
}

async fn meter_staff_app(backend: MockBackend) -> TestApp {
    let app = TestApp::spawn_with(backend).await.unwrap();
    let page = app.get("/meter?lineUserId=U-meter&month=3&year=2026").await.unwrap();
    assert_eq!(page.status().as_u16(), 200);
    app
}

fn reading(room_id: &str) -> BackendCall {
    BackendCall::Reading {
        room_id: room_id.to_string(),
        authorization: SERVICE_TOKEN.to_string(),
    }
}

fn invoice(room_id: &str) -> BackendCall {
    BackendCall::Invoice {
        room_id: room_id.to_string(),
    }
}

#[tokio::test]
async fn meter_page_lists_annex_after_main_building() {
    let app = TestApp::spawn().await.unwrap();

    let response = app.get("/meter?lineUserId=U-meter&month=3&year=2026").await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();

    let main = body.find("<h2>Main (M)").expect("main building section");
    let annex = body.find("<h2>North Annex").expect("annex section");
    assert!(main < annex);
    assert!(body.contains("name=\"water_r1\""));
    assert!(body.contains("Anan"));
}

#[tokio::test]
async fn rows_fragment_shows_usage_since_last_period() {
    let app = meter_staff_app(MockBackend::new()).await;

    let response = app
        .post_form("/meter/rows", &form(&[("water_r1", "132.5"), ("electric_r1", "1010")], false))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(">12.50<"));
    assert!(body.contains(">10<"));
}

#[tokio::test]
async fn preview_counts_only_complete_rooms() {
    let app = meter_staff_app(MockBackend::new()).await;

    let response = app
        .post_form(
            "/meter/batches/preview",
            &form(&[("water_r1", "130"), ("electric_r1", "1010"), ("water_r2", "5"), ("electric_r2", "")], false),
        )
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("<strong>1</strong>"));
    assert!(body.contains("101"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn batch_requires_confirmation() {
    let app = meter_staff_app(MockBackend::new()).await;

    let response = app
        .post_form("/meter/batches", &form(&[("water_r1", "130"), ("electric_r1", "1010")], false))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn non_numeric_reading_rejects_whole_batch() {
    let app = meter_staff_app(MockBackend::new()).await;

    let response = app
        .post_form(
            "/meter/batches",
            &form(&[("water_r1", "130"), ("electric_r1", "1010"), ("water_r3", "abc"), ("electric_r3", "7")], true),
        )
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 422);
    assert!(response.text().await.unwrap().contains("room 201"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn confirmed_batch_saves_readings_then_invoices_in_display_order() {
    let app = meter_staff_app(MockBackend::new()).await;

    let response = app
        .post_form(
            "/meter/batches",
            &form(
                &[
                    ("water_r3", "5"),
                    ("electric_r3", "7"),
                    ("water_r2", "1"),
                    ("electric_r2", "2"),
                    ("water_r1", "130"),
                    ("electric_r1", "1010"),
                ],
                true,
            ),
        )
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let batch_id = batch_id_from(&response.text().await.unwrap()).expect("progress fragment");

    let poll = app.wait_for_batch(&batch_id).await.unwrap();
    assert_eq!(
        poll.redirect.as_deref(),
        Some("/invoices?month=3&year=2026&created=3&generated=2&failed=0")
    );

    // Room 102 has no active contract, so no invoice is requested for it.
    assert_eq!(
        app.backend.calls(),
        vec![reading("r1"), invoice("r1"), reading("r2"), reading("r3"), invoice("r3")]
    );

    // Finished batches are forgotten once reported.
    let again = app.get(&format!("/meter/batches/{}", batch_id)).await.unwrap();
    assert_eq!(again.status().as_u16(), 404);
}

#[tokio::test]
async fn failed_invoice_does_not_stop_batch() {
    let backend = MockBackend::new();
    backend.fail_invoice_for("r1");
    let app = meter_staff_app(backend).await;

    let response = app
        .post_form(
            "/meter/batches",
            &form(&[("water_r1", "130"), ("electric_r1", "1010"), ("water_r3", "5"), ("electric_r3", "7")], true),
        )
        .await
        .unwrap();
    let batch_id = batch_id_from(&response.text().await.unwrap()).unwrap();

    let poll = app.wait_for_batch(&batch_id).await.unwrap();
    assert_eq!(
        poll.redirect.as_deref(),
        Some("/invoices?month=3&year=2026&created=2&generated=1&failed=1")
    );
}

#[tokio::test]
async fn failed_reading_aborts_remaining_rooms() {
    let backend = MockBackend::new();
    backend.fail_reading_for("r2");
    let app = meter_staff_app(backend).await;

    let response = app
        .post_form(
            "/meter/batches",
            &form(
                &[
                    ("water_r1", "130"),
                    ("electric_r1", "1010"),
                    ("water_r2", "1"),
                    ("electric_r2", "2"),
                    ("water_r3", "5"),
                    ("electric_r3", "7"),
                ],
                true,
            ),
        )
        .await
        .unwrap();
    let batch_id = batch_id_from(&response.text().await.unwrap()).unwrap();

    let poll = app.wait_for_batch(&batch_id).await.unwrap();
    assert!(poll.redirect.is_none());
    assert_eq!(poll.status, 200);
    assert!(poll.body.contains("Saving meter readings failed at room 102"));
    assert!(poll.body.contains("Saved 1 reading(s)"));

    assert_eq!(
        app.backend.calls(),
        vec![reading("r1"), invoice("r1"), reading("r2")]
    );
}
