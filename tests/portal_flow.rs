mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

struct Fixture {
    staff_token: String,
    portal_token: String,
    customer_id: Uuid,
    machine_id: Uuid,
}

async fn fixture(app: &TestApp) -> Result<Fixture> {
    app.insert_user("inspector", "staffpass", "staff", None)
        .await?;
    let staff_token = app.login_token("inspector", "staffpass").await?;

    let customer_id = app.insert_customer("Acme Rentals", Some("Dublin")).await?;
    app.insert_user("acme", "portalpass", "customer", Some(customer_id))
        .await?;
    let portal_token = app.login_token("acme", "portalpass").await?;

    let response = app
        .post_json(
            "/api/categories",
            &json!({ "name": "Scissor Lift" }),
            Some(&staff_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    #[derive(Deserialize)]
    struct CategoryInfo {
        id: Uuid,
    }
    let category: CategoryInfo = serde_json::from_slice(&body)?;

    let response = app
        .post_json(
            "/api/machines",
            &json!({
                "name": "SL-100",
                "serial_number": "SN-001",
                "customer_id": customer_id,
                "category_id": category.id,
            }),
            Some(&staff_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    #[derive(Deserialize)]
    struct MachineInfo {
        id: Uuid,
    }
    let machine: MachineInfo = serde_json::from_slice(&body)?;

    Ok(Fixture {
        staff_token,
        portal_token,
        customer_id,
        machine_id: machine.id,
    })
}

#[tokio::test]
async fn machine_listing_is_customer_scoped() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    // A second customer with their own machine must never leak through.
    let other = app.insert_customer("Beta Logistics", None).await?;
    let response = app
        .post_json(
            "/api/categories",
            &json!({ "name": "Forklift" }),
            Some(&fx.staff_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let category: Value = serde_json::from_slice(&body)?;
    app.post_json(
        "/api/machines",
        &json!({
            "name": "FL-9",
            "customer_id": other,
            "category_id": category["id"],
        }),
        Some(&fx.staff_token),
    )
    .await?;

    let response = app.get("/my/machines", Some(&fx.portal_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    let machines = listing["machines"].as_array().unwrap();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0]["name"], json!("SL-100"));
    assert_eq!(listing["pager"]["total"], json!(1));

    // Search narrows by serial number.
    let response = app
        .get(
            "/my/machines?search=SN-001&search_in=serial",
            Some(&fx.portal_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    assert_eq!(listing["machines"].as_array().unwrap().len(), 1);

    let response = app
        .get(
            "/my/machines?search=nothing&search_in=serial",
            Some(&fx.portal_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    assert!(listing["machines"].as_array().unwrap().is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn foreign_machine_detail_redirects_to_list() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    let other = app.insert_customer("Beta Logistics", None).await?;
    app.insert_user("rival", "rivalpass", "customer", Some(other))
        .await?;
    let rival_token = app.login_token("rival", "rivalpass").await?;

    let response = app
        .get(&format!("/my/machines/{}", fx.machine_id), Some(&rival_token))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/my/machines"
    );

    let response = app
        .get(&format!("/my/machines/{}", fx.machine_id), Some(&fx.portal_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn request_inspection_creates_draft_with_note() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    let response = app
        .post_json(
            &format!("/my/machines/{}/request_inspection", fx.machine_id),
            &json!({ "request_note": "Lift makes a grinding noise" }),
            Some(&fx.portal_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get("location").unwrap().to_str()?;
    assert!(location.contains("msg=inspection_requested"));

    let response = app.get("/my/inspections", Some(&fx.portal_token)).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    let rows = listing["inspections"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["reference"], json!("REQ: SL-100"));
    assert_eq!(rows[0]["status"], json!("draft"));

    // The note lands on the inspection record.
    let inspection_id = Uuid::parse_str(rows[0]["id"].as_str().unwrap())?;
    let response = app
        .get(
            &format!("/api/inspections/{inspection_id}"),
            Some(&fx.staff_token),
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let detail: Value = serde_json::from_slice(&body)?;
    let notes = detail["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["body"], json!("Lift makes a grinding noise"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn maintenance_log_upload_round_trip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    let response = app
        .upload_multipart(
            &format!("/my/machines/{}/upload_log", fx.machine_id),
            "attachment",
            "service-log.pdf",
            "application/pdf",
            b"fake pdf bytes",
            &[],
            &fx.portal_token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get("location").unwrap().to_str()?;
    assert!(location.contains("msg=log_uploaded"));

    let response = app
        .get(&format!("/my/machines/{}", fx.machine_id), Some(&fx.portal_token))
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let detail: Value = serde_json::from_slice(&body)?;
    let logs = detail["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["filename"], json!("service-log.pdf"));
    assert_eq!(logs[0]["kind"], json!("maintenance_log"));
    assert_eq!(app.storage().object_count().await, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn documents_carry_invoice_payment_status() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    let response = app
        .post_json(
            "/api/invoices",
            &json!({ "reference": "INV-1", "payment_state": "in_payment" }),
            Some(&fx.staff_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let invoice: Value = serde_json::from_slice(&body)?;
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    let customer_field = fx.customer_id.to_string();
    let response = app
        .upload_multipart(
            "/api/documents",
            "file",
            "contract.pdf",
            "application/pdf",
            b"contract body",
            &[
                ("customer_id", customer_field.as_str()),
                ("invoice_id", invoice_id.as_str()),
                ("name", "Service contract"),
            ],
            &fx.staff_token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .upload_multipart(
            "/api/documents",
            "file",
            "quote.pdf",
            "application/pdf",
            b"quote body",
            &[("customer_id", customer_field.as_str())],
            &fx.staff_token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.get("/my/documents", Some(&fx.portal_token)).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    let docs = listing["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 2);

    // in_payment maps to paid; no invoice maps to unpaid.
    let by_name = |name: &str| {
        docs.iter()
            .find(|doc| doc["name"] == json!(name))
            .cloned()
            .unwrap()
    };
    assert_eq!(by_name("Service contract")["payment_status"], json!("paid"));
    assert_eq!(by_name("quote.pdf")["payment_status"], json!("unpaid"));

    // Partial payments surface as partial.
    let response = app
        .patch_json(
            &format!("/api/invoices/{invoice_id}"),
            &json!({ "payment_state": "partial" }),
            Some(&fx.staff_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/my/documents", Some(&fx.portal_token)).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: Value = serde_json::from_slice(&body)?;
    let docs = listing["documents"].as_array().unwrap();
    let contract = docs
        .iter()
        .find(|doc| doc["name"] == json!("Service contract"))
        .unwrap();
    assert_eq!(contract["payment_status"], json!("partial"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn document_download_is_owner_only() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app).await?;

    let customer_field = fx.customer_id.to_string();
    let response = app
        .upload_multipart(
            "/api/documents",
            "file",
            "contract.pdf",
            "application/pdf",
            b"contract body",
            &[("customer_id", customer_field.as_str())],
            &fx.staff_token,
        )
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let document: Value = serde_json::from_slice(&body)?;
    let document_id = document["id"].as_str().unwrap().to_string();

    let response = app
        .get(
            &format!("/my/documents/download/{document_id}"),
            Some(&fx.portal_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()?
        .to_string();
    assert!(disposition.contains("contract.pdf"));
    let body = body_to_vec(response.into_body()).await?;
    assert_eq!(body, b"contract body");

    let other = app.insert_customer("Beta Logistics", None).await?;
    app.insert_user("rival", "rivalpass", "customer", Some(other))
        .await?;
    let rival_token = app.login_token("rival", "rivalpass").await?;
    let response = app
        .get(
            &format!("/my/documents/download/{document_id}"),
            Some(&rival_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
