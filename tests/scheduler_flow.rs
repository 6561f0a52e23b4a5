mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{acquire_db_lock, body_to_vec, TestApp};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use certification::models::{Inspection, Machine};
use certification::scheduler;
use certification::schema::{inspections, machines};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    token: String,
    machine_id: Uuid,
}

async fn fixture(app: &TestApp, recurring: bool, next_due: Option<&str>) -> Result<Fixture> {
    app.insert_user("inspector", "staffpass", "staff", None)
        .await?;
    let token = app.login_token("inspector", "staffpass").await?;
    let customer_id = app.insert_customer("Acme Rentals", None).await?;

    let response = app
        .post_json(
            "/api/categories",
            &json!({ "name": "Scissor Lift" }),
            Some(&token),
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
                "customer_id": customer_id,
                "category_id": category.id,
                "recurring": recurring,
                "recurring_interval": "3_month",
                "next_due_date": next_due,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    #[derive(Deserialize)]
    struct MachineInfo {
        id: Uuid,
    }
    let machine: MachineInfo = serde_json::from_slice(&body)?;

    Ok(Fixture {
        token,
        machine_id: machine.id,
    })
}

#[tokio::test]
async fn due_machine_gets_one_inspection_and_advances() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app, true, Some("2024-01-01")).await?;

    let summary = app
        .with_conn(move |conn| {
            scheduler::run_recurring(conn, date(2024, 2, 1))
                .map_err(|err| anyhow::anyhow!("sweep failed: {err:?}"))
        })
        .await?;
    assert_eq!(summary.machines_due, 1);
    assert_eq!(summary.inspections_created, 1);

    let machine_id = fx.machine_id;
    let (machine, rows): (Machine, Vec<Inspection>) = app
        .with_conn(move |conn| {
            let machine: Machine = machines::table.find(machine_id).first(conn)?;
            let rows: Vec<Inspection> = inspections::table
                .filter(inspections::machine_id.eq(machine_id))
                .load(conn)?;
            Ok((machine, rows))
        })
        .await?;

    // Interval applied once to the previous due date, not to today.
    assert_eq!(machine.next_due_date, Some(date(2024, 4, 1)));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "draft");
    assert_eq!(rows[0].start_date, date(2024, 2, 1));
    assert_eq!(rows[0].expire_date, Some(date(2024, 8, 1)));

    // The snapshot rides along with scheduler-created drafts too.
    let response = app
        .get(&format!("/api/inspections/{}", rows[0].id), Some(&fx.token))
        .await?;
    let body = body_to_vec(response.into_body()).await?;
    let detail: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(detail["lines"].as_array().unwrap().len(), 24);

    // Once advanced past today the machine is no longer due.
    let summary = app
        .with_conn(move |conn| {
            scheduler::run_recurring(conn, date(2024, 2, 1))
                .map_err(|err| anyhow::anyhow!("sweep failed: {err:?}"))
        })
        .await?;
    assert_eq!(summary.machines_due, 0);
    assert_eq!(summary.inspections_created, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn machines_not_due_are_left_alone() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app, true, Some("2024-06-01")).await?;

    let summary = app
        .with_conn(move |conn| {
            scheduler::run_recurring(conn, date(2024, 2, 1))
                .map_err(|err| anyhow::anyhow!("sweep failed: {err:?}"))
        })
        .await?;
    assert_eq!(summary.machines_due, 0);

    let machine_id = fx.machine_id;
    let count: i64 = app
        .with_conn(move |conn| {
            let count = inspections::table
                .filter(inspections::machine_id.eq(machine_id))
                .count()
                .get_result(conn)?;
            Ok(count)
        })
        .await?;
    assert_eq!(count, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn non_recurring_machines_are_ignored() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app, false, Some("2024-01-01")).await?;

    let summary = app
        .with_conn(move |conn| {
            scheduler::run_recurring(conn, date(2024, 2, 1))
                .map_err(|err| anyhow::anyhow!("sweep failed: {err:?}"))
        })
        .await?;
    assert_eq!(summary.machines_due, 0);
    assert_eq!(summary.inspections_created, 0);

    let machine_id = fx.machine_id;
    let machine: Machine = app
        .with_conn(move |conn| {
            let machine = machines::table.find(machine_id).first(conn)?;
            Ok(machine)
        })
        .await?;
    assert_eq!(machine.next_due_date, Some(date(2024, 1, 1)));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn overdue_by_many_cycles_still_advances_once() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = fixture(&app, true, Some("2023-01-01")).await?;

    let summary = app
        .with_conn(move |conn| {
            scheduler::run_recurring(conn, date(2024, 2, 1))
                .map_err(|err| anyhow::anyhow!("sweep failed: {err:?}"))
        })
        .await?;
    assert_eq!(summary.inspections_created, 1);

    let machine_id = fx.machine_id;
    let (machine, count): (Machine, i64) = app
        .with_conn(move |conn| {
            let machine: Machine = machines::table.find(machine_id).first(conn)?;
            let count = inspections::table
                .filter(inspections::machine_id.eq(machine_id))
                .count()
                .get_result(conn)?;
            Ok((machine, count))
        })
        .await?;

    // No catch-up: one inspection, one interval step.
    assert_eq!(count, 1);
    assert_eq!(machine.next_due_date, Some(date(2023, 4, 1)));

    app.cleanup().await?;
    Ok(())
}
