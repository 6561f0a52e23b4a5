use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use base64::Engine;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Category, Customer, Inspection, InspectionLine, InspectionStatus, Machine};
use crate::qr;
use crate::schema::{categories, customers, inspection_lines, inspections, machines};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignRequest {
    pub name: Option<String>,
    pub signature: Option<String>,
}

/// Public certificate view: anyone holding the QR link can read the
/// inspection sheet.
pub async fn view_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;

    let inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;
    let machine: Machine = machines::table.find(inspection.machine_id).first(&mut conn)?;
    let customer: Customer = customers::table
        .find(inspection.customer_id)
        .first(&mut conn)?;
    let category: Category = categories::table
        .find(inspection.category_id)
        .first(&mut conn)?;
    let lines: Vec<InspectionLine> = inspection_lines::table
        .filter(inspection_lines::inspection_id.eq(inspection.id))
        .order(inspection_lines::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(json!({
        "inspection": {
            "id": inspection.id,
            "reference": inspection.reference,
            "status": inspection.status(),
            "inspection_type": inspection.inspection_type,
            "start_date": inspection.start_date,
            "expire_date": inspection.expire_date,
            "last_inspection_date": inspection.last_inspection_date,
            "inspector_name": inspection.inspector_name,
            "location_site": inspection.location_site,
            "signed_by": inspection.signed_by,
            "signed_date": inspection.signed_date.map(super::inspections::to_iso),
        },
        "machine": {
            "id": machine.id,
            "name": machine.name,
            "serial_number": machine.serial_number,
            "model_no": machine.model_no,
            "swl": machine.swl,
            "manufacturer": machine.manufacturer,
        },
        "customer": { "id": customer.id, "name": customer.name },
        "category": { "id": category.id, "name": category.name, "standard": category.standard },
        "lines": lines
            .into_iter()
            .map(|line| {
                let disposition = line.disposition();
                json!({
                    "section": line.section,
                    "serial_no": line.serial_no,
                    "name": line.name,
                    "disposition": disposition,
                    "comment": line.comment,
                    "recommendation": line.recommendation,
                })
            })
            .collect::<Vec<_>>(),
    })))
}

/// Public machine information page behind the machine QR code.
pub async fn machine_info(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;

    let machine: Machine = machines::table.find(machine_id).first(&mut conn)?;
    let customer: Customer = customers::table.find(machine.customer_id).first(&mut conn)?;
    let category: Category = categories::table
        .find(machine.category_id)
        .first(&mut conn)?;

    let latest_passed: Option<Inspection> = inspections::table
        .filter(inspections::machine_id.eq(machine.id))
        .filter(inspections::status.eq(InspectionStatus::Passed.as_str()))
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .first(&mut conn)
        .optional()?;

    Ok(Json(json!({
        "machine": {
            "id": machine.id,
            "name": machine.name,
            "serial_number": machine.serial_number,
            "model_no": machine.model_no,
            "swl": machine.swl,
            "build_year": machine.build_year,
            "manufacturer": machine.manufacturer,
            "owner_id_no": machine.owner_id_no,
            "gps_coordinates": machine.gps_coordinates,
        },
        "customer": { "id": customer.id, "name": customer.name },
        "category": { "id": category.id, "name": category.name, "standard": category.standard },
        "latest_passed_inspection": latest_passed.map(|inspection| json!({
            "id": inspection.id,
            "reference": inspection.reference,
            "start_date": inspection.start_date,
            "expire_date": inspection.expire_date,
        })),
    })))
}

pub async fn inspection_qr_download(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let mut conn = state.db()?;
    let inspection: Inspection = inspections::table
        .find(inspection_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    drop(conn);

    // Outsiders get the same 404 as a missing record.
    if !user.can_access_customer(inspection.customer_id) {
        return Err(AppError::not_found());
    }

    let base_url = state.public_base_url().ok_or_else(AppError::not_found)?;
    let url = qr::inspection_url(base_url, inspection.id);
    let png = qr::png(&url).map_err(|_| AppError::not_found())?;

    Ok((
        qr_headers(&inspection.reference.replace('/', "_")),
        png,
    ))
}

pub async fn machine_qr_download(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let mut conn = state.db()?;
    let machine: Machine = machines::table
        .find(machine_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    drop(conn);

    if !user.can_access_customer(machine.customer_id) {
        return Err(AppError::not_found());
    }

    let base_url = state.public_base_url().ok_or_else(AppError::not_found)?;
    let url = qr::machine_url(base_url, machine.id);
    let png = qr::png(&url).map_err(|_| AppError::not_found())?;

    Ok((qr_headers(&machine.name.replace('/', "_")), png))
}

fn qr_headers(safe_name: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=QR_{safe_name}.png"))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=QR_code.png")),
    );
    headers
}

/// Customer signature capture. The caller must be the owning customer or
/// staff; the write itself goes through the service connection, which is how
/// otherwise read-only portal accounts get their signature onto the record.
pub async fn sign_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<SignRequest>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;

    if !user.can_access_customer(inspection.customer_id) {
        return Ok(Json(json!({
            "error": "You are not authorized to sign this document."
        })));
    }

    if let Some(signature) = payload.signature {
        // Browsers send a data URI; only the base64 payload is stored.
        let signature = match signature.split_once(',') {
            Some((_, payload)) => payload.to_string(),
            None => signature,
        };
        if base64::engine::general_purpose::STANDARD
            .decode(signature.as_bytes())
            .is_err()
        {
            return Ok(Json(json!({ "error": "signature is not valid base64" })));
        }
        let signed_by = payload
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.username.clone());

        diesel::update(inspections::table.find(inspection_id))
            .set((
                inspections::customer_signature.eq(Some(signature)),
                inspections::signed_by.eq(Some(signed_by.clone())),
                inspections::signed_date.eq(Some(Utc::now().naive_utc())),
                inspections::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)?;

        info!(
            inspection_id = %inspection_id,
            signed_by = %signed_by,
            "inspection signed"
        );
    }

    Ok(Json(json!({
        "force_refresh": true,
        "redirect_url": format!("/inspection/view/{inspection_id}"),
    })))
}
