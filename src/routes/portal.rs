use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, DraftOptions};
use crate::models::{
    Attachment, Document, Inspection, InspectionType, Invoice, Machine, NewAttachment,
    NewInspectionNote, PaymentStatus, ATTACHMENT_MAINTENANCE_LOG,
};
use crate::schema::{attachments, documents, inspections, invoices, machines};
use crate::state::AppState;

use super::inspections::{attachment_content_disposition, to_iso};

const MACHINES_PER_PAGE: i64 = 10;
const INSPECTIONS_PER_PAGE: i64 = 15;
const DOCUMENTS_PER_PAGE: i64 = 15;

#[derive(Deserialize)]
pub struct PortalListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub search: Option<String>,
    pub search_in: Option<String>,
    pub sortby: Option<String>,
}

fn default_page() -> i64 {
    1
}

#[derive(Deserialize)]
pub struct RequestInspectionPayload {
    pub request_note: Option<String>,
}

fn pager(page: i64, per_page: i64, total: i64) -> Value {
    let pages = if total == 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    };
    json!({ "page": page, "per_page": per_page, "total": total, "pages": pages })
}

fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1) * per_page
}

/// The customer a portal caller acts for. Staff accounts have no portal
/// scope and see empty listings.
fn portal_customer(user: &AuthenticatedUser) -> Option<Uuid> {
    user.customer_id
}

/// Home-page counters for the portal landing view.
pub async fn counters(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let Some(customer_id) = portal_customer(&user) else {
        return Ok(Json(json!({
            "machine_count": 0,
            "inspection_count": 0,
            "document_count": 0,
        })));
    };

    let mut conn = state.db()?;
    let machine_count: i64 = machines::table
        .filter(machines::customer_id.eq(customer_id))
        .count()
        .get_result(&mut conn)?;
    let inspection_count: i64 = inspections::table
        .filter(inspections::customer_id.eq(customer_id))
        .count()
        .get_result(&mut conn)?;
    let document_count: i64 = documents::table
        .filter(documents::customer_id.eq(customer_id))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(json!({
        "machine_count": machine_count,
        "inspection_count": inspection_count,
        "document_count": document_count,
    })))
}

pub async fn my_machines(
    State(state): State<AppState>,
    Query(params): Query<PortalListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let Some(customer_id) = portal_customer(&user) else {
        return Ok(Json(json!({
            "machines": [],
            "pager": pager(1, MACHINES_PER_PAGE, 0),
        })));
    };

    let mut conn = state.db()?;

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let search_in = params.search_in.as_deref().unwrap_or("all");

    let build_query = || {
        let mut query = machines::table
            .filter(machines::customer_id.eq(customer_id))
            .into_boxed();
        if let Some(pattern) = search.clone() {
            query = match search_in {
                "name" => query.filter(machines::name.ilike(pattern)),
                "serial" => query.filter(machines::serial_number.ilike(pattern)),
                "model" => query.filter(machines::model_no.ilike(pattern)),
                _ => query.filter(
                    machines::name
                        .ilike(pattern.clone())
                        .or(machines::serial_number.ilike(pattern.clone()))
                        .or(machines::model_no.ilike(pattern)),
                ),
            };
        }
        query
    };

    let total: i64 = build_query().count().get_result(&mut conn)?;
    let rows: Vec<Machine> = build_query()
        .order(machines::name.asc())
        .offset(page_offset(params.page, MACHINES_PER_PAGE))
        .limit(MACHINES_PER_PAGE)
        .load(&mut conn)?;

    Ok(Json(json!({
        "machines": rows
            .into_iter()
            .map(|machine| json!({
                "id": machine.id,
                "name": machine.name,
                "serial_number": machine.serial_number,
                "model_no": machine.model_no,
                "manufacturer": machine.manufacturer,
                "next_due_date": machine.next_due_date,
            }))
            .collect::<Vec<_>>(),
        "pager": pager(params.page.max(1), MACHINES_PER_PAGE, total),
    })))
}

pub async fn my_machine_detail(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let machine: Option<Machine> = machines::table
        .find(machine_id)
        .first(&mut conn)
        .optional()?;

    // Foreign or unknown machines bounce back to the list, like the portal
    // pages always have.
    let Some(machine) = machine else {
        return Ok(Redirect::to("/my/machines").into_response());
    };
    if portal_customer(&user) != Some(machine.customer_id) {
        return Ok(Redirect::to("/my/machines").into_response());
    }

    let logs: Vec<Attachment> = attachments::table
        .filter(attachments::machine_id.eq(machine.id))
        .order(attachments::created_at.asc())
        .load(&mut conn)?;

    let inspection_list: Vec<Inspection> = inspections::table
        .filter(inspections::machine_id.eq(machine.id))
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .load(&mut conn)?;

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
            "recurring": machine.recurring,
            "next_due_date": machine.next_due_date,
        },
        "logs": logs
            .into_iter()
            .map(|log| json!({
                "id": log.id,
                "kind": log.kind,
                "filename": log.filename,
                "created_at": to_iso(log.created_at),
            }))
            .collect::<Vec<_>>(),
        "inspections": inspection_list
            .into_iter()
            .map(|inspection| json!({
                "id": inspection.id,
                "reference": inspection.reference,
                "status": inspection.status(),
                "start_date": inspection.start_date,
                "expire_date": inspection.expire_date,
            }))
            .collect::<Vec<_>>(),
    }))
    .into_response())
}

pub async fn request_inspection(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
    payload: Option<Json<RequestInspectionPayload>>,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let machine: Option<Machine> = machines::table
        .find(machine_id)
        .first(&mut conn)
        .optional()?;

    let Some(machine) = machine else {
        return Ok(Redirect::to("/my/machines").into_response());
    };
    if portal_customer(&user) != Some(machine.customer_id) {
        return Ok(Redirect::to("/my/machines").into_response());
    }

    let inspection = lifecycle::create_draft_inspection(
        &mut conn,
        &machine,
        DraftOptions {
            reference: Some(format!("REQ: {}", machine.name)),
            start_date: Utc::now().date_naive(),
            inspection_type: InspectionType::Thorough,
        },
    )?;

    let note = payload
        .and_then(|Json(body)| body.request_note)
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty());

    if let Some(note) = note.as_deref() {
        let new_note = NewInspectionNote {
            id: Uuid::new_v4(),
            inspection_id: inspection.id,
            author: user.username.clone(),
            body: note.to_string(),
        };
        diesel::insert_into(crate::schema::inspection_notes::table)
            .values(&new_note)
            .execute(&mut conn)?;
    }
    drop(conn);

    state
        .notifier
        .inspection_requested(&inspection, &machine, note.as_deref());

    info!(
        inspection_id = %inspection.id,
        machine_id = %machine.id,
        "portal inspection request created"
    );

    Ok(Redirect::to(&format!("/my/machines/{machine_id}?msg=inspection_requested")).into_response())
}

pub async fn upload_log(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let machine: Option<Machine> = machines::table
        .find(machine_id)
        .first(&mut conn)
        .optional()?;

    let Some(machine) = machine else {
        return Ok(Redirect::to("/my/machines").into_response());
    };
    if portal_customer(&user) != Some(machine.customer_id) {
        return Ok(Redirect::to("/my/machines").into_response());
    }
    drop(conn);

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() == Some("attachment") {
            file_name = field.file_name().map(|n| n.to_string());
            content_type = field.content_type().map(|mime| mime.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read file: {err}")))?;
            file_bytes = Some(data.to_vec());
        }
    }

    if let Some(bytes) = file_bytes {
        if !bytes.is_empty() {
            let filename = file_name.unwrap_or_else(|| "maintenance-log".to_string());
            let content_type = content_type.or_else(|| {
                mime_guess::from_path(&filename)
                    .first()
                    .map(|mime| mime.to_string())
            });
            let storage_key = format!("machine-logs/{machine_id}/{}", Uuid::new_v4());

            state
                .storage
                .put_object(&storage_key, bytes, content_type.clone())
                .await
                .map_err(|err| AppError::internal(format!("failed to store log: {err}")))?;

            let mut conn = state.db()?;
            let attachment = NewAttachment {
                id: Uuid::new_v4(),
                inspection_id: None,
                machine_id: Some(machine.id),
                kind: ATTACHMENT_MAINTENANCE_LOG.to_string(),
                filename,
                content_type,
                storage_key,
            };
            diesel::insert_into(attachments::table)
                .values(&attachment)
                .execute(&mut conn)?;

            info!(
                machine_id = %machine.id,
                attachment_id = %attachment.id,
                "maintenance log uploaded"
            );
        }
    }

    Ok(Redirect::to(&format!("/my/machines/{machine_id}?msg=log_uploaded")).into_response())
}

pub async fn my_inspections(
    State(state): State<AppState>,
    Query(params): Query<PortalListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let Some(customer_id) = portal_customer(&user) else {
        return Ok(Json(json!({
            "inspections": [],
            "pager": pager(1, INSPECTIONS_PER_PAGE, 0),
        })));
    };

    let mut conn = state.db()?;

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let search_in = params.search_in.as_deref().unwrap_or("all");

    let build_query = || {
        let mut query = inspections::table
            .inner_join(machines::table)
            .filter(inspections::customer_id.eq(customer_id))
            .into_boxed();
        if let Some(pattern) = search.clone() {
            query = match search_in {
                "ref" => query.filter(inspections::reference.ilike(pattern)),
                "machine" => query.filter(machines::name.ilike(pattern)),
                "serial" => query.filter(machines::serial_number.ilike(pattern)),
                "status" => query.filter(inspections::status.ilike(pattern)),
                _ => query.filter(
                    inspections::reference
                        .ilike(pattern.clone())
                        .or(machines::name.ilike(pattern.clone()))
                        .or(machines::serial_number.ilike(pattern.clone()))
                        .or(inspections::status.ilike(pattern)),
                ),
            };
        }
        query
    };

    let total: i64 = build_query().count().get_result(&mut conn)?;

    let sorted = build_query().select((inspections::all_columns, machines::name));
    let rows: Vec<(Inspection, String)> = match params.sortby.as_deref() {
        Some("status") => sorted
            .order(inspections::status.asc())
            .offset(page_offset(params.page, INSPECTIONS_PER_PAGE))
            .limit(INSPECTIONS_PER_PAGE)
            .load(&mut conn)?,
        _ => sorted
            .order((inspections::start_date.desc(), inspections::created_at.desc()))
            .offset(page_offset(params.page, INSPECTIONS_PER_PAGE))
            .limit(INSPECTIONS_PER_PAGE)
            .load(&mut conn)?,
    };

    Ok(Json(json!({
        "inspections": rows
            .into_iter()
            .map(|(inspection, machine_name)| json!({
                "id": inspection.id,
                "reference": inspection.reference,
                "machine": machine_name,
                "status": inspection.status(),
                "start_date": inspection.start_date,
                "expire_date": inspection.expire_date,
            }))
            .collect::<Vec<_>>(),
        "pager": pager(params.page.max(1), INSPECTIONS_PER_PAGE, total),
    })))
}

pub async fn my_documents(
    State(state): State<AppState>,
    Query(params): Query<PortalListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let Some(customer_id) = portal_customer(&user) else {
        return Ok(Json(json!({
            "documents": [],
            "pager": pager(1, DOCUMENTS_PER_PAGE, 0),
        })));
    };

    let mut conn = state.db()?;

    let total: i64 = documents::table
        .filter(documents::customer_id.eq(customer_id))
        .count()
        .get_result(&mut conn)?;

    let rows: Vec<(Document, Option<Invoice>)> = documents::table
        .left_join(invoices::table)
        .filter(documents::customer_id.eq(customer_id))
        .order(documents::created_at.desc())
        .offset(page_offset(params.page, DOCUMENTS_PER_PAGE))
        .limit(DOCUMENTS_PER_PAGE)
        .load(&mut conn)?;

    Ok(Json(json!({
        "documents": rows
            .into_iter()
            .map(|(document, invoice)| {
                let payment_status = PaymentStatus::from_invoice_state(
                    invoice.as_ref().map(|invoice| invoice.payment_state.as_str()),
                );
                json!({
                    "id": document.id,
                    "name": document.name,
                    "filename": document.filename,
                    "payment_status": payment_status,
                    "created_at": to_iso(document.created_at),
                })
            })
            .collect::<Vec<_>>(),
        "pager": pager(params.page.max(1), DOCUMENTS_PER_PAGE, total),
    })))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;

    // Unlike the machine pages this endpoint answers 404 on foreign records.
    if portal_customer(&user) != Some(document.customer_id) {
        return Err(AppError::not_found());
    }
    drop(conn);

    let bytes = state
        .storage
        .get_object(&document.storage_key)
        .await
        .map_err(|_| AppError::not_found())?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_content_disposition(&document.filename),
    );

    Ok((headers, bytes))
}
