use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, DraftOptions};
use crate::models::{
    Attachment, Disposition, Inspection, InspectionLine, InspectionNote, InspectionStatus,
    InspectionType, LineImage, Machine, NewLineImage,
};
use crate::qr;
use crate::schema::{
    attachments, inspection_lines, inspection_notes, inspections, line_images, machines,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InspectionListQuery {
    pub status: Option<InspectionStatus>,
    pub machine_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateInspectionRequest {
    pub machine_id: Uuid,
    /// Must match the machine's owner when given; the machine's customer is
    /// used otherwise.
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub inspection_type: Option<InspectionType>,
}

#[derive(Deserialize)]
pub struct UpdateInspectionRequest {
    pub machine_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub inspection_type: Option<InspectionType>,
    pub inspector_name: Option<String>,
    pub inspector_signature: Option<String>,
    pub location_site: Option<String>,
    pub doc_report: Option<bool>,
    pub doc_maintenance: Option<bool>,
    pub doc_load_chart: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateLineRequest {
    pub disposition: Option<Disposition>,
    pub comment: Option<String>,
    pub recommendation: Option<String>,
}

#[derive(Serialize)]
pub struct InspectionResponse {
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub machine_id: Uuid,
    pub category_id: Uuid,
    pub inspection_type: String,
    pub status: InspectionStatus,
    pub start_date: NaiveDate,
    pub expire_date: Option<NaiveDate>,
    pub last_inspection_date: Option<NaiveDate>,
    pub inspector_name: Option<String>,
    pub location_site: Option<String>,
    pub doc_report: bool,
    pub doc_maintenance: bool,
    pub doc_load_chart: bool,
    pub signed_by: Option<String>,
    pub signed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct LineResponse {
    pub id: Uuid,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub disposition: Disposition,
    pub comment: Option<String>,
    pub recommendation: Option<String>,
}

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct LineImageResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub kind: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct InspectionDetailResponse {
    pub inspection: InspectionResponse,
    pub lines: Vec<LineResponse>,
    pub notes: Vec<NoteResponse>,
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(super) fn to_inspection_response(
    state: &AppState,
    inspection: Inspection,
) -> InspectionResponse {
    let qr_code_url = state
        .public_base_url()
        .map(|base| qr::inspection_url(base, inspection.id));
    InspectionResponse {
        status: inspection.status(),
        id: inspection.id,
        reference: inspection.reference,
        customer_id: inspection.customer_id,
        machine_id: inspection.machine_id,
        category_id: inspection.category_id,
        inspection_type: inspection.inspection_type,
        start_date: inspection.start_date,
        expire_date: inspection.expire_date,
        last_inspection_date: inspection.last_inspection_date,
        inspector_name: inspection.inspector_name,
        location_site: inspection.location_site,
        doc_report: inspection.doc_report,
        doc_maintenance: inspection.doc_maintenance,
        doc_load_chart: inspection.doc_load_chart,
        signed_by: inspection.signed_by,
        signed_date: inspection.signed_date.map(to_iso),
        qr_code_url,
        created_at: to_iso(inspection.created_at),
        updated_at: to_iso(inspection.updated_at),
    }
}

fn to_line_response(line: InspectionLine) -> LineResponse {
    let disposition = line.disposition();
    LineResponse {
        id: line.id,
        section: line.section,
        serial_no: line.serial_no,
        name: line.name,
        disposition,
        comment: line.comment,
        recommendation: line.recommendation,
    }
}

fn to_attachment_response(attachment: Attachment) -> AttachmentResponse {
    AttachmentResponse {
        id: attachment.id,
        kind: attachment.kind,
        filename: attachment.filename,
        content_type: attachment.content_type,
        created_at: to_iso(attachment.created_at),
    }
}

pub(crate) fn attachment_content_disposition(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' | '\r' | '\n' => '_',
            _ => ch,
        })
        .collect();
    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{sanitized}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn list_inspections(
    State(state): State<AppState>,
    Query(params): Query<InspectionListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<InspectionResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let mut query = inspections::table.into_boxed();
    if let Some(status) = params.status {
        query = query.filter(inspections::status.eq(status.as_str()));
    }
    if let Some(machine_id) = params.machine_id {
        query = query.filter(inspections::machine_id.eq(machine_id));
    }
    if let Some(customer_id) = params.customer_id {
        query = query.filter(inspections::customer_id.eq(customer_id));
    }

    let inspection_list: Vec<Inspection> = query
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .load(&mut conn)?;

    Ok(Json(
        inspection_list
            .into_iter()
            .map(|inspection| to_inspection_response(&state, inspection))
            .collect(),
    ))
}

pub async fn create_inspection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateInspectionRequest>,
) -> AppResult<(StatusCode, Json<InspectionDetailResponse>)> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let machine: Machine = machines::table.find(payload.machine_id).first(&mut conn)?;

    // The customer on an inspection must be the machine's owner. The source
    // only nudged this in a form handler; here it blocks the write.
    if let Some(customer_id) = payload.customer_id {
        if customer_id != machine.customer_id {
            return Err(AppError::validation(
                "customer does not own the selected machine",
            ));
        }
    }

    let inspection = lifecycle::create_draft_inspection(
        &mut conn,
        &machine,
        DraftOptions {
            reference: None,
            start_date: payload
                .start_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            inspection_type: payload.inspection_type.unwrap_or_default(),
        },
    )?;

    info!(
        inspection_id = %inspection.id,
        reference = %inspection.reference,
        machine_id = %machine.id,
        "inspection created"
    );

    let detail = load_detail(&state, &mut conn, inspection)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InspectionDetailResponse>> {
    let mut conn = state.db()?;
    let inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;

    if !user.can_access_customer(inspection.customer_id) {
        return Err(AppError::forbidden());
    }

    let detail = load_detail(&state, &mut conn, inspection)?;
    Ok(Json(detail))
}

pub async fn update_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateInspectionRequest>,
) -> AppResult<Json<InspectionDetailResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let mut inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;

    // Re-pointing the machine replaces the checklist wholesale and pulls the
    // owner across, before any other field is applied.
    if let Some(machine_id) = payload.machine_id {
        if machine_id != inspection.machine_id {
            let machine: Machine = machines::table.find(machine_id).first(&mut conn)?;
            inspection = lifecycle::rebind_machine(&mut conn, &inspection, &machine)?;
        }
    }

    if let Some(customer_id) = payload.customer_id {
        if customer_id != inspection.customer_id {
            return Err(AppError::validation(
                "customer does not own the selected machine",
            ));
        }
    }

    let start_date = payload.start_date.unwrap_or(inspection.start_date);
    let expire_date = match payload.expire_date {
        Some(expire_date) => Some(expire_date),
        None => {
            if payload.start_date.is_some() {
                lifecycle::expire_date_for(start_date)
            } else {
                inspection.expire_date
            }
        }
    };
    if let Some(expire) = expire_date {
        if expire < start_date {
            return Err(AppError::validation(
                "expiry date cannot be earlier than the inspection date",
            ));
        }
    }

    let inspection_type = payload
        .inspection_type
        .map(|t| t.as_str().to_string())
        .unwrap_or(inspection.inspection_type);

    diesel::update(inspections::table.find(inspection_id))
        .set((
            inspections::start_date.eq(start_date),
            inspections::expire_date.eq(expire_date),
            inspections::inspection_type.eq(inspection_type),
            inspections::inspector_name
                .eq(payload.inspector_name.or(inspection.inspector_name)),
            inspections::inspector_signature
                .eq(payload.inspector_signature.or(inspection.inspector_signature)),
            inspections::location_site.eq(payload.location_site.or(inspection.location_site)),
            inspections::doc_report.eq(payload.doc_report.unwrap_or(inspection.doc_report)),
            inspections::doc_maintenance
                .eq(payload.doc_maintenance.unwrap_or(inspection.doc_maintenance)),
            inspections::doc_load_chart
                .eq(payload.doc_load_chart.unwrap_or(inspection.doc_load_chart)),
            inspections::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let refreshed: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;
    let detail = load_detail(&state, &mut conn, refreshed)?;
    Ok(Json(detail))
}

pub async fn delete_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let deleted = diesel::delete(inspections::table.find(inspection_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn action_pass(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InspectionResponse>> {
    user.require_staff()?;

    let inspection = lifecycle::mark_passed(&state, inspection_id).await?;
    Ok(Json(to_inspection_response(&state, inspection)))
}

pub async fn action_fail(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InspectionResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let inspection = lifecycle::set_status(&mut conn, inspection_id, InspectionStatus::Failed)?;
    Ok(Json(to_inspection_response(&state, inspection)))
}

pub async fn action_reset_draft(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InspectionResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let inspection = lifecycle::set_status(&mut conn, inspection_id, InspectionStatus::Draft)?;
    Ok(Json(to_inspection_response(&state, inspection)))
}

pub async fn update_line(
    State(state): State<AppState>,
    Path((inspection_id, line_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateLineRequest>,
) -> AppResult<Json<LineResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let line: InspectionLine = inspection_lines::table.find(line_id).first(&mut conn)?;
    if line.inspection_id != inspection_id {
        return Err(AppError::not_found());
    }

    let disposition = payload
        .disposition
        .map(|d| d.as_str().to_string())
        .unwrap_or(line.disposition);

    diesel::update(inspection_lines::table.find(line_id))
        .set((
            inspection_lines::disposition.eq(disposition),
            inspection_lines::comment.eq(payload.comment.or(line.comment)),
            inspection_lines::recommendation
                .eq(payload.recommendation.or(line.recommendation)),
        ))
        .execute(&mut conn)?;

    let updated: InspectionLine = inspection_lines::table.find(line_id).first(&mut conn)?;
    Ok(Json(to_line_response(updated)))
}

pub async fn list_line_images(
    State(state): State<AppState>,
    Path((inspection_id, line_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<LineImageResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let line: InspectionLine = inspection_lines::table.find(line_id).first(&mut conn)?;
    if line.inspection_id != inspection_id {
        return Err(AppError::not_found());
    }

    let images: Vec<LineImage> = line_images::table
        .filter(line_images::line_id.eq(line_id))
        .order(line_images::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(
        images
            .into_iter()
            .map(|image| LineImageResponse {
                id: image.id,
                name: image.name,
                description: image.description,
                content_type: image.content_type,
                created_at: to_iso(image.created_at),
            })
            .collect(),
    ))
}

pub async fn upload_line_image(
    State(state): State<AppState>,
    Path((inspection_id, line_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<LineImageResponse>)> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let line: InspectionLine = inspection_lines::table.find(line_id).first(&mut conn)?;
    if line.inspection_id != inspection_id {
        return Err(AppError::not_found());
    }
    drop(conn);

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        match field.name().map(|n| n.to_string()).as_deref() {
            Some("file") => {
                file_name = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("description") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid description: {err}"))
                })?;
                if !value.trim().is_empty() {
                    description = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let file_name = file_name.unwrap_or_else(|| "evidence".to_string());

    let storage_key = format!("evidence/{line_id}/{}", Uuid::new_v4());
    state
        .storage
        .put_object(&storage_key, file_bytes, content_type.clone())
        .await
        .map_err(|err| AppError::internal(format!("failed to store evidence photo: {err}")))?;

    let mut conn = state.db()?;
    let new_image = NewLineImage {
        id: Uuid::new_v4(),
        line_id,
        name: file_name,
        description,
        content_type,
        storage_key,
    };
    diesel::insert_into(line_images::table)
        .values(&new_image)
        .execute(&mut conn)?;

    let image: LineImage = line_images::table.find(new_image.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(LineImageResponse {
            id: image.id,
            name: image.name,
            description: image.description,
            content_type: image.content_type,
            created_at: to_iso(image.created_at),
        }),
    ))
}

pub async fn delete_line_image(
    State(state): State<AppState>,
    Path((inspection_id, line_id, image_id)): Path<(Uuid, Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let image: LineImage = line_images::table.find(image_id).first(&mut conn)?;
    let line: InspectionLine = inspection_lines::table
        .find(image.line_id)
        .first(&mut conn)?;
    if image.line_id != line_id || line.inspection_id != inspection_id {
        return Err(AppError::not_found());
    }

    diesel::delete(line_images::table.find(image_id)).execute(&mut conn)?;
    drop(conn);

    if let Err(err) = state.storage.delete_object(&image.storage_key).await {
        error!(error = %err, key = %image.storage_key, "failed to delete evidence object");
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(inspection_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<AttachmentResponse>>> {
    let mut conn = state.db()?;
    let inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;

    if !user.can_access_customer(inspection.customer_id) {
        return Err(AppError::forbidden());
    }

    let rows: Vec<Attachment> = attachments::table
        .filter(attachments::inspection_id.eq(inspection_id))
        .order(attachments::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(to_attachment_response).collect()))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path((inspection_id, attachment_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let mut conn = state.db()?;
    let inspection: Inspection = inspections::table.find(inspection_id).first(&mut conn)?;

    if !user.can_access_customer(inspection.customer_id) {
        return Err(AppError::forbidden());
    }

    let attachment: Attachment = attachments::table.find(attachment_id).first(&mut conn)?;
    if attachment.inspection_id != Some(inspection_id) {
        return Err(AppError::not_found());
    }
    drop(conn);

    let bytes = state
        .storage
        .get_object(&attachment.storage_key)
        .await
        .map_err(|_| AppError::not_found())?;

    let mut headers = HeaderMap::new();
    let content_type = attachment
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_content_disposition(&attachment.filename),
    );

    Ok((headers, bytes))
}

fn load_detail(
    state: &AppState,
    conn: &mut PgConnection,
    inspection: Inspection,
) -> AppResult<InspectionDetailResponse> {
    let lines: Vec<InspectionLine> = inspection_lines::table
        .filter(inspection_lines::inspection_id.eq(inspection.id))
        .order(inspection_lines::created_at.asc())
        .load(conn)?;

    let notes: Vec<InspectionNote> = inspection_notes::table
        .filter(inspection_notes::inspection_id.eq(inspection.id))
        .order(inspection_notes::created_at.asc())
        .load(conn)?;

    Ok(InspectionDetailResponse {
        inspection: to_inspection_response(state, inspection),
        lines: lines.into_iter().map(to_line_response).collect(),
        notes: notes
            .into_iter()
            .map(|note| NoteResponse {
                id: note.id,
                author: note.author,
                body: note.body,
                created_at: to_iso(note.created_at),
            })
            .collect(),
    })
}
