use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Customer, Document, Invoice, NewDocument, NewInvoice, PaymentStatus};
use crate::schema::{customers, documents, invoices};
use crate::state::AppState;

use super::inspections::to_iso;

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct CreateInvoiceRequest {
    pub reference: String,
    pub payment_state: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateInvoiceRequest {
    pub payment_state: String,
}

#[derive(Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub reference: String,
    pub payment_state: String,
}

fn to_document_response(document: Document, invoice: Option<&Invoice>) -> DocumentResponse {
    DocumentResponse {
        id: document.id,
        customer_id: document.customer_id,
        name: document.name,
        filename: document.filename,
        content_type: document.content_type,
        invoice_id: document.invoice_id,
        payment_status: PaymentStatus::from_invoice_state(
            invoice.map(|invoice| invoice.payment_state.as_str()),
        ),
        created_at: to_iso(document.created_at),
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let rows: Vec<(Document, Option<Invoice>)> = documents::table
        .left_join(invoices::table)
        .order(documents::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(document, invoice)| to_document_response(document, invoice.as_ref()))
            .collect(),
    ))
}

pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    user.require_staff()?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut name: Option<String> = None;
    let mut customer_id: Option<Uuid> = None;
    let mut invoice_id: Option<Uuid> = None;

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
            Some("name") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid name: {err}")))?;
                if !value.trim().is_empty() {
                    name = Some(value.trim().to_string());
                }
            }
            Some("customer_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid customer id: {err}")))?;
                customer_id = Some(
                    Uuid::parse_str(value.trim())
                        .map_err(|_| AppError::bad_request("customer_id must be a valid UUID"))?,
                );
            }
            Some("invoice_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid invoice id: {err}")))?;
                if !value.trim().is_empty() {
                    invoice_id = Some(
                        Uuid::parse_str(value.trim())
                            .map_err(|_| AppError::bad_request("invoice_id must be a valid UUID"))?,
                    );
                }
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let filename = file_name.ok_or_else(|| AppError::bad_request("filename is required"))?;
    let customer_id =
        customer_id.ok_or_else(|| AppError::bad_request("customer_id field is required"))?;
    let content_type = content_type.or_else(|| {
        mime_guess::from_path(&filename)
            .first()
            .map(|mime| mime.to_string())
    });

    let mut conn = state.db()?;
    customers::table
        .find(customer_id)
        .first::<Customer>(&mut conn)?;
    let invoice: Option<Invoice> = match invoice_id {
        Some(invoice_id) => Some(invoices::table.find(invoice_id).first(&mut conn)?),
        None => None,
    };
    drop(conn);

    let storage_key = format!("documents/{customer_id}/{}", Uuid::new_v4());
    state
        .storage
        .put_object(&storage_key, file_bytes, content_type.clone())
        .await
        .map_err(|err| AppError::internal(format!("failed to store document: {err}")))?;

    let mut conn = state.db()?;
    let new_document = NewDocument {
        id: Uuid::new_v4(),
        customer_id,
        name: name.unwrap_or_else(|| filename.clone()),
        filename,
        content_type,
        storage_key,
        invoice_id,
    };
    diesel::insert_into(documents::table)
        .values(&new_document)
        .execute(&mut conn)?;

    let document: Document = documents::table.find(new_document.id).first(&mut conn)?;
    info!(document_id = %document.id, customer_id = %customer_id, "portal document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(to_document_response(document, invoice.as_ref())),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<DocumentResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    let invoice: Option<Invoice> = match document.invoice_id {
        Some(invoice_id) => invoices::table.find(invoice_id).first(&mut conn).optional()?,
        None => None,
    };

    Ok(Json(to_document_response(document, invoice.as_ref())))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    diesel::delete(documents::table.find(document_id)).execute(&mut conn)?;
    drop(conn);

    if let Err(err) = state.storage.delete_object(&document.storage_key).await {
        error!(error = %err, key = %document.storage_key, "failed to delete document object");
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> AppResult<(StatusCode, Json<InvoiceResponse>)> {
    user.require_staff()?;

    if payload.reference.trim().is_empty() {
        return Err(AppError::bad_request("reference must not be empty"));
    }

    let mut conn = state.db()?;
    let new_invoice = NewInvoice {
        id: Uuid::new_v4(),
        reference: payload.reference.trim().to_string(),
        payment_state: payload
            .payment_state
            .unwrap_or_else(|| "not_paid".to_string()),
    };
    diesel::insert_into(invoices::table)
        .values(&new_invoice)
        .execute(&mut conn)?;

    let invoice: Invoice = invoices::table.find(new_invoice.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse {
            id: invoice.id,
            reference: invoice.reference,
            payment_state: invoice.payment_state,
        }),
    ))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> AppResult<Json<InvoiceResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let updated = diesel::update(invoices::table.find(invoice_id))
        .set((
            invoices::payment_state.eq(payload.payment_state),
            invoices::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(AppError::not_found());
    }

    let invoice: Invoice = invoices::table.find(invoice_id).first(&mut conn)?;
    Ok(Json(InvoiceResponse {
        id: invoice.id,
        reference: invoice.reference,
        payment_state: invoice.payment_state,
    }))
}
