use chrono::{Months, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::checklist;
use crate::error::{AppError, AppResult};
use crate::models::{
    Category, Customer, Inspection, InspectionStatus, InspectionType, Machine, NewAttachment,
    NewInspection, RecurringInterval, ATTACHMENT_CERTIFICATE, SEQUENCE_INSPECTION,
};
use crate::qr;
use crate::render::CertificateContext;
use crate::schema::{attachments, categories, customers, inspection_lines, inspections, machines};
use crate::sequence;
use crate::state::AppState;

/// Certificates run for six months from the inspection date.
pub const VALIDITY_MONTHS: u32 = 6;

pub fn expire_date_for(start_date: NaiveDate) -> Option<NaiveDate> {
    start_date.checked_add_months(Months::new(VALIDITY_MONTHS))
}

/// Next due date after a scheduler firing: the interval applied once to the
/// previous due date, never to today. A machine several cycles overdue still
/// advances by a single interval per run.
pub fn advance_due_date(previous: NaiveDate, interval: RecurringInterval) -> Option<NaiveDate> {
    previous.checked_add_months(Months::new(interval.months()))
}

/// Start date of the most recent passed inspection for a machine, excluding
/// the record being edited. Shown on certificates for continuity.
pub fn last_passed_start_date(
    conn: &mut PgConnection,
    machine_id: Uuid,
    exclude: Option<Uuid>,
) -> AppResult<Option<NaiveDate>> {
    let mut query = inspections::table
        .filter(inspections::machine_id.eq(machine_id))
        .filter(inspections::status.eq(InspectionStatus::Passed.as_str()))
        .into_boxed();

    if let Some(exclude) = exclude {
        query = query.filter(inspections::id.ne(exclude));
    }

    let found: Option<NaiveDate> = query
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .select(inspections::start_date)
        .first(conn)
        .optional()?;
    Ok(found)
}

pub struct DraftOptions {
    pub reference: Option<String>,
    pub start_date: NaiveDate,
    pub inspection_type: InspectionType,
}

/// Creates a draft inspection bound to a machine: reference from the
/// inspection sequence unless supplied, customer and category copied from
/// the machine, expiry derived from the start date, and the checklist
/// snapshotted from the effective question set.
pub fn create_draft_inspection(
    conn: &mut PgConnection,
    machine: &Machine,
    options: DraftOptions,
) -> AppResult<Inspection> {
    let reference = match options.reference {
        Some(reference) => reference,
        None => sequence::next_by_code(conn, SEQUENCE_INSPECTION)?,
    };

    let expire_date = expire_date_for(options.start_date);
    let last_inspection_date = last_passed_start_date(conn, machine.id, None)?;
    let customer: Customer = customers::table.find(machine.customer_id).first(conn)?;

    let new_inspection = NewInspection {
        id: Uuid::new_v4(),
        reference,
        customer_id: machine.customer_id,
        machine_id: machine.id,
        category_id: machine.category_id,
        inspection_type: options.inspection_type.as_str().to_string(),
        status: InspectionStatus::Draft.as_str().to_string(),
        start_date: options.start_date,
        expire_date,
        last_inspection_date,
        location_site: customer.city,
    };

    diesel::insert_into(inspections::table)
        .values(&new_inspection)
        .execute(conn)?;

    let questions = checklist::effective_questions(conn, machine)?;
    checklist::rebuild_lines(conn, new_inspection.id, &questions)?;

    let inspection = inspections::table.find(new_inspection.id).first(conn)?;
    Ok(inspection)
}

/// Re-points an inspection at a machine: customer and category follow the
/// machine, the last-inspection date is refreshed, and any existing lines
/// are discarded and replaced with a fresh snapshot.
pub fn rebind_machine(
    conn: &mut PgConnection,
    inspection: &Inspection,
    machine: &Machine,
) -> AppResult<Inspection> {
    let last_inspection_date = last_passed_start_date(conn, machine.id, Some(inspection.id))?;

    diesel::update(inspections::table.find(inspection.id))
        .set((
            inspections::machine_id.eq(machine.id),
            inspections::customer_id.eq(machine.customer_id),
            inspections::category_id.eq(machine.category_id),
            inspections::last_inspection_date.eq(last_inspection_date),
            inspections::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    let questions = checklist::effective_questions(conn, machine)?;
    checklist::rebuild_lines(conn, inspection.id, &questions)?;

    let refreshed = inspections::table.find(inspection.id).first(conn)?;
    Ok(refreshed)
}

pub fn set_status(
    conn: &mut PgConnection,
    inspection_id: Uuid,
    status: InspectionStatus,
) -> AppResult<Inspection> {
    let updated = diesel::update(inspections::table.find(inspection_id))
        .set((
            inspections::status.eq(status.as_str()),
            inspections::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(AppError::not_found());
    }

    let inspection = inspections::table.find(inspection_id).first(conn)?;
    Ok(inspection)
}

/// Pass transition: flips the status, then renders and attaches the
/// certificate. The render/store leg is best-effort; its failure is logged
/// and the inspection stays passed.
pub async fn mark_passed(state: &AppState, inspection_id: Uuid) -> AppResult<Inspection> {
    let mut conn = state.db()?;
    let inspection = set_status(&mut conn, inspection_id, InspectionStatus::Passed)?;
    drop(conn);

    if let Err(err) = generate_certificate(state, &inspection).await {
        warn!(
            inspection_id = %inspection.id,
            error = %err,
            "certificate generation failed; inspection remains passed"
        );
    }

    Ok(inspection)
}

async fn generate_certificate(state: &AppState, inspection: &Inspection) -> AppResult<()> {
    let mut conn = state.db()?;
    let machine: Machine = machines::table.find(inspection.machine_id).first(&mut conn)?;
    let customer: Customer = customers::table
        .find(inspection.customer_id)
        .first(&mut conn)?;
    let category: Category = categories::table
        .find(inspection.category_id)
        .first(&mut conn)?;
    let lines = inspection_lines::table
        .filter(inspection_lines::inspection_id.eq(inspection.id))
        .order(inspection_lines::created_at.asc())
        .load(&mut conn)?;
    drop(conn);

    let public_url = state
        .public_base_url()
        .map(|base| qr::inspection_url(base, inspection.id));
    let context = CertificateContext {
        inspection,
        machine: &machine,
        customer: &customer,
        category: &category,
        lines: &lines,
        public_url,
    };

    let rendered = state
        .renderer
        .render(&context)
        .map_err(|err| AppError::internal(format!("certificate render failed: {err}")))?;

    let safe_reference = inspection.reference.replace('/', "_");
    let storage_key = format!(
        "certificates/{}/{}.{}",
        inspection.id,
        Uuid::new_v4(),
        rendered.extension
    );
    let content_type = rendered.content_type.to_string();

    state
        .storage
        .put_object(&storage_key, rendered.bytes, Some(content_type.clone()))
        .await
        .map_err(|err| AppError::internal(format!("certificate upload failed: {err}")))?;

    let mut conn = state.db()?;
    let attachment = NewAttachment {
        id: Uuid::new_v4(),
        inspection_id: Some(inspection.id),
        machine_id: None,
        kind: ATTACHMENT_CERTIFICATE.to_string(),
        filename: format!("Certificate_{safe_reference}.{}", rendered.extension),
        content_type: Some(content_type),
        storage_key,
    };
    diesel::insert_into(attachments::table)
        .values(&attachment)
        .execute(&mut conn)?;

    info!(
        inspection_id = %inspection.id,
        attachment_id = %attachment.id,
        "certificate attached"
    );
    Ok(())
}
