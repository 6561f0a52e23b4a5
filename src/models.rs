use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

pub const ROLE_STAFF: &str = "staff";
pub const ROLE_CUSTOMER: &str = "customer";

pub const ATTACHMENT_CERTIFICATE: &str = "certificate";
pub const ATTACHMENT_MAINTENANCE_LOG: &str = "maintenance_log";

pub const SEQUENCE_INSPECTION: &str = "inspection";

/// Checklist answer for a question template or inspection line. A single
/// tagged value, so "accepted and rejected at once" cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    Rejected,
    NotApplicable,
    #[default]
    Unset,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Accepted => "accepted",
            Disposition::Rejected => "rejected",
            Disposition::NotApplicable => "not_applicable",
            Disposition::Unset => "unset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Disposition::Accepted),
            "rejected" => Some(Disposition::Rejected),
            "not_applicable" => Some(Disposition::NotApplicable),
            "unset" => Some(Disposition::Unset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    #[default]
    Draft,
    Passed,
    Failed,
}

impl InspectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InspectionStatus::Draft => "draft",
            InspectionStatus::Passed => "passed",
            InspectionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(InspectionStatus::Draft),
            "passed" => Some(InspectionStatus::Passed),
            "failed" => Some(InspectionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionType {
    #[default]
    Thorough,
    Visual,
    #[serde(rename = "6_month")]
    SixMonth,
    #[serde(rename = "12_month")]
    TwelveMonth,
    Initial,
}

impl InspectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            InspectionType::Thorough => "thorough",
            InspectionType::Visual => "visual",
            InspectionType::SixMonth => "6_month",
            InspectionType::TwelveMonth => "12_month",
            InspectionType::Initial => "initial",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "thorough" => Some(InspectionType::Thorough),
            "visual" => Some(InspectionType::Visual),
            "6_month" => Some(InspectionType::SixMonth),
            "12_month" => Some(InspectionType::TwelveMonth),
            "initial" => Some(InspectionType::Initial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurringInterval {
    #[serde(rename = "1_month")]
    OneMonth,
    #[serde(rename = "3_month")]
    ThreeMonths,
    #[serde(rename = "6_month")]
    SixMonths,
    #[serde(rename = "12_month")]
    TwelveMonths,
}

impl RecurringInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurringInterval::OneMonth => "1_month",
            RecurringInterval::ThreeMonths => "3_month",
            RecurringInterval::SixMonths => "6_month",
            RecurringInterval::TwelveMonths => "12_month",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1_month" => Some(RecurringInterval::OneMonth),
            "3_month" => Some(RecurringInterval::ThreeMonths),
            "6_month" => Some(RecurringInterval::SixMonths),
            "12_month" => Some(RecurringInterval::TwelveMonths),
            _ => None,
        }
    }

    pub fn months(self) -> u32 {
        match self {
            RecurringInterval::OneMonth => 1,
            RecurringInterval::ThreeMonths => 3,
            RecurringInterval::SixMonths => 6,
            RecurringInterval::TwelveMonths => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Unpaid => "unpaid",
        }
    }

    /// Three-way mapping from an invoice's raw payment state. No linked
    /// invoice counts as unpaid.
    pub fn from_invoice_state(state: Option<&str>) -> Self {
        match state {
            Some("paid") | Some("in_payment") => PaymentStatus::Paid,
            Some("partial") => PaymentStatus::Partial,
            _ => PaymentStatus::Unpaid,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub customer_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub standard: Option<String>,
    pub color: Option<i32>,
    pub seed_version: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub standard: Option<String>,
    pub color: Option<i32>,
    pub seed_version: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = questions)]
#[diesel(belongs_to(Category))]
#[diesel(belongs_to(Machine))]
pub struct Question {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub sequence: i32,
    pub disposition: String,
    pub created_at: NaiveDateTime,
}

impl Question {
    pub fn disposition(&self) -> Disposition {
        Disposition::parse(&self.disposition).unwrap_or_default()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = questions)]
pub struct NewQuestion {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub sequence: i32,
    pub disposition: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = machines)]
#[diesel(belongs_to(Customer))]
#[diesel(belongs_to(Category))]
pub struct Machine {
    pub id: Uuid,
    pub name: String,
    pub serial_number: Option<String>,
    pub model_no: Option<String>,
    pub swl: Option<String>,
    pub build_year: Option<String>,
    pub manufacturer: Option<String>,
    pub owner_id_no: Option<String>,
    pub gps_coordinates: Option<String>,
    pub customer_id: Uuid,
    pub category_id: Uuid,
    pub recurring: bool,
    pub recurring_interval: Option<String>,
    pub next_due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Machine {
    pub fn recurring_interval(&self) -> Option<RecurringInterval> {
        self.recurring_interval
            .as_deref()
            .and_then(RecurringInterval::parse)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = machines)]
pub struct NewMachine {
    pub id: Uuid,
    pub name: String,
    pub serial_number: Option<String>,
    pub model_no: Option<String>,
    pub swl: Option<String>,
    pub build_year: Option<String>,
    pub manufacturer: Option<String>,
    pub owner_id_no: Option<String>,
    pub gps_coordinates: Option<String>,
    pub customer_id: Uuid,
    pub category_id: Uuid,
    pub recurring: bool,
    pub recurring_interval: Option<String>,
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = inspections)]
#[diesel(belongs_to(Customer))]
#[diesel(belongs_to(Machine))]
#[diesel(belongs_to(Category))]
pub struct Inspection {
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub machine_id: Uuid,
    pub category_id: Uuid,
    pub inspection_type: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub expire_date: Option<NaiveDate>,
    pub last_inspection_date: Option<NaiveDate>,
    pub inspector_name: Option<String>,
    pub inspector_signature: Option<String>,
    pub location_site: Option<String>,
    pub doc_report: bool,
    pub doc_maintenance: bool,
    pub doc_load_chart: bool,
    pub customer_signature: Option<String>,
    pub signed_by: Option<String>,
    pub signed_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Inspection {
    pub fn status(&self) -> InspectionStatus {
        InspectionStatus::parse(&self.status).unwrap_or_default()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = inspections)]
pub struct NewInspection {
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub machine_id: Uuid,
    pub category_id: Uuid,
    pub inspection_type: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub expire_date: Option<NaiveDate>,
    pub last_inspection_date: Option<NaiveDate>,
    pub location_site: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = inspection_lines)]
#[diesel(belongs_to(Inspection))]
pub struct InspectionLine {
    pub id: Uuid,
    pub inspection_id: Uuid,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub disposition: String,
    pub comment: Option<String>,
    pub recommendation: Option<String>,
    pub created_at: NaiveDateTime,
}

impl InspectionLine {
    pub fn disposition(&self) -> Disposition {
        Disposition::parse(&self.disposition).unwrap_or_default()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = inspection_lines)]
pub struct NewInspectionLine {
    pub id: Uuid,
    pub inspection_id: Uuid,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub disposition: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = line_images)]
#[diesel(belongs_to(InspectionLine, foreign_key = line_id))]
pub struct LineImage {
    pub id: Uuid,
    pub line_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = line_images)]
pub struct NewLineImage {
    pub id: Uuid,
    pub line_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub storage_key: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = attachments)]
pub struct Attachment {
    pub id: Uuid,
    pub inspection_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub kind: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub id: Uuid,
    pub inspection_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub kind: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub storage_key: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = inspection_notes)]
#[diesel(belongs_to(Inspection))]
pub struct InspectionNote {
    pub id: Uuid,
    pub inspection_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = inspection_notes)]
pub struct NewInspectionNote {
    pub id: Uuid,
    pub inspection_id: Uuid,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = invoices)]
pub struct Invoice {
    pub id: Uuid,
    pub reference: String,
    pub payment_state: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoice {
    pub id: Uuid,
    pub reference: String,
    pub payment_state: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Customer))]
#[diesel(belongs_to(Invoice))]
pub struct Document {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub invoice_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = sequences)]
#[diesel(primary_key(code))]
pub struct Sequence {
    pub code: String,
    pub prefix: String,
    pub padding: i32,
    pub next_number: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_round_trips_through_text() {
        for disposition in [
            Disposition::Accepted,
            Disposition::Rejected,
            Disposition::NotApplicable,
            Disposition::Unset,
        ] {
            assert_eq!(Disposition::parse(disposition.as_str()), Some(disposition));
        }
        assert_eq!(Disposition::parse("bogus"), None);
    }

    #[test]
    fn payment_status_mirrors_invoice_state() {
        assert_eq!(
            PaymentStatus::from_invoice_state(Some("paid")),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::from_invoice_state(Some("in_payment")),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::from_invoice_state(Some("partial")),
            PaymentStatus::Partial
        );
        assert_eq!(
            PaymentStatus::from_invoice_state(Some("not_paid")),
            PaymentStatus::Unpaid
        );
        assert_eq!(PaymentStatus::from_invoice_state(None), PaymentStatus::Unpaid);
    }

    #[test]
    fn recurring_interval_months() {
        assert_eq!(RecurringInterval::OneMonth.months(), 1);
        assert_eq!(RecurringInterval::ThreeMonths.months(), 3);
        assert_eq!(RecurringInterval::SixMonths.months(), 6);
        assert_eq!(RecurringInterval::TwelveMonths.months(), 12);
        assert_eq!(
            RecurringInterval::parse("3_month"),
            Some(RecurringInterval::ThreeMonths)
        );
    }
}
