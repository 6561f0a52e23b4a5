use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    Category, Customer, Machine, NewMachine, NewQuestion, Question, RecurringInterval,
};
use crate::qr;
use crate::schema::{categories, customers, inspections, machines, questions};
use crate::state::AppState;

use super::categories::{to_question_response, QuestionInput, QuestionResponse};
use super::inspections::{to_inspection_response, InspectionResponse};

#[derive(Deserialize)]
pub struct CreateMachineRequest {
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
    #[serde(default)]
    pub recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdateMachineRequest {
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub model_no: Option<String>,
    pub swl: Option<String>,
    pub build_year: Option<String>,
    pub manufacturer: Option<String>,
    pub owner_id_no: Option<String>,
    #[serde(default)]
    pub gps_coordinates: Option<Option<String>>,
    pub customer_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub recurring: Option<bool>,
    #[serde(default)]
    pub recurring_interval: Option<Option<RecurringInterval>>,
    #[serde(default)]
    pub next_due_date: Option<Option<NaiveDate>>,
}

#[derive(Serialize)]
pub struct MachineResponse {
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
    pub recurring_interval: Option<RecurringInterval>,
    pub next_due_date: Option<NaiveDate>,
    pub inspection_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

pub(super) fn to_machine_response(
    state: &AppState,
    machine: Machine,
    inspection_count: i64,
) -> MachineResponse {
    let public_url = state
        .public_base_url()
        .map(|base| qr::machine_url(base, machine.id));
    MachineResponse {
        id: machine.id,
        recurring_interval: machine.recurring_interval(),
        name: machine.name,
        serial_number: machine.serial_number,
        model_no: machine.model_no,
        swl: machine.swl,
        build_year: machine.build_year,
        manufacturer: machine.manufacturer,
        owner_id_no: machine.owner_id_no,
        gps_coordinates: machine.gps_coordinates,
        customer_id: machine.customer_id,
        category_id: machine.category_id,
        recurring: machine.recurring,
        next_due_date: machine.next_due_date,
        inspection_count,
        public_url,
    }
}

/// GPS links must point at a maps service; anything without "google" or
/// "goo.gl" in it is rejected.
pub(crate) fn is_map_link(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered.contains("google") || lowered.contains("goo.gl")
}

fn validate_gps(value: Option<&str>) -> AppResult<()> {
    if let Some(value) = value {
        if !value.trim().is_empty() && !is_map_link(value) {
            return Err(AppError::validation(
                "gps_coordinates must be a Google Maps link",
            ));
        }
    }
    Ok(())
}

pub async fn list_machines(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<MachineResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let machine_list: Vec<Machine> = machines::table
        .order(machines::name.asc())
        .load(&mut conn)?;

    let counts: HashMap<Uuid, i64> = inspections::table
        .group_by(inspections::machine_id)
        .select((inspections::machine_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let response = machine_list
        .into_iter()
        .map(|machine| {
            let count = *counts.get(&machine.id).unwrap_or(&0);
            to_machine_response(&state, machine, count)
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_machine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateMachineRequest>,
) -> AppResult<(StatusCode, Json<MachineResponse>)> {
    user.require_staff()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    validate_gps(payload.gps_coordinates.as_deref())?;

    let mut conn = state.db()?;
    customers::table
        .find(payload.customer_id)
        .first::<Customer>(&mut conn)?;
    categories::table
        .find(payload.category_id)
        .first::<Category>(&mut conn)?;

    let new_machine = NewMachine {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        serial_number: payload.serial_number,
        model_no: payload.model_no,
        swl: payload.swl,
        build_year: payload.build_year,
        manufacturer: payload.manufacturer,
        owner_id_no: payload.owner_id_no,
        gps_coordinates: payload.gps_coordinates,
        customer_id: payload.customer_id,
        category_id: payload.category_id,
        recurring: payload.recurring,
        recurring_interval: payload.recurring_interval.map(|i| i.as_str().to_string()),
        next_due_date: payload.next_due_date,
    };

    diesel::insert_into(machines::table)
        .values(&new_machine)
        .execute(&mut conn)?;

    let machine: Machine = machines::table.find(new_machine.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(to_machine_response(&state, machine, 0)),
    ))
}

pub async fn get_machine(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<MachineResponse>> {
    let mut conn = state.db()?;
    let machine: Machine = machines::table.find(machine_id).first(&mut conn)?;

    if !user.can_access_customer(machine.customer_id) {
        return Err(AppError::forbidden());
    }

    let count: i64 = inspections::table
        .filter(inspections::machine_id.eq(machine_id))
        .select(count_star())
        .first(&mut conn)?;

    Ok(Json(to_machine_response(&state, machine, count)))
}

pub async fn update_machine(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateMachineRequest>,
) -> AppResult<Json<MachineResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let machine: Machine = machines::table.find(machine_id).first(&mut conn)?;

    let gps_coordinates = match payload.gps_coordinates {
        Some(value) => {
            validate_gps(value.as_deref())?;
            value
        }
        None => machine.gps_coordinates.clone(),
    };

    if let Some(customer_id) = payload.customer_id {
        customers::table
            .find(customer_id)
            .first::<Customer>(&mut conn)?;
    }
    if let Some(category_id) = payload.category_id {
        categories::table
            .find(category_id)
            .first::<Category>(&mut conn)?;
    }

    let name = match payload.name {
        Some(name) => {
            let trimmed = name.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            trimmed
        }
        None => machine.name.clone(),
    };

    let recurring_interval = match payload.recurring_interval {
        Some(value) => value.map(|i| i.as_str().to_string()),
        None => machine.recurring_interval.clone(),
    };
    let next_due_date = match payload.next_due_date {
        Some(value) => value,
        None => machine.next_due_date,
    };

    diesel::update(machines::table.find(machine_id))
        .set((
            machines::name.eq(name),
            machines::serial_number.eq(payload.serial_number.or(machine.serial_number)),
            machines::model_no.eq(payload.model_no.or(machine.model_no)),
            machines::swl.eq(payload.swl.or(machine.swl)),
            machines::build_year.eq(payload.build_year.or(machine.build_year)),
            machines::manufacturer.eq(payload.manufacturer.or(machine.manufacturer)),
            machines::owner_id_no.eq(payload.owner_id_no.or(machine.owner_id_no)),
            machines::gps_coordinates.eq(gps_coordinates),
            machines::customer_id.eq(payload.customer_id.unwrap_or(machine.customer_id)),
            machines::category_id.eq(payload.category_id.unwrap_or(machine.category_id)),
            machines::recurring.eq(payload.recurring.unwrap_or(machine.recurring)),
            machines::recurring_interval.eq(recurring_interval),
            machines::next_due_date.eq(next_due_date),
            machines::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: Machine = machines::table.find(machine_id).first(&mut conn)?;
    let count: i64 = inspections::table
        .filter(inspections::machine_id.eq(machine_id))
        .select(count_star())
        .first(&mut conn)?;

    Ok(Json(to_machine_response(&state, updated, count)))
}

pub async fn delete_machine(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let in_use: i64 = inspections::table
        .filter(inspections::machine_id.eq(machine_id))
        .select(count_star())
        .first(&mut conn)?;
    if in_use > 0 {
        return Err(AppError::bad_request(
            "cannot delete machine that still has inspections",
        ));
    }

    let deleted = diesel::delete(machines::table.find(machine_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_custom_questions(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<QuestionResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    machines::table.find(machine_id).first::<Machine>(&mut conn)?;

    let question_list: Vec<Question> = questions::table
        .filter(questions::machine_id.eq(machine_id))
        .order((questions::sequence.asc(), questions::created_at.asc()))
        .load(&mut conn)?;

    Ok(Json(
        question_list.into_iter().map(to_question_response).collect(),
    ))
}

pub async fn add_custom_question(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<QuestionInput>,
) -> AppResult<(StatusCode, Json<QuestionResponse>)> {
    user.require_staff()?;
    let mut conn = state.db()?;

    machines::table.find(machine_id).first::<Machine>(&mut conn)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let new_question = NewQuestion {
        id: Uuid::new_v4(),
        category_id: None,
        machine_id: Some(machine_id),
        section: payload.section,
        serial_no: payload.serial_no,
        name: payload.name.trim().to_string(),
        sequence: payload.sequence.unwrap_or(0),
        disposition: payload.disposition.as_str().to_string(),
    };

    diesel::insert_into(questions::table)
        .values(&new_question)
        .execute(&mut conn)?;

    let question: Question = questions::table.find(new_question.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(to_question_response(question))))
}

pub async fn list_inspections(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<InspectionResponse>>> {
    let mut conn = state.db()?;
    let machine: Machine = machines::table.find(machine_id).first(&mut conn)?;

    if !user.can_access_customer(machine.customer_id) {
        return Err(AppError::forbidden());
    }

    let inspection_list = inspections::table
        .filter(inspections::machine_id.eq(machine_id))
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .load(&mut conn)?;

    Ok(Json(
        inspection_list
            .into_iter()
            .map(|inspection| to_inspection_response(&state, inspection))
            .collect(),
    ))
}
