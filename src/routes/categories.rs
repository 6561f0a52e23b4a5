use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::checklist;
use crate::error::{AppError, AppResult};
use crate::models::{Category, Disposition, NewCategory, NewQuestion, Question};
use crate::schema::{categories, inspections, machines, questions};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub standard: Option<String>,
    pub color: Option<i32>,
    /// Explicit checklist; when omitted or empty the versioned seed is
    /// instantiated instead.
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Deserialize)]
pub struct QuestionInput {
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub sequence: Option<i32>,
    #[serde(default)]
    pub disposition: Disposition,
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub standard: Option<String>,
    pub color: Option<i32>,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub standard: Option<String>,
    pub color: Option<i32>,
    pub seed_version: Option<i32>,
    pub machine_count: i64,
    pub inspection_count: i64,
    pub question_count: i64,
}

#[derive(Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub section: Option<String>,
    pub serial_no: Option<String>,
    pub name: String,
    pub sequence: i32,
    pub disposition: Disposition,
}

pub(super) fn to_question_response(question: Question) -> QuestionResponse {
    let disposition = question.disposition();
    QuestionResponse {
        id: question.id,
        section: question.section,
        serial_no: question.serial_no,
        name: question.name,
        sequence: question.sequence,
        disposition,
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<CategoryResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let category_list: Vec<Category> = categories::table
        .order(categories::name.asc())
        .load(&mut conn)?;

    let machine_counts: HashMap<Uuid, i64> = machines::table
        .group_by(machines::category_id)
        .select((machines::category_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();
    let inspection_counts: HashMap<Uuid, i64> = inspections::table
        .group_by(inspections::category_id)
        .select((inspections::category_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();
    let question_counts: HashMap<Uuid, i64> = questions::table
        .filter(questions::category_id.is_not_null())
        .group_by(questions::category_id)
        .select((questions::category_id, count_star()))
        .load::<(Option<Uuid>, i64)>(&mut conn)?
        .into_iter()
        .filter_map(|(category_id, count)| category_id.map(|id| (id, count)))
        .collect();

    let response = category_list
        .into_iter()
        .map(|category| CategoryResponse {
            machine_count: *machine_counts.get(&category.id).unwrap_or(&0),
            inspection_count: *inspection_counts.get(&category.id).unwrap_or(&0),
            question_count: *question_counts.get(&category.id).unwrap_or(&0),
            id: category.id,
            name: category.name,
            description: category.description,
            standard: category.standard,
            color: category.color,
            seed_version: category.seed_version,
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryResponse>)> {
    user.require_staff()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let seeded = payload.questions.is_empty();

    let new_category = NewCategory {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        standard: payload.standard,
        color: payload.color,
        seed_version: seeded.then_some(state.seed.version),
    };

    diesel::insert_into(categories::table)
        .values(&new_category)
        .execute(&mut conn)?;

    let question_count = if seeded {
        let seeded_count = checklist::seed_category(&mut conn, new_category.id, &state.seed)?;
        info!(
            category_id = %new_category.id,
            seed_version = state.seed.version,
            questions = seeded_count,
            "category seeded from standard checklist"
        );
        seeded_count
    } else {
        let rows: Vec<NewQuestion> = payload
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, input)| NewQuestion {
                id: Uuid::new_v4(),
                category_id: Some(new_category.id),
                machine_id: None,
                section: input.section,
                serial_no: input.serial_no,
                name: input.name,
                sequence: input.sequence.unwrap_or((index as i32 + 1) * 10),
                disposition: input.disposition.as_str().to_string(),
            })
            .collect();
        diesel::insert_into(questions::table)
            .values(&rows)
            .execute(&mut conn)?
    };

    let category: Category = categories::table.find(new_category.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            id: category.id,
            name: category.name,
            description: category.description,
            standard: category.standard,
            color: category.color,
            seed_version: category.seed_version,
            machine_count: 0,
            inspection_count: 0,
            question_count: question_count as i64,
        }),
    ))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<CategoryResponse>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let category: Category = categories::table.find(category_id).first(&mut conn)?;
    let machine_count: i64 = machines::table
        .filter(machines::category_id.eq(category_id))
        .select(count_star())
        .first(&mut conn)?;
    let inspection_count: i64 = inspections::table
        .filter(inspections::category_id.eq(category_id))
        .select(count_star())
        .first(&mut conn)?;
    let question_count: i64 = questions::table
        .filter(questions::category_id.eq(category_id))
        .select(count_star())
        .first(&mut conn)?;

    Ok(Json(CategoryResponse {
        id: category.id,
        name: category.name,
        description: category.description,
        standard: category.standard,
        color: category.color,
        seed_version: category.seed_version,
        machine_count,
        inspection_count,
        question_count,
    }))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let category: Category = categories::table.find(category_id).first(&mut conn)?;

    let name = match payload.name {
        Some(name) => {
            let trimmed = name.trim().to_string();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            trimmed
        }
        None => category.name,
    };

    diesel::update(categories::table.find(category_id))
        .set((
            categories::name.eq(name),
            categories::description.eq(payload.description.or(category.description)),
            categories::standard.eq(payload.standard.or(category.standard)),
            categories::color.eq(payload.color.or(category.color)),
            categories::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let in_use: i64 = machines::table
        .filter(machines::category_id.eq(category_id))
        .select(count_star())
        .first(&mut conn)?;
    if in_use > 0 {
        return Err(AppError::bad_request(
            "cannot delete category that still has machines",
        ));
    }

    let deleted = diesel::delete(categories::table.find(category_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_questions(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<QuestionResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    categories::table
        .find(category_id)
        .first::<Category>(&mut conn)?;

    let question_list: Vec<Question> = questions::table
        .filter(questions::category_id.eq(category_id))
        .order((questions::sequence.asc(), questions::created_at.asc()))
        .load(&mut conn)?;

    Ok(Json(
        question_list.into_iter().map(to_question_response).collect(),
    ))
}

pub async fn add_question(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<QuestionInput>,
) -> AppResult<(StatusCode, Json<QuestionResponse>)> {
    user.require_staff()?;
    let mut conn = state.db()?;

    categories::table
        .find(category_id)
        .first::<Category>(&mut conn)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let new_question = NewQuestion {
        id: Uuid::new_v4(),
        category_id: Some(category_id),
        machine_id: None,
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
