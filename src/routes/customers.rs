use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Customer, NewCustomer};
use crate::schema::{customers, inspections, machines};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub city: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub email: Option<String>,
    pub machine_count: i64,
    pub inspection_count: i64,
    pub category_count: i64,
    pub created_at: String,
}

pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<CustomerResponse>>> {
    user.require_staff()?;
    let mut conn = state.db()?;

    let customer_list: Vec<Customer> = customers::table
        .order(customers::name.asc())
        .load(&mut conn)?;

    let machine_counts: HashMap<Uuid, i64> = machines::table
        .group_by(machines::customer_id)
        .select((machines::customer_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let inspection_counts: HashMap<Uuid, i64> = inspections::table
        .group_by(inspections::customer_id)
        .select((inspections::customer_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let category_links: Vec<(Uuid, Uuid)> = machines::table
        .select((machines::customer_id, machines::category_id))
        .load(&mut conn)?;
    let mut category_sets: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for (customer_id, category_id) in category_links {
        category_sets.entry(customer_id).or_default().insert(category_id);
    }

    let response = customer_list
        .into_iter()
        .map(|customer| {
            let category_count = category_sets
                .get(&customer.id)
                .map(|set| set.len() as i64)
                .unwrap_or(0);
            to_customer_response(
                &customer,
                *machine_counts.get(&customer.id).unwrap_or(&0),
                *inspection_counts.get(&customer.id).unwrap_or(&0),
                category_count,
            )
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<CustomerResponse>> {
    if !user.can_access_customer(customer_id) {
        return Err(AppError::forbidden());
    }

    let mut conn = state.db()?;
    let customer: Customer = customers::table.find(customer_id).first(&mut conn)?;

    let machine_count: i64 = machines::table
        .filter(machines::customer_id.eq(customer_id))
        .select(count_star())
        .first(&mut conn)?;
    let inspection_count: i64 = inspections::table
        .filter(inspections::customer_id.eq(customer_id))
        .select(count_star())
        .first(&mut conn)?;
    let category_ids: Vec<Uuid> = machines::table
        .filter(machines::customer_id.eq(customer_id))
        .select(machines::category_id)
        .distinct()
        .load(&mut conn)?;

    Ok(Json(to_customer_response(
        &customer,
        machine_count,
        inspection_count,
        category_ids.len() as i64,
    )))
}

pub async fn create_customer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> AppResult<(StatusCode, Json<CustomerResponse>)> {
    user.require_staff()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let new_customer = NewCustomer {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        city: payload.city,
        email: payload.email,
    };

    diesel::insert_into(customers::table)
        .values(&new_customer)
        .execute(&mut conn)?;

    let customer: Customer = customers::table.find(new_customer.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(to_customer_response(&customer, 0, 0, 0)),
    ))
}

fn to_customer_response(
    customer: &Customer,
    machine_count: i64,
    inspection_count: i64,
    category_count: i64,
) -> CustomerResponse {
    CustomerResponse {
        id: customer.id,
        name: customer.name.clone(),
        city: customer.city.clone(),
        email: customer.email.clone(),
        machine_count,
        inspection_count,
        category_count,
        created_at: super::inspections::to_iso(customer.created_at),
    }
}
