use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::{Days, Utc};
use diesel::{dsl::count_star, prelude::*};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{Customer, Inspection, InspectionStatus, Machine};
use crate::schema::{categories, customers, inspections, machines};
use crate::state::AppState;

const EXPIRY_WINDOW_DAYS: u64 = 30;
const TOP_N: usize = 6;
const LIST_LIMIT: i64 = 10;

/// KPI block behind the main inspections dashboard. Recomputed per request,
/// nothing is cached.
pub async fn inspection_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    user.require_staff()?;
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();

    let status_counts: HashMap<String, i64> = inspections::table
        .group_by(inspections::status)
        .select((inspections::status, count_star()))
        .load::<(String, i64)>(&mut conn)?
        .into_iter()
        .collect();
    let passed = *status_counts
        .get(InspectionStatus::Passed.as_str())
        .unwrap_or(&0);
    let failed = *status_counts
        .get(InspectionStatus::Failed.as_str())
        .unwrap_or(&0);
    let pending = *status_counts
        .get(InspectionStatus::Draft.as_str())
        .unwrap_or(&0);

    let total_machines: i64 = machines::table.select(count_star()).first(&mut conn)?;

    let recent: Vec<(Inspection, String)> = inspections::table
        .inner_join(machines::table)
        .select((inspections::all_columns, machines::name))
        .order((inspections::start_date.desc(), inspections::created_at.desc()))
        .limit(LIST_LIMIT)
        .load(&mut conn)?;

    let window_end = today
        .checked_add_days(Days::new(EXPIRY_WINDOW_DAYS))
        .unwrap_or(today);
    let expiring: Vec<(Inspection, String)> = inspections::table
        .inner_join(machines::table)
        .select((inspections::all_columns, machines::name))
        .filter(inspections::status.eq(InspectionStatus::Passed.as_str()))
        .filter(inspections::expire_date.ge(today))
        .filter(inspections::expire_date.le(window_end))
        .order(inspections::expire_date.asc())
        .limit(LIST_LIMIT)
        .load(&mut conn)?;

    let mut inspector_counts: Vec<(String, i64)> = inspections::table
        .filter(inspections::inspector_name.is_not_null())
        .group_by(inspections::inspector_name)
        .select((inspections::inspector_name, count_star()))
        .load::<(Option<String>, i64)>(&mut conn)?
        .into_iter()
        .filter_map(|(name, count)| name.map(|name| (name, count)))
        .collect();
    inspector_counts.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(Json(json!({
        "kpi": {
            "total_insp": passed + failed + pending,
            "passed": passed,
            "failed": failed,
            "total_machines": total_machines,
        },
        "lists": {
            "recent": recent
                .into_iter()
                .map(|(inspection, machine)| json!({
                    "id": inspection.id,
                    "reference": inspection.reference,
                    "machine": machine,
                    "status": inspection.status(),
                    "start_date": inspection.start_date,
                }))
                .collect::<Vec<_>>(),
            "expiring": expiring
                .into_iter()
                .map(|(inspection, machine)| json!({
                    "id": inspection.id,
                    "reference": inspection.reference,
                    "machine": machine,
                    "expire_date": inspection.expire_date,
                }))
                .collect::<Vec<_>>(),
        },
        "inspectors": inspector_counts
            .into_iter()
            .map(|(name, count)| json!({ "name": name, "count": count }))
            .collect::<Vec<_>>(),
        "charts": { "status": [passed, failed, pending] },
    })))
}

/// Fleet dashboard: compliance plus manufacturer and category breakdowns.
/// A machine is compliant while it holds a passed, unexpired inspection.
pub async fn machine_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    user.require_staff()?;
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();

    let machine_list: Vec<Machine> = machines::table.load(&mut conn)?;
    let total = machine_list.len() as i64;

    let compliant_ids: Vec<Uuid> = inspections::table
        .filter(inspections::status.eq(InspectionStatus::Passed.as_str()))
        .filter(inspections::expire_date.ge(today))
        .select(inspections::machine_id)
        .distinct()
        .load(&mut conn)?;
    let compliant_set: std::collections::HashSet<Uuid> = compliant_ids.into_iter().collect();
    let compliant = machine_list
        .iter()
        .filter(|machine| compliant_set.contains(&machine.id))
        .count() as i64;

    let customer_names: HashMap<Uuid, String> = customers::table
        .select((customers::id, customers::name))
        .load::<(Uuid, String)>(&mut conn)?
        .into_iter()
        .collect();

    let non_compliant_list: Vec<Value> = machine_list
        .iter()
        .filter(|machine| !compliant_set.contains(&machine.id))
        .take(LIST_LIMIT as usize)
        .map(|machine| {
            json!({
                "id": machine.id,
                "name": machine.name,
                "customer": customer_names.get(&machine.customer_id),
            })
        })
        .collect();

    let mut manufacturer_counts: HashMap<String, i64> = HashMap::new();
    for machine in &machine_list {
        if let Some(manufacturer) = machine
            .manufacturer
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
        {
            *manufacturer_counts.entry(manufacturer.to_string()).or_insert(0) += 1;
        }
    }
    let manufacturers = manufacturer_counts.len() as i64;
    let manufacturer_top = top_n(manufacturer_counts, TOP_N);

    let category_counts: Vec<(String, i64)> = machines::table
        .inner_join(categories::table)
        .group_by(categories::name)
        .select((categories::name, count_star()))
        .load(&mut conn)?;
    let category_top = top_n(category_counts.into_iter().collect(), TOP_N);

    Ok(Json(json!({
        "kpi": {
            "total": total,
            "compliant": compliant,
            "non_compliant": total - compliant,
            "manufacturers": manufacturers,
        },
        "lists": { "non_compliant": non_compliant_list },
        "charts": {
            "manufacturer": {
                "labels": manufacturer_top.iter().map(|(label, _)| label.clone()).collect::<Vec<_>>(),
                "data": manufacturer_top.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
            },
            "category": {
                "labels": category_top.iter().map(|(label, _)| label.clone()).collect::<Vec<_>>(),
                "data": category_top.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
            },
        },
    })))
}

/// Customer dashboard: fleet sizes and a watchlist of customers carrying
/// failed or expired inspections.
pub async fn customer_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    user.require_staff()?;
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();

    let fleet_counts: Vec<(Uuid, i64)> = machines::table
        .group_by(machines::customer_id)
        .select((machines::customer_id, count_star()))
        .load(&mut conn)?;
    let active_clients = fleet_counts.len() as i64;

    let customer_list: Vec<Customer> = customers::table.load(&mut conn)?;
    let names: HashMap<Uuid, String> = customer_list
        .iter()
        .map(|customer| (customer.id, customer.name.clone()))
        .collect();

    let mut fleets: Vec<(Uuid, i64)> = fleet_counts;
    fleets.sort_by(|a, b| b.1.cmp(&a.1));

    let largest_fleet = fleets.first().map(|(customer_id, count)| {
        json!({
            "id": customer_id,
            "name": names.get(customer_id),
            "count": count,
        })
    });

    let failed_counts: HashMap<Uuid, i64> = inspections::table
        .filter(inspections::status.eq(InspectionStatus::Failed.as_str()))
        .group_by(inspections::customer_id)
        .select((inspections::customer_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();
    let expired_counts: HashMap<Uuid, i64> = inspections::table
        .filter(inspections::status.eq(InspectionStatus::Passed.as_str()))
        .filter(inspections::expire_date.lt(today))
        .group_by(inspections::customer_id)
        .select((inspections::customer_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let mut watchlist: Vec<(Uuid, i64, i64)> = failed_counts
        .keys()
        .chain(expired_counts.keys())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .map(|customer_id| {
            (
                *customer_id,
                *failed_counts.get(customer_id).unwrap_or(&0),
                *expired_counts.get(customer_id).unwrap_or(&0),
            )
        })
        .collect();
    watchlist.sort_by(|a, b| (b.1 + b.2).cmp(&(a.1 + a.2)));
    watchlist.truncate(LIST_LIMIT as usize);

    let market_share: Vec<(String, i64)> = fleets
        .iter()
        .take(TOP_N)
        .map(|(customer_id, count)| {
            (
                names
                    .get(customer_id)
                    .cloned()
                    .unwrap_or_else(|| customer_id.to_string()),
                *count,
            )
        })
        .collect();

    Ok(Json(json!({
        "kpi": {
            "active_clients": active_clients,
            "largest_fleet": largest_fleet,
        },
        "lists": {
            "risk_watchlist": watchlist
                .into_iter()
                .map(|(customer_id, failed, expired)| json!({
                    "id": customer_id,
                    "name": names.get(&customer_id),
                    "failed_count": failed,
                    "expired_count": expired,
                }))
                .collect::<Vec<_>>(),
        },
        "charts": {
            "market_share": {
                "labels": market_share.iter().map(|(label, _)| label.clone()).collect::<Vec<_>>(),
                "data": market_share.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
            },
        },
    })))
}

fn top_n(counts: HashMap<String, i64>, n: usize) -> Vec<(String, i64)> {
    let mut entries: Vec<(String, i64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::top_n;
    use std::collections::HashMap;

    #[test]
    fn top_n_orders_by_descending_count() {
        let mut counts = HashMap::new();
        counts.insert("Toyota".to_string(), 3);
        counts.insert("Caterpillar".to_string(), 7);
        counts.insert("JLG".to_string(), 5);

        let top = top_n(counts, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ("Caterpillar".to_string(), 7));
        assert_eq!(top[1], ("JLG".to_string(), 5));
    }
}
