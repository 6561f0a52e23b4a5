use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::lifecycle::{self, DraftOptions};
use crate::models::{InspectionType, Machine};
use crate::schema::machines;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub machines_due: usize,
    pub inspections_created: usize,
    pub skipped: usize,
}

/// Daily recurring-inspection sweep. Every machine flagged for auto-renewal
/// whose next due date has passed gets exactly one new draft inspection
/// dated today, then its due date advances by the configured interval from
/// the previous due date. Missed cycles are not backfilled.
pub fn run_recurring(conn: &mut PgConnection, today: NaiveDate) -> AppResult<RunSummary> {
    let due: Vec<Machine> = machines::table
        .filter(machines::recurring.eq(true))
        .filter(machines::next_due_date.le(today))
        .order(machines::next_due_date.asc())
        .load(conn)?;

    let mut summary = RunSummary {
        machines_due: due.len(),
        ..RunSummary::default()
    };

    for machine in due {
        let (Some(interval), Some(previous_due)) =
            (machine.recurring_interval(), machine.next_due_date)
        else {
            warn!(
                machine_id = %machine.id,
                "recurring machine without interval or due date; skipped"
            );
            summary.skipped += 1;
            continue;
        };

        let Some(next_due) = lifecycle::advance_due_date(previous_due, interval) else {
            warn!(machine_id = %machine.id, "due date arithmetic overflowed; skipped");
            summary.skipped += 1;
            continue;
        };

        let inspection = lifecycle::create_draft_inspection(
            conn,
            &machine,
            DraftOptions {
                reference: None,
                start_date: today,
                inspection_type: InspectionType::Thorough,
            },
        )?;

        diesel::update(machines::table.find(machine.id))
            .set(machines::next_due_date.eq(next_due))
            .execute(conn)?;

        info!(
            machine_id = %machine.id,
            inspection_id = %inspection.id,
            %previous_due,
            %next_due,
            "recurring inspection created"
        );
        summary.inspections_created += 1;
    }

    Ok(summary)
}
