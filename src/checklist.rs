use std::fs;

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Disposition, Machine, NewInspectionLine, NewQuestion, Question};
use crate::schema::{inspection_lines, questions};

const EMBEDDED_SEED: &str = include_str!("../data/checklist_seed.json");

/// Versioned checklist seed. Categories record the version they were seeded
/// from; editing the seed afterwards has no retroactive effect on them.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCatalog {
    pub version: i32,
    pub items: Vec<SeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
    pub section: String,
    pub serial_no: String,
    pub text: String,
}

impl SeedCatalog {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let raw = match path {
            Some(path) => {
                fs::read_to_string(path).with_context(|| format!("failed to read seed file {path}"))?
            }
            None => EMBEDDED_SEED.to_string(),
        };
        let catalog: SeedCatalog =
            serde_json::from_str(&raw).context("failed to parse checklist seed")?;
        Ok(catalog)
    }
}

/// One-time population of a freshly created category that came without
/// explicit questions. Sort key is the item ordinal times ten, leaving room
/// for manual inserts between seeded rows.
pub fn seed_category(
    conn: &mut PgConnection,
    category_id: Uuid,
    catalog: &SeedCatalog,
) -> AppResult<usize> {
    let rows: Vec<NewQuestion> = catalog
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let ordinal = item
                .serial_no
                .parse::<i32>()
                .unwrap_or(index as i32 + 1);
            NewQuestion {
                id: Uuid::new_v4(),
                category_id: Some(category_id),
                machine_id: None,
                section: Some(item.section.clone()),
                serial_no: Some(item.serial_no.clone()),
                name: item.text.clone(),
                sequence: ordinal * 10,
                disposition: Disposition::Accepted.as_str().to_string(),
            }
        })
        .collect();

    let inserted = diesel::insert_into(questions::table)
        .values(&rows)
        .execute(conn)?;
    Ok(inserted)
}

/// Effective checklist for a machine: the category templates followed by the
/// machine's own custom questions, each list in template order.
pub fn effective_questions(
    conn: &mut PgConnection,
    machine: &Machine,
) -> AppResult<Vec<Question>> {
    let mut all: Vec<Question> = questions::table
        .filter(questions::category_id.eq(machine.category_id))
        .order((questions::sequence.asc(), questions::created_at.asc()))
        .load(conn)?;

    let custom: Vec<Question> = questions::table
        .filter(questions::machine_id.eq(machine.id))
        .order((questions::sequence.asc(), questions::created_at.asc()))
        .load(conn)?;

    all.extend(custom);
    Ok(all)
}

/// Wholesale replacement of an inspection's checklist with fresh copies of
/// the given questions. Lines are decoupled from the templates, so later
/// template edits never touch historical inspections.
pub fn rebuild_lines(
    conn: &mut PgConnection,
    inspection_id: Uuid,
    source: &[Question],
) -> AppResult<usize> {
    diesel::delete(
        inspection_lines::table.filter(inspection_lines::inspection_id.eq(inspection_id)),
    )
    .execute(conn)?;

    if source.is_empty() {
        return Ok(0);
    }

    let rows: Vec<NewInspectionLine> = source
        .iter()
        .map(|question| NewInspectionLine {
            id: Uuid::new_v4(),
            inspection_id,
            section: question.section.clone(),
            serial_no: question.serial_no.clone(),
            name: question.name.clone(),
            disposition: question.disposition.clone(),
        })
        .collect();

    let inserted = diesel::insert_into(inspection_lines::table)
        .values(&rows)
        .execute(conn)?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn embedded_seed_has_24_items_in_6_sections() {
        let catalog = SeedCatalog::load(None).expect("embedded seed must parse");
        assert_eq!(catalog.version, 1);
        assert_eq!(catalog.items.len(), 24);

        let sections: BTreeSet<&str> = catalog
            .items
            .iter()
            .map(|item| item.section.as_str())
            .collect();
        assert_eq!(sections.len(), 6);
    }

    #[test]
    fn embedded_seed_serials_are_ordinal() {
        let catalog = SeedCatalog::load(None).unwrap();
        for (index, item) in catalog.items.iter().enumerate() {
            assert_eq!(item.serial_no.parse::<usize>().unwrap(), index + 1);
        }
    }
}
