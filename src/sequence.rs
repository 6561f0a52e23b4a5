use diesel::prelude::*;
use diesel::PgConnection;

use crate::error::AppResult;
use crate::models::Sequence;
use crate::schema::sequences;

/// Hands out the next formatted reference for a sequence code, creating the
/// counter row on first use. Runs inside its own transaction with the row
/// locked, so two concurrent callers never see the same number.
pub fn next_by_code(conn: &mut PgConnection, code: &str) -> AppResult<String> {
    let reference = conn.transaction::<String, diesel::result::Error, _>(|conn| {
        let existing: Option<Sequence> = sequences::table
            .find(code)
            .for_update()
            .first(conn)
            .optional()?;

        let sequence = match existing {
            Some(sequence) => sequence,
            None => {
                let fresh = Sequence {
                    code: code.to_string(),
                    prefix: String::new(),
                    padding: 5,
                    next_number: 1,
                };
                diesel::insert_into(sequences::table)
                    .values(&fresh)
                    .execute(conn)?;
                fresh
            }
        };

        diesel::update(sequences::table.find(code))
            .set(sequences::next_number.eq(sequence.next_number + 1))
            .execute(conn)?;

        Ok(format_reference(
            &sequence.prefix,
            sequence.padding,
            sequence.next_number,
        ))
    })?;

    Ok(reference)
}

fn format_reference(prefix: &str, padding: i32, number: i32) -> String {
    let width = padding.max(0) as usize;
    format!("{prefix}{number:0width$}")
}

#[cfg(test)]
mod tests {
    use super::format_reference;

    #[test]
    fn pads_number_to_width() {
        assert_eq!(format_reference("INSP/", 5, 1), "INSP/00001");
        assert_eq!(format_reference("INSP/", 5, 123), "INSP/00123");
    }

    #[test]
    fn number_wider_than_padding_is_kept() {
        assert_eq!(format_reference("X-", 2, 12345), "X-12345");
    }

    #[test]
    fn zero_padding_means_bare_number() {
        assert_eq!(format_reference("", 0, 7), "7");
    }
}
