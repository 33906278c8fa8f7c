use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Utc};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};
use uuid::Uuid;

use duo_types::models::Couple;
use duo_types::validation::CODE_LENGTH;

use crate::rows::{date_at, timestamp, timestamp_at, uuid_at};
use crate::{Database, StoreError};

/// No 0/O or 1/I, so codes survive being read aloud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CODE_ATTEMPTS: usize = 32;

const COUPLE_SELECT: &str = "SELECT id, couple_code, partner1_name, partner2_name, anniversary_date,
        theme_color, created_at, updated_at FROM couples";

impl Database {
    /// Pick a join code no existing couple uses.
    pub fn generate_couple_code(&self) -> Result<String> {
        self.with_conn(|conn| {
            let mut rng = rand::rng();
            for _ in 0..CODE_ATTEMPTS {
                let code: String = (0..CODE_LENGTH)
                    .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                    .collect();
                if !code_in_use(conn, &code)? {
                    return Ok(code);
                }
                debug!("Join code collision on {}, retrying", code);
            }
            Err(anyhow!("no free join code after {} attempts", CODE_ATTEMPTS))
        })
    }

    pub fn insert_couple(
        &self,
        code: &str,
        partner1_name: &str,
        anniversary_date: NaiveDate,
    ) -> std::result::Result<Couple, StoreError> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());

        self.with_conn(|conn| {
            if code_in_use(conn, code)? {
                return Ok(None);
            }
            conn.execute(
                "INSERT INTO couples
                    (id, couple_code, partner1_name, anniversary_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id.to_string(), code, partner1_name, anniversary_date.to_string(), now],
            )?;
            query_couple_by_id(conn, id)
        })?
        .ok_or(StoreError::CodeTaken)
    }

    pub fn get_couple(&self, id: Uuid) -> Result<Option<Couple>> {
        self.with_conn(|conn| query_couple_by_id(conn, id))
    }

    pub fn get_couple_by_code(&self, code: &str) -> Result<Option<Couple>> {
        self.with_conn(|conn| {
            let sql = format!("{COUPLE_SELECT} WHERE couple_code = ?1");
            Ok(conn.query_row(&sql, [code], couple_from_row).optional()?)
        })
    }

    /// Both halves of the persisted identity must match the same row.
    pub fn get_couple_by_id_and_code(&self, id: Uuid, code: &str) -> Result<Option<Couple>> {
        self.with_conn(|conn| {
            let sql = format!("{COUPLE_SELECT} WHERE id = ?1 AND couple_code = ?2");
            Ok(conn
                .query_row(&sql, params![id.to_string(), code], couple_from_row)
                .optional()?)
        })
    }

    /// Fill the second partner's name if, and only if, it is still empty.
    /// Returns the couple as it stands afterwards, or `None` if it doesn't exist.
    pub fn claim_partner_slot(&self, id: Uuid, partner_name: &str) -> Result<Option<Couple>> {
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            let claimed = conn.execute(
                "UPDATE couples SET partner2_name = ?2, updated_at = ?3
                 WHERE id = ?1 AND (partner2_name IS NULL OR partner2_name = '')",
                params![id.to_string(), partner_name, now],
            )?;
            if claimed == 0 {
                debug!("Partner slot of couple {} already taken or missing", id);
            }
            query_couple_by_id(conn, id)
        })
    }

    pub fn couple_exists(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM couples WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn code_in_use(conn: &Connection, code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM couples WHERE couple_code = ?1", [code], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn query_couple_by_id(conn: &Connection, id: Uuid) -> Result<Option<Couple>> {
    let sql = format!("{COUPLE_SELECT} WHERE id = ?1");
    let couple = conn
        .query_row(&sql, [id.to_string()], couple_from_row)
        .optional()?;
    if couple.is_none() {
        warn!("Couple {} not found", id);
    }
    Ok(couple)
}

fn couple_from_row(row: &Row<'_>) -> rusqlite::Result<Couple> {
    Ok(Couple {
        id: uuid_at(row, 0)?,
        couple_code: row.get(1)?,
        partner1_name: row.get(2)?,
        partner2_name: row.get(3)?,
        anniversary_date: date_at(row, 4)?,
        theme_color: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anniversary() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 13).unwrap()
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..20 {
            let code = db.generate_couple_code().unwrap();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn duplicate_codes_are_refused() {
        let db = Database::open_in_memory().unwrap();
        db.insert_couple("QWE234", "Ana", anniversary()).unwrap();
        let err = db.insert_couple("QWE234", "Bea", anniversary()).unwrap_err();
        assert!(matches!(err, StoreError::CodeTaken));
    }

    #[test]
    fn lookup_needs_matching_id_and_code() {
        let db = Database::open_in_memory().unwrap();
        let couple = db.insert_couple("QWE234", "Ana", anniversary()).unwrap();

        assert_eq!(db.get_couple_by_code("QWE234").unwrap().unwrap().id, couple.id);
        assert!(db.get_couple_by_id_and_code(couple.id, "QWE234").unwrap().is_some());
        assert!(db.get_couple_by_id_and_code(couple.id, "ZZZ999").unwrap().is_none());
        assert!(db.get_couple_by_id_and_code(Uuid::new_v4(), "QWE234").unwrap().is_none());
    }

    #[test]
    fn partner_slot_is_claimed_once() {
        let db = Database::open_in_memory().unwrap();
        let couple = db.insert_couple("QWE234", "Ana", anniversary()).unwrap();
        assert_eq!(couple.partner2_name, None);

        let first = db.claim_partner_slot(couple.id, "Bea").unwrap().unwrap();
        assert_eq!(first.partner2_name.as_deref(), Some("Bea"));

        let second = db.claim_partner_slot(couple.id, "Cleo").unwrap().unwrap();
        assert_eq!(second.partner2_name.as_deref(), Some("Bea"));

        assert!(db.claim_partner_slot(Uuid::new_v4(), "Dee").unwrap().is_none());
    }
}
