// 💾 SQLite storage - schema, upserts, cascade truncation
// Upsert-by-primary-key keeps bulk loading idempotent.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::model::{Borough, CriticalFlag, Inspection, Restaurant, Violation};

/// Open (or create) the database and apply the session pragmas.
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    // WAL for crash recovery; foreign keys must be enabled per-connection
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS restaurants (
            camis TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            boro TEXT NOT NULL,
            building TEXT NOT NULL,
            street TEXT NOT NULL,
            zipcode TEXT,
            phone TEXT,
            cuisine TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS inspections (
            id INTEGER PRIMARY KEY,
            restraunt_camis TEXT NOT NULL
                REFERENCES restaurants(camis) ON DELETE CASCADE,
            inspection_date TEXT NOT NULL,
            inspection_type TEXT NOT NULL,
            action TEXT NOT NULL,
            score INTEGER,
            grade TEXT,
            grade_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS violations (
            id INTEGER PRIMARY KEY,
            inspection_id INTEGER NOT NULL
                REFERENCES inspections(id) ON DELETE CASCADE,
            code TEXT,
            description TEXT,
            critical_flag TEXT NOT NULL DEFAULT 'Not Applicable'
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inspections_camis ON inspections(restraunt_camis)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inspections_date ON inspections(inspection_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_violations_inspection ON violations(inspection_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// UPSERTS (full overwrite by primary key, not a merge)
// ============================================================================

pub fn upsert_restaurant(conn: &Connection, r: &Restaurant) -> Result<()> {
    conn.execute(
        "INSERT INTO restaurants (camis, name, boro, building, street, zipcode, phone, cuisine)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(camis) DO UPDATE SET
             name = excluded.name,
             boro = excluded.boro,
             building = excluded.building,
             street = excluded.street,
             zipcode = excluded.zipcode,
             phone = excluded.phone,
             cuisine = excluded.cuisine",
        params![
            r.camis,
            r.name,
            r.boro.as_str(),
            r.building,
            r.street,
            r.zipcode,
            r.phone,
            r.cuisine,
        ],
    )?;
    Ok(())
}

pub fn upsert_inspection(conn: &Connection, i: &Inspection) -> Result<()> {
    conn.execute(
        "INSERT INTO inspections (id, restraunt_camis, inspection_date, inspection_type,
                                  action, score, grade, grade_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             restraunt_camis = excluded.restraunt_camis,
             inspection_date = excluded.inspection_date,
             inspection_type = excluded.inspection_type,
             action = excluded.action,
             score = excluded.score,
             grade = excluded.grade,
             grade_date = excluded.grade_date",
        params![
            i.id,
            i.restaurant_camis,
            i.inspection_date.to_string(),
            i.inspection_type,
            i.action,
            i.score,
            i.grade,
            i.grade_date.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

pub fn upsert_violation(conn: &Connection, v: &Violation) -> Result<()> {
    conn.execute(
        "INSERT INTO violations (id, inspection_id, code, description, critical_flag)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             inspection_id = excluded.inspection_id,
             code = excluded.code,
             description = excluded.description,
             critical_flag = excluded.critical_flag",
        params![
            v.id,
            v.inspection_id,
            v.code,
            v.description,
            v.critical_flag.as_str(),
        ],
    )?;
    Ok(())
}

// ============================================================================
// REFERENTIAL PROBES (parents resolve against storage, not run state)
// ============================================================================

pub fn restaurant_exists(conn: &Connection, camis: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM restaurants WHERE camis = ?1",
            params![camis],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn inspection_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM inspections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

// ============================================================================
// BULK RESET (reverse dependency order, one transaction)
// ============================================================================

/// Delete Violations, then Inspections, then Restaurants.
/// Returns the number of rows deleted from each table.
pub fn truncate_all(conn: &mut Connection) -> Result<(usize, usize, usize)> {
    let tx = conn.transaction()?;
    let violations = tx.execute("DELETE FROM violations", [])?;
    let inspections = tx.execute("DELETE FROM inspections", [])?;
    let restaurants = tx.execute("DELETE FROM restaurants", [])?;
    tx.commit()?;
    Ok((violations, inspections, restaurants))
}

// ============================================================================
// LOOKUPS (verification + downstream single-record reads)
// ============================================================================

pub fn count_restaurants(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM restaurants", [], |row| row.get(0))?)
}

pub fn count_inspections(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM inspections", [], |row| row.get(0))?)
}

pub fn count_violations(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM violations", [], |row| row.get(0))?)
}

pub fn get_restaurant(conn: &Connection, camis: &str) -> Result<Option<Restaurant>> {
    conn.query_row(
        "SELECT camis, name, boro, building, street, zipcode, phone, cuisine
         FROM restaurants WHERE camis = ?1",
        params![camis],
        |row| {
            let boro_str: String = row.get(2)?;
            Ok(Restaurant {
                camis: row.get(0)?,
                name: row.get(1)?,
                // Stored boroughs are canonical strings written by as_str()
                boro: Borough::parse(&boro_str).unwrap_or(Borough::Manhattan),
                building: row.get(3)?,
                street: row.get(4)?,
                zipcode: row.get(5)?,
                phone: row.get(6)?,
                cuisine: row.get(7)?,
            })
        },
    )
    .optional()
    .context("Failed to read restaurant")
}

pub fn get_inspection(conn: &Connection, id: i64) -> Result<Option<Inspection>> {
    conn.query_row(
        "SELECT id, restraunt_camis, inspection_date, inspection_type, action, score, grade, grade_date
         FROM inspections WHERE id = ?1",
        params![id],
        |row| {
            let date_str: String = row.get(2)?;
            let grade_date_str: Option<String> = row.get(7)?;
            Ok(Inspection {
                id: row.get(0)?,
                restaurant_camis: row.get(1)?,
                inspection_date: date_str.parse().unwrap_or_default(),
                inspection_type: row.get(3)?,
                action: row.get(4)?,
                score: row.get(5)?,
                grade: row.get(6)?,
                grade_date: grade_date_str.and_then(|s| s.parse::<NaiveDate>().ok()),
            })
        },
    )
    .optional()
    .context("Failed to read inspection")
}

pub fn get_violation(conn: &Connection, id: i64) -> Result<Option<Violation>> {
    conn.query_row(
        "SELECT id, inspection_id, code, description, critical_flag
         FROM violations WHERE id = ?1",
        params![id],
        |row| {
            let flag: String = row.get(4)?;
            Ok(Violation {
                id: row.get(0)?,
                inspection_id: row.get(1)?,
                code: row.get(2)?,
                description: row.get(3)?,
                critical_flag: CriticalFlag::parse_or_default(&flag),
            })
        },
    )
    .optional()
    .context("Failed to read violation")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn test_restaurant(camis: &str) -> Restaurant {
        Restaurant {
            camis: camis.to_string(),
            name: "Test Diner".to_string(),
            boro: Borough::Manhattan,
            building: "123".to_string(),
            street: "Broadway".to_string(),
            zipcode: Some("10001".to_string()),
            phone: Some("2125550123".to_string()),
            cuisine: Some("American".to_string()),
        }
    }

    fn test_inspection(id: i64, camis: &str) -> Inspection {
        Inspection {
            id,
            restaurant_camis: camis.to_string(),
            inspection_date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            inspection_type: "Cycle Inspection".to_string(),
            action: "Violations were cited".to_string(),
            score: Some(13),
            grade: Some("A".to_string()),
            grade_date: None,
        }
    }

    #[test]
    fn test_upsert_overwrites_by_key() {
        let conn = test_conn();
        let mut r = test_restaurant("40001234");
        upsert_restaurant(&conn, &r).unwrap();

        r.name = "Renamed Diner".to_string();
        r.phone = None;
        upsert_restaurant(&conn, &r).unwrap();

        assert_eq!(count_restaurants(&conn).unwrap(), 1);
        let stored = get_restaurant(&conn, "40001234").unwrap().unwrap();
        assert_eq!(stored.name, "Renamed Diner");
        assert_eq!(stored.phone, None);
    }

    #[test]
    fn test_inspection_roundtrip() {
        let conn = test_conn();
        upsert_restaurant(&conn, &test_restaurant("40001234")).unwrap();
        upsert_inspection(&conn, &test_inspection(1, "40001234")).unwrap();

        let stored = get_inspection(&conn, 1).unwrap().unwrap();
        assert_eq!(
            stored.inspection_date,
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
        );
        assert_eq!(stored.score, Some(13));
        assert_eq!(stored.grade.as_deref(), Some("A"));
    }

    #[test]
    fn test_existence_probes() {
        let conn = test_conn();
        assert!(!restaurant_exists(&conn, "40001234").unwrap());
        upsert_restaurant(&conn, &test_restaurant("40001234")).unwrap();
        assert!(restaurant_exists(&conn, "40001234").unwrap());

        assert!(!inspection_exists(&conn, 1).unwrap());
        upsert_inspection(&conn, &test_inspection(1, "40001234")).unwrap();
        assert!(inspection_exists(&conn, 1).unwrap());
    }

    #[test]
    fn test_foreign_key_enforced() {
        let conn = test_conn();
        let result = upsert_inspection(&conn, &test_inspection(1, "no-such-camis"));
        assert!(result.is_err());
    }

    #[test]
    fn test_truncate_reverse_order_counts() {
        let mut conn = test_conn();
        upsert_restaurant(&conn, &test_restaurant("40001234")).unwrap();
        upsert_inspection(&conn, &test_inspection(1, "40001234")).unwrap();
        upsert_violation(
            &conn,
            &Violation {
                id: 1,
                inspection_id: 1,
                code: Some("10F".to_string()),
                description: None,
                critical_flag: CriticalFlag::NotCritical,
            },
        )
        .unwrap();

        let (v, i, r) = truncate_all(&mut conn).unwrap();
        assert_eq!((v, i, r), (1, 1, 1));
        assert_eq!(count_restaurants(&conn).unwrap(), 0);
        assert_eq!(count_inspections(&conn).unwrap(), 0);
        assert_eq!(count_violations(&conn).unwrap(), 0);
    }

    #[test]
    fn test_cascade_delete_children() {
        let conn = test_conn();
        upsert_restaurant(&conn, &test_restaurant("40001234")).unwrap();
        upsert_inspection(&conn, &test_inspection(1, "40001234")).unwrap();
        upsert_violation(
            &conn,
            &Violation {
                id: 1,
                inspection_id: 1,
                code: None,
                description: Some("Evidence of mice".to_string()),
                critical_flag: CriticalFlag::Critical,
            },
        )
        .unwrap();

        conn.execute("DELETE FROM restaurants WHERE camis = '40001234'", [])
            .unwrap();
        assert_eq!(count_inspections(&conn).unwrap(), 0);
        assert_eq!(count_violations(&conn).unwrap(), 0);
    }
}
