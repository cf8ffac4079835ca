// 📥 Dependency-Ordered Loader - Restaurant → Inspection → Violation
// Each phase runs in one transaction: it fully commits or fully rolls back.
// A later phase's failure never undoes an earlier phase's commit.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::db;
use crate::model::*;
use crate::normalize::blank_to_none;

// ============================================================================
// PATHS & OPTIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadPaths {
    pub restaurants: PathBuf,
    pub inspections: PathBuf,
    pub violations: PathBuf,
}

impl LoadPaths {
    /// Resolve the three input files from a base directory, with optional
    /// per-file overrides. A missing file is a configuration error.
    pub fn resolve(
        base_dir: &Path,
        restaurants: Option<PathBuf>,
        inspections: Option<PathBuf>,
        violations: Option<PathBuf>,
    ) -> Result<LoadPaths> {
        let paths = LoadPaths {
            restaurants: restaurants.unwrap_or_else(|| base_dir.join("restaurants.csv")),
            inspections: inspections.unwrap_or_else(|| base_dir.join("inspections.csv")),
            violations: violations.unwrap_or_else(|| base_dir.join("violations.csv")),
        };

        for p in [&paths.restaurants, &paths.inspections, &paths.violations] {
            if !p.exists() {
                bail!("CSV path does not exist: {}", p.display());
            }
        }

        Ok(paths)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Delete existing data (Violations → Inspections → Restaurants) first.
    pub truncate: bool,
    /// Parse and validate only; no database writes.
    pub dry_run: bool,
    /// Abort the phase on the first bad row instead of skip-and-report.
    pub strict: bool,
}

// ============================================================================
// REPORT
// ============================================================================

/// One skipped row (lenient mode only - strict aborts instead).
#[derive(Debug, Clone)]
pub struct RowFailure {
    pub file: String,
    pub line: u64,
    pub key: String,
    pub cause: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub restaurants_processed: usize,
    pub inspections_processed: usize,
    pub violations_processed: usize,
    /// (violations, inspections, restaurants) deleted, when --truncate ran.
    pub truncated: Option<(usize, usize, usize)>,
    pub failures: Vec<RowFailure>,
}

// ============================================================================
// RAW ROWS (as deserialized from the normalized CSVs)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RestaurantRow {
    camis: Option<String>,
    name: Option<String>,
    boro: Option<String>,
    building: Option<String>,
    street: Option<String>,
    zipcode: Option<String>,
    phone: Option<String>,
    cuisine: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InspectionRow {
    id: Option<i64>,
    #[serde(rename = "restraunt_camis")]
    restaurant_camis: Option<String>,
    inspection_date: Option<String>,
    inspection_type: Option<String>,
    action: Option<String>,
    score: Option<String>,
    grade: Option<String>,
    grade_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViolationRow {
    id: Option<i64>,
    inspection_id: Option<i64>,
    code: Option<String>,
    description: Option<String>,
    critical_flag: Option<String>,
}

impl RestaurantRow {
    fn key(&self) -> String {
        self.camis.clone().unwrap_or_default()
    }

    fn parse(self) -> Result<Restaurant, String> {
        let camis = self
            .camis
            .as_deref()
            .and_then(blank_to_none)
            .ok_or("Missing 'camis'")?;
        let boro_raw = self.boro.as_deref().unwrap_or("");
        let boro = Borough::parse(boro_raw)
            .ok_or_else(|| format!("Unmappable 'boro' value: '{}'", boro_raw))?;

        Ok(Restaurant {
            camis,
            name: self.name.as_deref().and_then(blank_to_none).unwrap_or_default(),
            boro,
            building: self.building.as_deref().and_then(blank_to_none).unwrap_or_default(),
            street: self.street.as_deref().and_then(blank_to_none).unwrap_or_default(),
            zipcode: self.zipcode.as_deref().and_then(blank_to_none),
            phone: self.phone.as_deref().and_then(blank_to_none),
            cuisine: self.cuisine.as_deref().and_then(blank_to_none),
        })
    }
}

impl InspectionRow {
    fn key(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    fn parse(self) -> Result<Inspection, String> {
        let id = self.id.ok_or("Missing 'id'")?;
        let restaurant_camis = self
            .restaurant_camis
            .as_deref()
            .and_then(blank_to_none)
            .ok_or("Missing 'restraunt_camis'")?;
        let inspection_date = parse_iso_date(self.inspection_date.as_deref())?
            .ok_or("Missing 'inspection_date'")?;
        let score = match self.score.as_deref().and_then(blank_to_none) {
            Some(s) => Some(s.parse::<i64>().map_err(|_| format!("Invalid 'score': '{}'", s))?),
            None => None,
        };

        Ok(Inspection {
            id,
            restaurant_camis,
            inspection_date,
            inspection_type: self
                .inspection_type
                .as_deref()
                .and_then(blank_to_none)
                .unwrap_or_default(),
            action: self.action.as_deref().and_then(blank_to_none).unwrap_or_default(),
            score,
            grade: self.grade.as_deref().and_then(blank_to_none),
            grade_date: parse_iso_date(self.grade_date.as_deref())?,
        })
    }
}

impl ViolationRow {
    fn key(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    fn parse(self) -> Result<Violation, String> {
        Ok(Violation {
            id: self.id.ok_or("Missing 'id'")?,
            inspection_id: self.inspection_id.ok_or("Missing 'inspection_id'")?,
            code: self.code.as_deref().and_then(blank_to_none),
            description: self.description.as_deref().and_then(blank_to_none),
            critical_flag: CriticalFlag::parse_or_default(self.critical_flag.as_deref().unwrap_or("")),
        })
    }
}

fn parse_iso_date(value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.and_then(blank_to_none) {
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| format!("Invalid date (expected YYYY-MM-DD): '{}'", s)),
        None => Ok(None),
    }
}

// ============================================================================
// IMPORT DRIVER
// ============================================================================

/// Import the three CSVs in dependency order. The schema is created if
/// absent. Returns per-phase processed counts and, in lenient mode, the
/// skipped rows.
pub fn run(conn: &mut Connection, paths: &LoadPaths, opts: &LoadOptions) -> Result<LoadReport> {
    db::setup_database(conn)?;

    let mut report = LoadReport::default();

    if opts.truncate && !opts.dry_run {
        report.truncated = Some(db::truncate_all(conn)?);
    }

    report.restaurants_processed = import_phase(
        conn,
        &paths.restaurants,
        &RESTAURANT_COLUMNS,
        opts,
        &mut report.failures,
        |row: RestaurantRow| (row.key(), row.parse()),
        |_conn, _r| Ok(None),
        db::upsert_restaurant,
    )?;

    report.inspections_processed = import_phase(
        conn,
        &paths.inspections,
        &INSPECTION_COLUMNS,
        opts,
        &mut report.failures,
        |row: InspectionRow| (row.key(), row.parse()),
        |conn, i: &Inspection| {
            if db::restaurant_exists(conn, &i.restaurant_camis)? {
                Ok(None)
            } else {
                Ok(Some(format!(
                    "Restaurant with CAMIS '{}' not found. Import restaurants first.",
                    i.restaurant_camis
                )))
            }
        },
        db::upsert_inspection,
    )?;

    report.violations_processed = import_phase(
        conn,
        &paths.violations,
        &VIOLATION_COLUMNS,
        opts,
        &mut report.failures,
        |row: ViolationRow| (row.key(), row.parse()),
        |conn, v: &Violation| {
            if db::inspection_exists(conn, v.inspection_id)? {
                Ok(None)
            } else {
                Ok(Some(format!(
                    "Inspection with id '{}' not found. Import inspections first.",
                    v.inspection_id
                )))
            }
        },
        db::upsert_violation,
    )?;

    Ok(report)
}

/// One phase: validate headers, then parse → referential check → upsert
/// per row inside a single transaction. Strict mode returns the first row
/// error (dropping the transaction rolls the phase back); lenient mode
/// records and skips. Dry-run parses and field-validates without touching
/// the database at all.
#[allow(clippy::too_many_arguments)]
fn import_phase<Row, Entity>(
    conn: &mut Connection,
    path: &Path,
    expected_columns: &[&str],
    opts: &LoadOptions,
    failures: &mut Vec<RowFailure>,
    parse: impl Fn(Row) -> (String, Result<Entity, String>),
    parent_missing: impl Fn(&Connection, &Entity) -> Result<Option<String>>,
    upsert: impl Fn(&Connection, &Entity) -> Result<()>,
) -> Result<usize>
where
    Row: for<'de> Deserialize<'de>,
{
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<input>")
        .to_string();

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    validate_headers(reader.headers()?, expected_columns, &file)?;

    let tx = if opts.dry_run {
        None
    } else {
        Some(conn.transaction()?)
    };

    let mut count = 0usize;

    for (i, result) in reader.deserialize::<Row>().enumerate() {
        let line = i as u64 + 2; // data rows start after the header

        let outcome: Result<(), (String, String)> = (|| {
            let row = result.map_err(|e| (String::new(), e.to_string()))?;
            let (key, parsed) = parse(row);
            let entity = parsed.map_err(|cause| (key.clone(), cause))?;

            if let Some(tx) = &tx {
                if let Some(cause) = parent_missing(tx, &entity).map_err(|e| (key.clone(), e.to_string()))? {
                    return Err((key, cause));
                }
                upsert(tx, &entity).map_err(|e| (key, e.to_string()))?;
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => count += 1,
            Err((key, cause)) => {
                if opts.strict {
                    // Dropping the open transaction rolls this phase back
                    bail!("{} line {} (key '{}'): {}", file, line, key, cause);
                }
                warn!(file = %file, line, key = %key, %cause, "skipping row");
                failures.push(RowFailure { file: file.clone(), line, key, cause });
            }
        }
    }

    if let Some(tx) = tx {
        tx.commit()
            .with_context(|| format!("Failed to commit {} phase", file))?;
    }

    Ok(count)
}

fn validate_headers(headers: &StringRecord, expected: &[&str], file: &str) -> Result<()> {
    if headers.is_empty() {
        bail!("{}: no header row found", file);
    }
    let missing: Vec<&str> = expected
        .iter()
        .filter(|col| {
            !headers
                .iter()
                .any(|h| h.trim_start_matches('\u{feff}') == **col)
        })
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!("{}: missing required columns: {}", file, missing.join(", "));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
