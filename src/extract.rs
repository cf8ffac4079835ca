// 🚰 Streaming Extractor - one forward pass over the raw DOHMH feed
// Splits the flat CSV into restaurants / inspections / violations with
// synthesized keys, plus a metadata.json run summary.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::{StringRecord, WriterBuilder};
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dedup::{Deduplicator, InspectionKey};
use crate::model::*;
use crate::normalize::{blank_to_none, clean_phone, parse_date_mdy, parse_int, sanitize_text, truncate_chars};

/// Filename prefix for input auto-discovery.
pub const INPUT_FILE_PREFIX: &str = "DOHMH_New_York_City_Restaurant_Inspection_Results_";

/// Progress log interval (scanned rows) when verbose.
const PROGRESS_INTERVAL: u64 = 100_000;

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Inclusive date range on the inspection date.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Cap on raw input rows scanned (bounded test runs).
    pub limit: Option<u64>,
    /// Strip non-ASCII characters from text fields entirely.
    pub ascii_only: bool,
    /// Caps on DISTINCT restaurants/inspections and EMITTED violations.
    pub max_restaurants: Option<u64>,
    pub max_inspections: Option<u64>,
    pub max_violations: Option<u64>,
    /// Emit periodic progress while scanning.
    pub verbose: bool,
}

// ============================================================================
// PER-ROW DISPOSITION
// ============================================================================

/// Explicit outcome of one raw row. Every row resolves to exactly one of
/// these; the summary is an aggregation over dispositions, so no drop is
/// ever an invisible control-flow jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDisposition {
    /// Row contributed to the output (restaurant/inspection reuse included).
    Written,
    /// Inspection date missing, unparsable, or outside the range.
    DateFilteredOut,
    /// Mandatory restaurant field missing or borough unmappable.
    Rejected,
    /// Row named an unseen restaurant after the restaurant cap was reached.
    RestaurantCapSkipped,
    /// Row carried a new composite key after the inspection cap was reached.
    InspectionCapSkipped,
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub input_rows_scanned: u64,
    pub input_rows_limited: bool,
    pub rows_date_filtered_out: u64,
    pub rows_rejected: u64,
    pub rows_restaurant_cap_skipped: u64,
    pub rows_inspection_cap_skipped: u64,
    pub restaurants_written: u64,
    pub inspections_written: u64,
    pub violations_written: u64,
    pub violations_cap_skipped: u64,
    pub input_path: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_dir: String,
}

impl ExtractSummary {
    fn new(opts: &ExtractOptions) -> Self {
        ExtractSummary {
            input_rows_scanned: 0,
            input_rows_limited: false,
            rows_date_filtered_out: 0,
            rows_rejected: 0,
            rows_restaurant_cap_skipped: 0,
            rows_inspection_cap_skipped: 0,
            restaurants_written: 0,
            inspections_written: 0,
            violations_written: 0,
            violations_cap_skipped: 0,
            input_path: opts.input.display().to_string(),
            start_date: opts.start_date,
            end_date: opts.end_date,
            output_dir: opts.output_dir.display().to_string(),
        }
    }

    fn tally(&mut self, disposition: RowDisposition) {
        match disposition {
            RowDisposition::Written => {}
            RowDisposition::DateFilteredOut => self.rows_date_filtered_out += 1,
            RowDisposition::Rejected => self.rows_rejected += 1,
            RowDisposition::RestaurantCapSkipped => self.rows_restaurant_cap_skipped += 1,
            RowDisposition::InspectionCapSkipped => self.rows_inspection_cap_skipped += 1,
        }
    }
}

// ============================================================================
// RAW COLUMN RESOLUTION
// ============================================================================

/// Column positions in the raw header. CAMIS, DBA, BORO, and INSPECTION DATE
/// are required; everything else reads as blank when the column is absent.
struct RawColumns {
    camis: usize,
    dba: usize,
    boro: usize,
    inspection_date: usize,
    building: Option<usize>,
    street: Option<usize>,
    zipcode: Option<usize>,
    phone: Option<usize>,
    cuisine: Option<usize>,
    action: Option<usize>,
    violation_code: Option<usize>,
    violation_description: Option<usize>,
    critical_flag: Option<usize>,
    score: Option<usize>,
    grade: Option<usize>,
    grade_date: Option<usize>,
    inspection_type: Option<usize>,
}

impl RawColumns {
    fn resolve(headers: &StringRecord) -> Result<RawColumns> {
        // The feed is published with a UTF-8 BOM on the first header cell
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let require = |name: &str| {
            find(name).with_context(|| format!("Input CSV is missing required column: {}", name))
        };

        Ok(RawColumns {
            camis: require(RAW_CAMIS)?,
            dba: require(RAW_DBA)?,
            boro: require(RAW_BORO)?,
            inspection_date: require(RAW_INSPECTION_DATE)?,
            building: find(RAW_BUILDING),
            street: find(RAW_STREET),
            zipcode: find(RAW_ZIPCODE),
            phone: find(RAW_PHONE),
            cuisine: find(RAW_CUISINE),
            action: find(RAW_ACTION),
            violation_code: find(RAW_VIOLATION_CODE),
            violation_description: find(RAW_VIOLATION_DESCRIPTION),
            critical_flag: find(RAW_CRITICAL_FLAG),
            score: find(RAW_SCORE),
            grade: find(RAW_GRADE),
            grade_date: find(RAW_GRADE_DATE),
            inspection_type: find(RAW_INSPECTION_TYPE),
        })
    }

    fn field<'r>(&self, record: &'r StringRecord, idx: usize) -> &'r str {
        record.get(idx).unwrap_or("")
    }

    fn opt_field<'r>(&self, record: &'r StringRecord, idx: Option<usize>) -> &'r str {
        idx.and_then(|i| record.get(i)).unwrap_or("")
    }
}

// ============================================================================
// INPUT AUTO-DISCOVERY
// ============================================================================

/// Find the lexicographically newest `DOHMH_..._*.csv` in a directory.
/// The feed embeds the publish date in the filename, so name order is
/// publish order.
pub fn discover_latest_input(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(INPUT_FILE_PREFIX) && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort();
    Ok(candidates.pop())
}

// ============================================================================
// EXTRACTION
// ============================================================================

struct OutputWriters {
    restaurants: csv::Writer<File>,
    inspections: csv::Writer<File>,
    violations: csv::Writer<File>,
}

impl OutputWriters {
    fn create(out_dir: &Path) -> Result<OutputWriters> {
        let open = |name: &str| -> Result<csv::Writer<File>> {
            let path = out_dir.join(name);
            WriterBuilder::new()
                .has_headers(false)
                .from_path(&path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))
        };

        let mut restaurants = open("restaurants.csv")?;
        let mut inspections = open("inspections.csv")?;
        let mut violations = open("violations.csv")?;

        // Header row is mandatory even when no record follows it
        restaurants.write_record(RESTAURANT_COLUMNS)?;
        inspections.write_record(INSPECTION_COLUMNS)?;
        violations.write_record(VIOLATION_COLUMNS)?;

        Ok(OutputWriters {
            restaurants,
            inspections,
            violations,
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.restaurants.flush()?;
        self.inspections.flush()?;
        self.violations.flush()?;
        Ok(())
    }
}

/// Run the extraction: one pass, three output streams, one summary.
///
/// Row content never fails the run; only unrecoverable I/O and
/// configuration errors (missing file, missing required column, inverted
/// date range) do.
pub fn run(opts: &ExtractOptions) -> Result<ExtractSummary> {
    if opts.start_date > opts.end_date {
        bail!(
            "start-date {} must be <= end-date {}",
            opts.start_date,
            opts.end_date
        );
    }
    if !opts.input.exists() {
        bail!("Input CSV not found: {}", opts.input.display());
    }

    fs::create_dir_all(&opts.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            opts.output_dir.display()
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&opts.input)
        .with_context(|| format!("Failed to open input CSV: {}", opts.input.display()))?;

    let headers = reader.headers().context("Input CSV has no header row")?.clone();
    let columns = RawColumns::resolve(&headers)?;

    let mut writers = OutputWriters::create(&opts.output_dir)?;
    let mut dedup = Deduplicator::new();
    let mut summary = ExtractSummary::new(opts);

    for result in reader.records() {
        if let Some(limit) = opts.limit {
            if summary.input_rows_scanned >= limit {
                summary.input_rows_limited = true;
                break;
            }
        }

        let record = result.context("Failed to read input CSV record")?;
        summary.input_rows_scanned += 1;

        let disposition = process_row(opts, &columns, &record, &mut dedup, &mut writers, &mut summary)?;
        summary.tally(disposition);

        if opts.verbose && summary.input_rows_scanned % PROGRESS_INTERVAL == 0 {
            info!(
                scanned = summary.input_rows_scanned,
                restaurants = summary.restaurants_written,
                inspections = summary.inspections_written,
                violations = summary.violations_written,
                "extraction progress"
            );
        }
    }

    writers.flush()?;

    let meta_path = opts.output_dir.join("metadata.json");
    let meta_json = serde_json::to_string_pretty(&summary)?;
    fs::write(&meta_path, meta_json)
        .with_context(|| format!("Failed to write {}", meta_path.display()))?;

    Ok(summary)
}

/// Apply the per-row pipeline: date filter → restaurant → inspection →
/// violation, with cap admission control at each entity boundary.
fn process_row(
    opts: &ExtractOptions,
    columns: &RawColumns,
    record: &StringRecord,
    dedup: &mut Deduplicator,
    writers: &mut OutputWriters,
    summary: &mut ExtractSummary,
) -> Result<RowDisposition> {
    // 1. Parse and range-filter the inspection date
    let inspection_date = match parse_date_mdy(columns.field(record, columns.inspection_date)) {
        Some(d) if d >= opts.start_date && d <= opts.end_date => d,
        _ => return Ok(RowDisposition::DateFilteredOut),
    };

    // 2. Minimum viable restaurant: camis, name, and a mappable borough
    let camis = truncate_chars(columns.field(record, columns.camis).trim(), MAX_CAMIS);
    let name = sanitize_text(columns.field(record, columns.dba), opts.ascii_only, MAX_NAME);
    let boro = Borough::parse(columns.field(record, columns.boro));

    let (camis, name, boro) = match (camis.is_empty(), name.is_empty(), boro) {
        (false, false, Some(b)) => (camis, name, b),
        _ => {
            debug!(row = summary.input_rows_scanned, "row rejected: missing camis/name or unmappable boro");
            return Ok(RowDisposition::Rejected);
        }
    };

    // 3. Emit the restaurant once per CAMIS, subject to the cap
    if !dedup.restaurant_seen(&camis) {
        if let Some(cap) = opts.max_restaurants {
            if dedup.restaurant_count() as u64 >= cap {
                return Ok(RowDisposition::RestaurantCapSkipped);
            }
        }

        let restaurant = Restaurant {
            camis: camis.clone(),
            name,
            boro,
            building: sanitize_text(
                columns.opt_field(record, columns.building),
                opts.ascii_only,
                MAX_BUILDING,
            ),
            street: sanitize_text(
                columns.opt_field(record, columns.street),
                opts.ascii_only,
                MAX_STREET,
            ),
            zipcode: blank_to_none(&truncate_chars(
                columns.opt_field(record, columns.zipcode).trim(),
                MAX_ZIPCODE,
            )),
            phone: clean_phone(columns.opt_field(record, columns.phone), MAX_PHONE),
            cuisine: blank_to_none(&sanitize_text(
                columns.opt_field(record, columns.cuisine),
                opts.ascii_only,
                MAX_CUISINE,
            )),
        };
        writers.restaurants.serialize(&restaurant)?;
        dedup.register_restaurant(&camis);
        summary.restaurants_written += 1;
    }

    // 4. Normalize inspection fields and collapse on the composite key
    let inspection_type = sanitize_text(
        columns.opt_field(record, columns.inspection_type),
        opts.ascii_only,
        MAX_INSPECTION_TYPE,
    );
    let action = sanitize_text(
        columns.opt_field(record, columns.action),
        opts.ascii_only,
        MAX_ACTION,
    );
    let score = parse_int(columns.opt_field(record, columns.score));
    let grade = sanitize_text(
        columns.opt_field(record, columns.grade),
        opts.ascii_only,
        MAX_GRADE,
    );
    let grade_date = parse_date_mdy(columns.opt_field(record, columns.grade_date));

    let key = InspectionKey {
        camis: camis.clone(),
        inspection_date,
        inspection_type: inspection_type.clone(),
        action: action.clone(),
        score,
        grade: grade.clone(),
        grade_date,
    };

    let inspection_id = match dedup.lookup_inspection(&key) {
        Some(id) => id,
        None => {
            if let Some(cap) = opts.max_inspections {
                if dedup.inspection_count() as u64 >= cap {
                    return Ok(RowDisposition::InspectionCapSkipped);
                }
            }

            let (id, _) = dedup.register_inspection(key);
            let inspection = Inspection {
                id,
                restaurant_camis: camis.clone(),
                inspection_date,
                inspection_type,
                action,
                score,
                grade: blank_to_none(&grade),
                grade_date,
            };
            writers.inspections.serialize(&inspection)?;
            summary.inspections_written += 1;
            id
        }
    };

    // 5. A violation exists only if the row carries any violation field
    let code_raw = columns.opt_field(record, columns.violation_code).trim();
    let description_raw = columns.opt_field(record, columns.violation_description).trim();
    let flag_raw = columns.opt_field(record, columns.critical_flag).trim();

    if !code_raw.is_empty() || !description_raw.is_empty() || !flag_raw.is_empty() {
        let capped = opts
            .max_violations
            .map(|cap| summary.violations_written >= cap)
            .unwrap_or(false);

        if capped {
            summary.violations_cap_skipped += 1;
        } else {
            let violation = Violation {
                id: dedup.next_violation_id(),
                inspection_id,
                code: blank_to_none(&sanitize_text(code_raw, opts.ascii_only, MAX_VIOLATION_CODE)),
                description: blank_to_none(&sanitize_text(
                    description_raw,
                    opts.ascii_only,
                    usize::MAX,
                )),
                critical_flag: CriticalFlag::parse_or_default(flag_raw),
            };
            writers.violations.serialize(&violation)?;
            summary.violations_written += 1;
        }
    }

    Ok(RowDisposition::Written)
}

// ============================================================================
// TESTS
// ============================================================================
