// 🗽 Entity Model - Restaurants, Inspections, Violations
// Two-level hierarchy: Restaurant (natural key) → Inspection → Violation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// RAW FEED COLUMNS (exact as provided by NYC Open Data)
// ============================================================================

pub const RAW_CAMIS: &str = "CAMIS";
pub const RAW_DBA: &str = "DBA";
pub const RAW_BORO: &str = "BORO";
pub const RAW_BUILDING: &str = "BUILDING";
pub const RAW_STREET: &str = "STREET";
pub const RAW_ZIPCODE: &str = "ZIPCODE";
pub const RAW_PHONE: &str = "PHONE";
pub const RAW_CUISINE: &str = "CUISINE DESCRIPTION";
pub const RAW_INSPECTION_DATE: &str = "INSPECTION DATE";
pub const RAW_ACTION: &str = "ACTION";
pub const RAW_VIOLATION_CODE: &str = "VIOLATION CODE";
pub const RAW_VIOLATION_DESCRIPTION: &str = "VIOLATION DESCRIPTION";
pub const RAW_CRITICAL_FLAG: &str = "CRITICAL FLAG";
pub const RAW_SCORE: &str = "SCORE";
pub const RAW_GRADE: &str = "GRADE";
pub const RAW_GRADE_DATE: &str = "GRADE DATE";
pub const RAW_INSPECTION_TYPE: &str = "INSPECTION TYPE";

// ============================================================================
// NORMALIZED CSV COLUMNS
// ============================================================================

pub const RESTAURANT_COLUMNS: [&str; 8] = [
    "camis", "name", "boro", "building", "street", "zipcode", "phone", "cuisine",
];

// "restraunt_camis" keeps the historical spelling from the destination schema.
pub const INSPECTION_COLUMNS: [&str; 8] = [
    "id",
    "restraunt_camis",
    "inspection_date",
    "inspection_type",
    "action",
    "score",
    "grade",
    "grade_date",
];

pub const VIOLATION_COLUMNS: [&str; 5] = ["id", "inspection_id", "code", "description", "critical_flag"];

// ============================================================================
// FIELD LENGTH LIMITS (destination schema)
// ============================================================================

pub const MAX_CAMIS: usize = 10;
pub const MAX_NAME: usize = 255;
pub const MAX_BUILDING: usize = 20;
pub const MAX_STREET: usize = 255;
pub const MAX_ZIPCODE: usize = 10;
pub const MAX_PHONE: usize = 20;
pub const MAX_CUISINE: usize = 100;
pub const MAX_INSPECTION_TYPE: usize = 50;
pub const MAX_ACTION: usize = 255;
pub const MAX_GRADE: usize = 2;
pub const MAX_VIOLATION_CODE: usize = 20;

// ============================================================================
// BOROUGH (closed enum - mandatory for every restaurant)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Borough {
    Manhattan,
    Bronx,
    Brooklyn,
    Queens,
    #[serde(rename = "Staten Island")]
    StatenIsland,
}

impl Borough {
    pub fn as_str(&self) -> &'static str {
        match self {
            Borough::Manhattan => "Manhattan",
            Borough::Bronx => "Bronx",
            Borough::Brooklyn => "Brooklyn",
            Borough::Queens => "Queens",
            Borough::StatenIsland => "Staten Island",
        }
    }

    /// Map a raw BORO value to the closed enum.
    ///
    /// Exact canonical names match first, then a tolerant lookup:
    /// uppercase, `/` treated as a space, whitespace collapsed, plus the
    /// known alias spellings from the raw feed. Unmappable input is `None`
    /// and rejects the owning row (borough is mandatory).
    pub fn parse(value: &str) -> Option<Borough> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }

        match v {
            "Manhattan" => return Some(Borough::Manhattan),
            "Bronx" => return Some(Borough::Bronx),
            "Brooklyn" => return Some(Borough::Brooklyn),
            "Queens" => return Some(Borough::Queens),
            "Staten Island" => return Some(Borough::StatenIsland),
            _ => {}
        }

        let up = v
            .to_uppercase()
            .replace('/', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match up.as_str() {
            "MANHATTAN" => Some(Borough::Manhattan),
            "BRONX" => Some(Borough::Bronx),
            "BROOKLYN" => Some(Borough::Brooklyn),
            "QUEENS" => Some(Borough::Queens),
            "STATEN ISLAND" | "STATEN_ISLAND" | "STATEN-ISLAND" | "STATENISLAND" | "ST. GEORGE" => {
                Some(Borough::StatenIsland)
            }
            _ => None,
        }
    }
}

// ============================================================================
// CRITICAL FLAG (closed enum - defaults, never rejects)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriticalFlag {
    Critical,
    #[serde(rename = "Not Critical")]
    NotCritical,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
}

impl CriticalFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalFlag::Critical => "Critical",
            CriticalFlag::NotCritical => "Not Critical",
            CriticalFlag::NotApplicable => "Not Applicable",
        }
    }

    /// Case/space-normalized match against the three canonical values.
    /// Anything else (including blank) falls back to `Not Applicable`.
    pub fn parse_or_default(value: &str) -> CriticalFlag {
        let v = value.trim().to_lowercase();
        let v = v.split_whitespace().collect::<Vec<_>>().join(" ");
        match v.as_str() {
            "critical" => CriticalFlag::Critical,
            "not critical" => CriticalFlag::NotCritical,
            _ => CriticalFlag::NotApplicable,
        }
    }
}

impl Default for CriticalFlag {
    fn default() -> Self {
        CriticalFlag::NotApplicable
    }
}

// ============================================================================
// RECORDS (one per normalized CSV / storage table)
// ============================================================================

/// Restaurant - natural key `camis`, never regenerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub camis: String,
    pub name: String,
    pub boro: Borough,
    pub building: String,
    pub street: String,
    pub zipcode: Option<String>,
    pub phone: Option<String>,
    pub cuisine: Option<String>,
}

/// Inspection - synthetic id, owned by a Restaurant via its CAMIS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: i64,

    /// Foreign key to `Restaurant.camis` (column name keeps the destination
    /// schema's historical spelling).
    #[serde(rename = "restraunt_camis")]
    pub restaurant_camis: String,

    pub inspection_date: NaiveDate,
    pub inspection_type: String,
    pub action: String,
    pub score: Option<i64>,
    pub grade: Option<String>,
    pub grade_date: Option<NaiveDate>,
}

/// Violation - synthetic id, owned by an Inspection. One per qualifying raw
/// row; the feed affords no natural key, so violations are never deduped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: i64,
    pub inspection_id: i64,
    pub code: Option<String>,
    pub description: Option<String>,
    pub critical_flag: CriticalFlag,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borough_canonical_names() {
        assert_eq!(Borough::parse("Manhattan"), Some(Borough::Manhattan));
        assert_eq!(Borough::parse("Staten Island"), Some(Borough::StatenIsland));
    }

    #[test]
    fn test_borough_tolerant_lookup() {
        assert_eq!(Borough::parse("MANHATTAN"), Some(Borough::Manhattan));
        assert_eq!(Borough::parse("  brooklyn "), Some(Borough::Brooklyn));
        assert_eq!(Borough::parse("STATEN_ISLAND"), Some(Borough::StatenIsland));
        assert_eq!(Borough::parse("STATEN-ISLAND"), Some(Borough::StatenIsland));
        assert_eq!(Borough::parse("STATENISLAND"), Some(Borough::StatenIsland));
        assert_eq!(Borough::parse("ST. GEORGE"), Some(Borough::StatenIsland));
        assert_eq!(Borough::parse("STATEN   ISLAND"), Some(Borough::StatenIsland));
    }

    #[test]
    fn test_borough_unmappable() {
        assert_eq!(Borough::parse("Unknown"), None);
        assert_eq!(Borough::parse(""), None);
        assert_eq!(Borough::parse("Jersey City"), None);
    }

    #[test]
    fn test_critical_flag_parse() {
        assert_eq!(CriticalFlag::parse_or_default("Critical"), CriticalFlag::Critical);
        assert_eq!(CriticalFlag::parse_or_default("NOT  CRITICAL"), CriticalFlag::NotCritical);
        assert_eq!(
            CriticalFlag::parse_or_default("not applicable"),
            CriticalFlag::NotApplicable
        );
    }

    #[test]
    fn test_critical_flag_defaults() {
        assert_eq!(CriticalFlag::parse_or_default(""), CriticalFlag::NotApplicable);
        assert_eq!(CriticalFlag::parse_or_default("Y"), CriticalFlag::NotApplicable);
    }
}
