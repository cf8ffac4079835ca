// 🔑 Natural-Key Deduplicator - synthetic id assignment under dedup
// Memory is bounded by DISTINCT restaurants/inspections, not input rows.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

// ============================================================================
// INSPECTION COMPOSITE KEY
// ============================================================================

/// The tuple that decides whether two raw rows describe the same logical
/// inspection. All fields are post-normalization: score participates as its
/// parsed integer (absent if unparsable), dates as calendar dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InspectionKey {
    pub camis: String,
    pub inspection_date: NaiveDate,
    pub inspection_type: String,
    pub action: String,
    pub score: Option<i64>,
    pub grade: String,
    pub grade_date: Option<NaiveDate>,
}

// ============================================================================
// DEDUPLICATOR
// ============================================================================

/// Per-run dedup state. Owns the synthetic id counters, so separate runs
/// (and separate tests) never leak identifiers into each other.
///
/// Ids are stable within one run only: re-running extraction from scratch
/// may assign different ids to the same logical inspections unless this
/// index is persisted and reused.
pub struct Deduplicator {
    seen_restaurants: HashSet<String>,
    inspection_index: HashMap<InspectionKey, i64>,
    next_inspection_id: i64,
    next_violation_id: i64,
}

impl Deduplicator {
    pub fn new() -> Self {
        Deduplicator {
            seen_restaurants: HashSet::new(),
            inspection_index: HashMap::new(),
            next_inspection_id: 1,
            next_violation_id: 1,
        }
    }

    /// Has this restaurant already been emitted?
    pub fn restaurant_seen(&self, camis: &str) -> bool {
        self.seen_restaurants.contains(camis)
    }

    /// Mark a restaurant as emitted. Returns true if it was new.
    pub fn register_restaurant(&mut self, camis: &str) -> bool {
        self.seen_restaurants.insert(camis.to_string())
    }

    /// Number of distinct restaurants emitted so far (cap accounting).
    pub fn restaurant_count(&self) -> usize {
        self.seen_restaurants.len()
    }

    /// The id already assigned to this composite key, if any.
    pub fn lookup_inspection(&self, key: &InspectionKey) -> Option<i64> {
        self.inspection_index.get(key).copied()
    }

    /// Assign (or return the existing) id for a composite key.
    /// Idempotent: the same key observed twice always maps to the same id.
    pub fn register_inspection(&mut self, key: InspectionKey) -> (i64, bool) {
        if let Some(id) = self.inspection_index.get(&key) {
            return (*id, false);
        }
        let id = self.next_inspection_id;
        self.next_inspection_id += 1;
        self.inspection_index.insert(key, id);
        (id, true)
    }

    /// Number of distinct inspections registered so far (cap accounting).
    pub fn inspection_count(&self) -> usize {
        self.inspection_index.len()
    }

    /// Always fresh - the feed affords no natural key for a violation.
    pub fn next_violation_id(&mut self) -> i64 {
        let id = self.next_violation_id;
        self.next_violation_id += 1;
        id
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(camis: &str, date: (i32, u32, u32), itype: &str, score: Option<i64>) -> InspectionKey {
        InspectionKey {
            camis: camis.to_string(),
            inspection_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            inspection_type: itype.to_string(),
            action: "Violations were cited".to_string(),
            score,
            grade: "A".to_string(),
            grade_date: None,
        }
    }

    #[test]
    fn test_restaurant_registration() {
        let mut dedup = Deduplicator::new();
        assert!(!dedup.restaurant_seen("40001234"));
        assert!(dedup.register_restaurant("40001234"));
        assert!(dedup.restaurant_seen("40001234"));
        assert!(!dedup.register_restaurant("40001234"));
        assert_eq!(dedup.restaurant_count(), 1);
    }

    #[test]
    fn test_same_composite_key_same_id() {
        let mut dedup = Deduplicator::new();
        let (id1, new1) = dedup.register_inspection(key("40001234", (2023, 1, 15), "Cycle Inspection", Some(13)));
        let (id2, new2) = dedup.register_inspection(key("40001234", (2023, 1, 15), "Cycle Inspection", Some(13)));
        assert!(new1);
        assert!(!new2);
        assert_eq!(id1, id2);
        assert_eq!(dedup.inspection_count(), 1);
    }

    #[test]
    fn test_any_differing_field_gets_distinct_id() {
        let mut dedup = Deduplicator::new();
        let (base, _) = dedup.register_inspection(key("40001234", (2023, 1, 15), "Cycle Inspection", Some(13)));

        let (other_date, _) = dedup.register_inspection(key("40001234", (2023, 1, 16), "Cycle Inspection", Some(13)));
        let (other_type, _) = dedup.register_inspection(key("40001234", (2023, 1, 15), "Re-inspection", Some(13)));
        let (other_score, _) = dedup.register_inspection(key("40001234", (2023, 1, 15), "Cycle Inspection", None));
        let (other_camis, _) = dedup.register_inspection(key("40009999", (2023, 1, 15), "Cycle Inspection", Some(13)));

        let ids = [base, other_date, other_type, other_score, other_camis];
        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_violation_ids_always_fresh() {
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.next_violation_id(), 1);
        assert_eq!(dedup.next_violation_id(), 2);
        assert_eq!(dedup.next_violation_id(), 3);
    }

    #[test]
    fn test_instances_do_not_share_counters() {
        let mut a = Deduplicator::new();
        let mut b = Deduplicator::new();
        a.next_violation_id();
        a.next_violation_id();
        assert_eq!(b.next_violation_id(), 1);

        let (id_a, _) = a.register_inspection(key("1", (2023, 2, 1), "Cycle Inspection", None));
        let (id_b, _) = b.register_inspection(key("1", (2023, 2, 1), "Cycle Inspection", None));
        assert_eq!(id_a, 1);
        assert_eq!(id_b, 1);
    }
}
