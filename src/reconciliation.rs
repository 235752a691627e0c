// ⚖️ Reconciliation Engine - Merge persisted ATMs with the reference catalog
//
// Guarantees:
//   - every reference-catalog id is present in the output (superset)
//   - ids are unique (later persisted entries win)
//   - an id is never overridden by a stray field
//   - one malformed record never blocks loading the rest
//
// Reconciling the output again against the same catalog yields the same set.

use crate::entities::{AtmRecord, AtmStatus};
use crate::error::{AtmError, AtmResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Legacy alternate identity key found in older snapshots
pub const LEGACY_ID_KEY: &str = "idatm";

// ============================================================================
// PERSISTED RECORD (loosely typed input)
// ============================================================================

/// Field overrides carried by one persisted record
///
/// Identity is extracted separately (see `identity_of`) so that a numeric
/// legacy id doesn't fail the typed parse.
#[derive(Debug, Default, Deserialize)]
struct PersistedAtm {
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    monthly_volume: Option<f64>,
    status: Option<AtmStatus>,
    city: Option<String>,
    region: Option<String>,
    bank_name: Option<String>,
    installation_type: Option<String>,
    branch_location: Option<String>,
    services: Option<Vec<String>>,
}

impl PersistedAtm {
    /// Apply the overrides on top of `base`, keeping `base.id`
    fn apply_to(self, mut base: AtmRecord) -> AtmRecord {
        if let Some(name) = self.name {
            base.name = name;
        }
        if let Some(lat) = self.latitude {
            base.latitude = lat;
        }
        if let Some(lon) = self.longitude {
            base.longitude = lon;
        }
        if let Some(volume) = self.monthly_volume {
            base.monthly_volume = volume;
        }
        if let Some(status) = self.status {
            base.status = status;
        }
        if let Some(city) = self.city {
            base.city = city;
        }
        if let Some(region) = self.region {
            base.region = region;
        }
        if self.bank_name.is_some() {
            base.bank_name = self.bank_name;
        }
        if self.installation_type.is_some() {
            base.installation_type = self.installation_type;
        }
        if self.branch_location.is_some() {
            base.branch_location = self.branch_location;
        }
        if let Some(services) = self.services {
            base.services = services;
        }
        base
    }
}

/// Resolve the identity of a raw record: `id` first, then `idatm`
///
/// Strings are trimmed; integers are accepted for legacy snapshots.
fn identity_of(raw: &Value) -> Option<String> {
    let obj = raw.as_object()?;

    [obj.get("id"), obj.get(LEGACY_ID_KEY)]
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        })
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// A persisted record excluded because it failed type or range validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the persisted input
    pub index: usize,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Deduplicated, validated records (order carries no meaning)
    pub records: Vec<AtmRecord>,

    pub rejected: Vec<RejectedRecord>,

    /// Records with neither `id` nor `idatm`
    pub dropped_without_identity: usize,

    /// Persisted records that found a catalog entry to merge with
    pub merged_with_catalog: usize,

    /// Catalog entries the persisted input didn't mention
    pub catalog_appended: usize,

    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.dropped_without_identity == 0
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ATMs ({} merged with catalog, {} catalog-only), {} rejected, {} without identity",
            self.records.len(),
            self.merged_with_catalog,
            self.catalog_appended,
            self.rejected.len(),
            self.dropped_without_identity
        )
    }
}

// ============================================================================
// CATALOG RECONCILER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CatalogReconciler {
    catalog: Vec<AtmRecord>,
    by_id: HashMap<String, usize>,
}

impl CatalogReconciler {
    pub fn new(catalog: Vec<AtmRecord>) -> Self {
        let by_id = catalog
            .iter()
            .enumerate()
            .map(|(i, atm)| (atm.id.clone(), i))
            .collect();

        CatalogReconciler { catalog, by_id }
    }

    /// Reconciler over the compiled-in reference catalog
    pub fn with_reference_catalog() -> Self {
        Self::new(crate::catalog::reference_catalog())
    }

    pub fn catalog(&self) -> &[AtmRecord] {
        &self.catalog
    }

    fn lookup(&self, id: &str) -> Option<&AtmRecord> {
        self.by_id.get(id).map(|&i| &self.catalog[i])
    }

    /// Merge `persisted` with the catalog
    ///
    /// Never fails: malformed records end up in `rejected`.
    pub fn reconcile(&self, persisted: &[Value]) -> ReconciliationReport {
        let mut records: Vec<AtmRecord> = Vec::with_capacity(persisted.len() + self.catalog.len());
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut rejected = Vec::new();
        let mut dropped_without_identity = 0;
        let mut merged_with_catalog = 0;

        // 1-3. Parse, merge, deduplicate (later entries win)
        for (index, raw) in persisted.iter().enumerate() {
            let Some(id) = identity_of(raw) else {
                dropped_without_identity += 1;
                continue;
            };

            let catalog_entry = self.lookup(&id);
            match Self::normalize(&id, raw, catalog_entry) {
                Ok(record) => {
                    if catalog_entry.is_some() {
                        merged_with_catalog += 1;
                    }
                    match position.get(&record.id) {
                        Some(&slot) => records[slot] = record,
                        None => {
                            position.insert(record.id.clone(), records.len());
                            records.push(record);
                        }
                    }
                }
                Err(e) => rejected.push(RejectedRecord {
                    index,
                    id,
                    reason: e.to_string(),
                }),
            }
        }

        // 4. Catalog entries never forgotten
        let mut catalog_appended = 0;
        for entry in &self.catalog {
            if !position.contains_key(&entry.id) {
                position.insert(entry.id.clone(), records.len());
                records.push(entry.clone());
                catalog_appended += 1;
            }
        }

        ReconciliationReport {
            records,
            rejected,
            dropped_without_identity,
            merged_with_catalog,
            catalog_appended,
            reconciled_at: Utc::now(),
        }
    }

    /// Build one validated record from a raw persisted value
    ///
    /// With a catalog entry: catalog fields form the base, persisted fields
    /// override. Without one: a minimal record whose name is its id, which
    /// then needs its own coordinates.
    fn normalize(id: &str, raw: &Value, catalog_entry: Option<&AtmRecord>) -> AtmResult<AtmRecord> {
        let overrides: PersistedAtm = serde_json::from_value(raw.clone())
            .map_err(|e| AtmError::invalid_record(id, e.to_string()))?;

        let base = match catalog_entry {
            Some(entry) => entry.clone(),
            None => {
                let latitude = overrides
                    .latitude
                    .ok_or_else(|| AtmError::invalid_record(id, "missing latitude"))?;
                let longitude = overrides
                    .longitude
                    .ok_or_else(|| AtmError::invalid_record(id, "missing longitude"))?;
                AtmRecord::new(id, latitude, longitude)
            }
        };

        let from_catalog = catalog_entry.is_some();
        let mut record = overrides.apply_to(base);
        record.id = id.to_string();
        if !from_catalog {
            // Display names only come from the catalog
            record.name = id.to_string();
        }
        record.validate()?;

        Ok(record)
    }
}

/// Pure reconciliation of `persisted` against `catalog`
pub fn reconcile(persisted: &[Value], catalog: &[AtmRecord]) -> ReconciliationReport {
    CatalogReconciler::new(catalog.to_vec()).reconcile(persisted)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::reference_catalog;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};

    fn by_id(records: &[AtmRecord]) -> HashMap<String, AtmRecord> {
        records.iter().map(|r| (r.id.clone(), r.clone())).collect()
    }

    fn to_values(records: &[AtmRecord]) -> Vec<Value> {
        records
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_persisted_yields_catalog() {
        let catalog = reference_catalog();
        let report = reconcile(&[], &catalog);

        assert_eq!(report.records.len(), 6);
        assert_eq!(report.catalog_appended, 6);
        assert!(report.is_clean());
        assert_eq!(by_id(&report.records), by_id(&catalog));
    }

    #[test]
    fn test_catalog_is_always_a_subset() {
        let catalog = reference_catalog();
        let persisted = vec![
            json!({"id": "ATM002", "monthly_volume": 2000}),
            json!({"id": "NEW1", "latitude": 33.6, "longitude": -7.5}),
            json!({"latitude": 1.0}),
            json!({"id": "BROKEN", "latitude": 999, "longitude": 0}),
        ];

        let report = reconcile(&persisted, &catalog);
        let ids: HashSet<&str> = report.ids().into_iter().collect();

        for entry in &catalog {
            assert!(ids.contains(entry.id.as_str()), "missing {}", entry.id);
        }
        assert!(ids.contains("NEW1"));
        assert_eq!(report.records.len(), 7);
    }

    #[test]
    fn test_persisted_fields_override_catalog() {
        let catalog = reference_catalog();
        let persisted = vec![json!({
            "id": "ATM003",
            "monthly_volume": 1800,
            "status": "maintenance"
        })];

        let report = reconcile(&persisted, &catalog);
        let atm = &by_id(&report.records)["ATM003"];

        assert_eq!(atm.monthly_volume, 1800.0);
        assert_eq!(atm.status, AtmStatus::Maintenance);
        // Catalog values survive where not overridden
        assert_eq!(atm.name, "BMCE Bank - CFC");
        assert_eq!(atm.branch_location.as_deref(), Some("Centre Financier"));
        assert_eq!(atm.services.len(), 5);
        assert_eq!(report.merged_with_catalog, 1);
        assert_eq!(report.catalog_appended, 5);
    }

    #[test]
    fn test_identity_never_overridden() {
        let catalog = reference_catalog();
        let persisted = vec![json!({"idatm": "ATM001", "id": "", "name": "Renamed"})];

        let report = reconcile(&persisted, &catalog);
        let atm = &by_id(&report.records)["ATM001"];

        assert_eq!(atm.id, "ATM001");
        assert_eq!(atm.name, "Renamed");
        assert_eq!(report.records.len(), 6);
    }

    #[test]
    fn test_legacy_identity_key() {
        let persisted = vec![
            json!({"idatm": "LEG1", "latitude": 33.0, "longitude": -7.0}),
            json!({"idatm": 42, "latitude": 34.0, "longitude": -6.0}),
        ];

        let report = reconcile(&persisted, &[]);
        let ids: HashSet<&str> = report.ids().into_iter().collect();

        assert_eq!(ids, HashSet::from(["LEG1", "42"]));
    }

    #[test]
    fn test_record_without_identity_is_dropped_silently() {
        let persisted = vec![
            json!({"name": "nobody", "latitude": 33.0, "longitude": -7.0}),
            json!("not an object"),
            json!({"id": "OK1", "latitude": 33.0, "longitude": -7.0}),
        ];

        let report = reconcile(&persisted, &[]);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.dropped_without_identity, 2);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_out_of_range_record_rejected_others_kept() {
        let catalog = reference_catalog();
        let persisted = vec![
            json!({"id": "GOOD1", "latitude": 33.0, "longitude": -7.0}),
            json!({"id": "BAD1", "latitude": 999, "longitude": -7.0}),
            json!({"id": "GOOD2", "latitude": 34.0, "longitude": -6.0}),
        ];

        let report = reconcile(&persisted, &catalog);
        let ids: HashSet<&str> = report.ids().into_iter().collect();

        assert_eq!(report.records.len(), 8);
        assert!(ids.contains("GOOD1"));
        assert!(ids.contains("GOOD2"));
        assert!(!ids.contains("BAD1"));

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(report.rejected[0].id, "BAD1");
        assert!(report.rejected[0].reason.contains("latitude"));
    }

    #[test]
    fn test_type_errors_rejected() {
        let persisted = vec![
            json!({"id": "T1", "latitude": "north", "longitude": -7.0}),
            json!({"id": "T2", "latitude": 33.0, "longitude": -7.0, "status": "exploded"}),
            json!({"id": "T3", "latitude": 33.0, "longitude": -7.0, "monthly_volume": -10}),
        ];

        let report = reconcile(&persisted, &[]);

        assert!(report.records.is_empty());
        assert_eq!(report.rejected.len(), 3);
    }

    #[test]
    fn test_catalog_entry_rejected_by_override_is_restored() {
        let catalog = reference_catalog();
        let persisted = vec![json!({"id": "ATM004", "longitude": 500})];

        let report = reconcile(&persisted, &catalog);
        let atm = &by_id(&report.records)["ATM004"];

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(atm.longitude, -7.6156);
    }

    #[test]
    fn test_unknown_record_needs_coordinates() {
        let report = reconcile(&[json!({"id": "NOCOORD", "monthly_volume": 10})], &[]);

        assert!(report.records.is_empty());
        assert!(report.rejected[0].reason.contains("missing latitude"));
    }

    #[test]
    fn test_unknown_record_gets_defaults() {
        let report = reconcile(
            &[json!({"id": "MIN1", "name": "Stray label", "latitude": 33.0, "longitude": -7.0})],
            &[],
        );
        let atm = &report.records[0];

        assert_eq!(atm.name, "MIN1");
        assert_eq!(atm.monthly_volume, 1000.0);
        assert_eq!(atm.status, AtmStatus::Active);
        assert_eq!(atm.city, "Unknown");
        assert_eq!(atm.region, "Unknown");
    }

    #[test]
    fn test_later_duplicate_wins() {
        let persisted = vec![
            json!({"id": "DUP", "latitude": 33.0, "longitude": -7.0, "monthly_volume": 100}),
            json!({"id": "OTHER", "latitude": 33.1, "longitude": -7.1}),
            json!({"id": "DUP", "latitude": 33.0, "longitude": -7.0, "monthly_volume": 900}),
        ];

        let report = reconcile(&persisted, &[]);

        assert_eq!(report.records.len(), 2);
        assert_eq!(by_id(&report.records)["DUP"].monthly_volume, 900.0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let catalog = reference_catalog();
        let persisted = vec![
            json!({"id": "ATM001", "status": "inactive", "monthly_volume": 1500}),
            json!({"idatm": "X9", "latitude": 35.7, "longitude": -5.8, "city": "Tanger"}),
            json!({"id": "BAD", "latitude": -300, "longitude": 0}),
            json!({"id": "X9", "latitude": 35.71, "longitude": -5.81}),
        ];

        let first = reconcile(&persisted, &catalog);
        let second = reconcile(&to_values(&first.records), &catalog);

        assert_eq!(by_id(&first.records), by_id(&second.records));
        assert!(second.is_clean());
        assert_eq!(second.catalog_appended, 0);
    }

    #[test]
    fn test_reconciler_reuses_catalog_index() {
        let reconciler = CatalogReconciler::with_reference_catalog();
        assert_eq!(reconciler.catalog().len(), 6);

        let report = reconciler.reconcile(&[json!({"id": "ATM006", "city": "Casa"})]);
        assert_eq!(by_id(&report.records)["ATM006"].city, "Casa");
        assert!(report.summary().contains("6 ATMs"));
    }
}
