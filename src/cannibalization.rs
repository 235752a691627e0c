// 🎯 Cannibalization Risk Analyzer - distance-decay overlap with existing ATMs
//
// For each active ATM within the influence radius R:
//
//   contribution = MAX_NEIGHBOR_RISK * (1 - d / R) * (volume / network_average)
//
// Strictly decreasing in d, exactly zero at d >= R. The sum is clamped to
// [0, 100]. Inactive and maintenance ATMs stay indexed but never compete.
//
// The analyzer holds no reference to the registry: build a new one from each
// fresh snapshot instead of patching an existing index.

use crate::entities::{AtmRecord, CandidateLocation};
use crate::geo::haversine_km;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_INFLUENCE_RADIUS_KM: f64 = 2.0;

/// Risk contributed by one average-volume neighbor at distance zero
pub const MAX_NEIGHBOR_RISK: f64 = 50.0;

pub const MAX_RISK: f64 = 100.0;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub influence_radius_km: f64,
    pub max_neighbor_risk: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            influence_radius_km: DEFAULT_INFLUENCE_RADIUS_KM,
            max_neighbor_risk: MAX_NEIGHBOR_RISK,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_radius(influence_radius_km: f64) -> Self {
        Self {
            influence_radius_km,
            ..Self::default()
        }
    }

    /// Linear distance decay: 1 at d = 0, 0 at d >= radius
    pub fn decay(&self, distance_km: f64) -> f64 {
        if distance_km >= self.influence_radius_km {
            0.0
        } else {
            1.0 - distance_km.max(0.0) / self.influence_radius_km
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,      // < 25
    Moderate, // 25-60
    High,     // >= 60
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedAtm {
    pub id: String,
    pub distance_km: f64,
    pub impact_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannibalizationResult {
    #[serde(rename = "canibalization_risk")]
    pub cannibalization_risk: f64,

    /// Sorted by descending impact, then ascending distance, then id
    pub affected_atms: Vec<AffectedAtm>,

    /// Closest active ATM, if any
    pub nearest_distance_km: Option<f64>,

    pub atms_in_radius: usize,
    pub risk_level: RiskLevel,
}

// ============================================================================
// ANALYZER
// ============================================================================

#[derive(Debug, Clone)]
struct IndexedAtm {
    id: String,
    latitude: f64,
    longitude: f64,
    monthly_volume: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CannibalizationAnalyzer {
    config: AnalyzerConfig,
    competitors: Vec<IndexedAtm>,
    indexed: usize,
    volume_total: f64,
}

impl CannibalizationAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        CannibalizationAnalyzer {
            config,
            ..Self::default()
        }
    }

    /// Index every ATM of a registry snapshot
    pub fn from_records<'a>(config: AnalyzerConfig, records: impl IntoIterator<Item = &'a AtmRecord>) -> Self {
        let mut analyzer = Self::new(config);
        for atm in records {
            analyzer.add_existing_atm(atm);
        }
        analyzer
    }

    pub fn add_existing_atm(&mut self, atm: &AtmRecord) {
        self.indexed += 1;
        if !atm.is_active() {
            return;
        }

        self.volume_total += atm.monthly_volume;
        self.competitors.push(IndexedAtm {
            id: atm.id.clone(),
            latitude: atm.latitude,
            longitude: atm.longitude,
            monthly_volume: atm.monthly_volume,
        });
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// ATMs seen while building, whatever their status
    pub fn indexed_count(&self) -> usize {
        self.indexed
    }

    pub fn active_count(&self) -> usize {
        self.competitors.len()
    }

    /// Mean monthly volume of the active network
    pub fn network_average_volume(&self) -> f64 {
        if self.competitors.is_empty() {
            0.0
        } else {
            self.volume_total / self.competitors.len() as f64
        }
    }

    fn volume_weight(&self, monthly_volume: f64) -> f64 {
        let average = self.network_average_volume();
        if average > 0.0 {
            monthly_volume / average
        } else {
            1.0
        }
    }

    /// Risk contributed by one neighbor at `distance_km`
    pub fn contribution(&self, distance_km: f64, monthly_volume: f64) -> f64 {
        self.config.max_neighbor_risk * self.config.decay(distance_km) * self.volume_weight(monthly_volume)
    }

    pub fn calculate(&self, candidate: &CandidateLocation) -> CannibalizationResult {
        let mut nearest: Option<f64> = None;
        let mut affected = Vec::new();

        for atm in &self.competitors {
            let distance_km = haversine_km(candidate.latitude, candidate.longitude, atm.latitude, atm.longitude);
            nearest = Some(nearest.map_or(distance_km, |n| n.min(distance_km)));

            if distance_km < self.config.influence_radius_km {
                affected.push(AffectedAtm {
                    id: atm.id.clone(),
                    distance_km,
                    impact_weight: self.contribution(distance_km, atm.monthly_volume),
                });
            }
        }

        affected.sort_by(|a, b| {
            b.impact_weight
                .partial_cmp(&a.impact_weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total: f64 = affected.iter().map(|a| a.impact_weight).sum();
        let cannibalization_risk = total.clamp(0.0, MAX_RISK);

        CannibalizationResult {
            cannibalization_risk,
            atms_in_radius: affected.len(),
            affected_atms: affected,
            nearest_distance_km: nearest,
            risk_level: RiskLevel::from_score(cannibalization_risk),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::reference_catalog;
    use crate::entities::AtmStatus;

    // ~0.009 degrees of latitude is ~1 km
    const KM_IN_LAT_DEG: f64 = 1.0 / 111.195;

    fn analyzer(records: &[AtmRecord]) -> CannibalizationAnalyzer {
        CannibalizationAnalyzer::from_records(AnalyzerConfig::default(), records)
    }

    #[test]
    fn test_contribution_strictly_decreasing_and_zero_at_radius() {
        let a = analyzer(&[AtmRecord::new("A", 0.0, 0.0)]);

        let mut previous = f64::INFINITY;
        for step in 0..200 {
            let d = step as f64 * 0.01;
            let c = a.contribution(d, 1000.0);
            assert!(c < previous, "not decreasing at {} km", d);
            assert!(c > 0.0);
            previous = c;
        }

        assert_eq!(a.contribution(2.0, 1000.0), 0.0);
        assert_eq!(a.contribution(2.5, 1000.0), 0.0);
        assert_eq!(a.contribution(500.0, 1000.0), 0.0);
    }

    #[test]
    fn test_candidate_on_top_of_average_atm() {
        let atm = AtmRecord::new("ONLY", 33.5731, -7.5898);
        let result = analyzer(&[atm]).calculate(&CandidateLocation::at(33.5731, -7.5898));

        assert!((result.cannibalization_risk - MAX_NEIGHBOR_RISK).abs() < 1e-9);
        assert_eq!(result.nearest_distance_km, Some(0.0));
        assert_eq!(result.affected_atms.len(), 1);
        assert_eq!(result.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn test_far_candidate_has_no_risk() {
        let records = vec![
            AtmRecord::new("A", 33.0, -7.0),
            AtmRecord::new("B", 33.0 + 0.001, -7.0),
        ];
        // 10 km north of both
        let candidate = CandidateLocation::at(33.0 + 10.0 * KM_IN_LAT_DEG + 0.001, -7.0);

        let result = analyzer(&records).calculate(&candidate);

        assert_eq!(result.cannibalization_risk, 0.0);
        assert!(result.affected_atms.is_empty());
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.nearest_distance_km.unwrap() > 9.9);
    }

    #[test]
    fn test_empty_network() {
        let result = CannibalizationAnalyzer::default().calculate(&CandidateLocation::at(0.0, 0.0));

        assert_eq!(result.cannibalization_risk, 0.0);
        assert!(result.nearest_distance_km.is_none());
        assert_eq!(result.atms_in_radius, 0);
    }

    #[test]
    fn test_inactive_atms_do_not_compete() {
        let records = vec![
            AtmRecord::new("OFF", 33.0, -7.0).with_status(AtmStatus::Inactive),
            AtmRecord::new("FIX", 33.0, -7.0).with_status(AtmStatus::Maintenance),
        ];
        let a = analyzer(&records);
        let result = a.calculate(&CandidateLocation::at(33.0, -7.0));

        assert_eq!(a.indexed_count(), 2);
        assert_eq!(a.active_count(), 0);
        assert_eq!(result.cannibalization_risk, 0.0);
        assert!(result.nearest_distance_km.is_none());
    }

    #[test]
    fn test_high_volume_neighbor_weighs_more() {
        let records = vec![
            AtmRecord::new("BIG", 33.0 + KM_IN_LAT_DEG, -7.0).with_volume(3000.0),
            AtmRecord::new("SMALL", 33.0 - KM_IN_LAT_DEG, -7.0).with_volume(1000.0),
        ];
        let result = analyzer(&records).calculate(&CandidateLocation::at(33.0, -7.0));

        assert_eq!(result.affected_atms[0].id, "BIG");
        assert_eq!(result.affected_atms[1].id, "SMALL");
        let ratio = result.affected_atms[0].impact_weight / result.affected_atms[1].impact_weight;
        assert!((ratio - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_ordering_ties_broken_by_distance_then_id() {
        let records = vec![
            AtmRecord::new("Z", 33.0, -7.0 + 0.005),
            AtmRecord::new("A", 33.0, -7.0 - 0.005),
            AtmRecord::new("NEAR", 33.0, -7.0),
        ];
        let result = analyzer(&records).calculate(&CandidateLocation::at(33.0, -7.0));
        let ids: Vec<&str> = result.affected_atms.iter().map(|a| a.id.as_str()).collect();

        assert_eq!(ids, vec!["NEAR", "A", "Z"]);
    }

    #[test]
    fn test_risk_clamped_in_dense_network() {
        let records: Vec<AtmRecord> = (0..50)
            .map(|i| AtmRecord::new(format!("D{}", i), 33.0 + i as f64 * 0.0001, -7.0))
            .collect();
        let result = analyzer(&records).calculate(&CandidateLocation::at(33.0, -7.0));

        assert_eq!(result.cannibalization_risk, MAX_RISK);
        assert_eq!(result.atms_in_radius, 50);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_risk_bounded_for_reference_network() {
        let a = analyzer(&reference_catalog());
        for (lat, lon) in [(33.5731, -7.5898), (33.58, -7.60), (34.0, -6.8), (-33.0, 151.0)] {
            let risk = a.calculate(&CandidateLocation::at(lat, lon)).cannibalization_risk;
            assert!((0.0..=MAX_RISK).contains(&risk), "risk {} out of bounds", risk);
        }
    }

    #[test]
    fn test_zero_volume_network_uses_unit_weight() {
        let records = vec![AtmRecord::new("Z0", 10.0, 10.0).with_volume(0.0)];
        let result = analyzer(&records).calculate(&CandidateLocation::at(10.0, 10.0));

        // No meaningful average: every neighbor counts as an average one
        assert_eq!(result.affected_atms.len(), 1);
        assert!((result.cannibalization_risk - MAX_NEIGHBOR_RISK).abs() < 1e-9);
        assert!(result.cannibalization_risk.is_finite());
    }

    #[test]
    fn test_result_serializes_wire_field_name() {
        let result = CannibalizationAnalyzer::default().calculate(&CandidateLocation::at(0.0, 0.0));
        let value = serde_json::to_value(&result).unwrap();

        assert!(value.get("canibalization_risk").is_some());
        assert_eq!(value["risk_level"], "low");
    }
}
