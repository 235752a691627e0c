// 📍 Candidate Location - a site under evaluation, not yet deployed

use crate::error::{AtmError, AtmResult};
use crate::geo::{is_valid_latitude, is_valid_longitude};
use serde::{Deserialize, Deserializer, Serialize};

/// Candidate site plus the contextual features the predictor consumes
///
/// Every feature has a documented default used when the caller omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLocation {
    pub latitude: f64,
    pub longitude: f64,

    /// Inhabitants per km² (default: 1000)
    #[serde(default = "defaults::population_density")]
    pub population_density: f64,

    /// Shops, restaurants and offices nearby (default: 10)
    #[serde(default = "defaults::commercial_poi_count")]
    pub commercial_poi_count: u32,

    /// Competitor ATMs within 500 m (default: 2)
    #[serde(default = "defaults::competitor_atms_500m")]
    pub competitor_atms_500m: u32,

    /// 0-100 (default: 50)
    #[serde(default = "defaults::foot_traffic_score")]
    pub foot_traffic_score: f64,

    /// Average yearly income in MAD (default: 45000)
    #[serde(default = "defaults::income_level")]
    pub income_level: f64,

    /// 0-10 (default: 7)
    #[serde(default = "defaults::accessibility_score")]
    pub accessibility_score: f64,

    #[serde(default = "defaults::yes", deserialize_with = "flag")]
    pub parking_availability: bool,

    #[serde(default = "defaults::yes", deserialize_with = "flag")]
    pub public_transport_nearby: bool,

    #[serde(default, deserialize_with = "flag")]
    pub business_district: bool,

    #[serde(default = "defaults::yes", deserialize_with = "flag")]
    pub residential_area: bool,
}

mod defaults {
    pub fn population_density() -> f64 {
        1000.0
    }

    pub fn commercial_poi_count() -> u32 {
        10
    }

    pub fn competitor_atms_500m() -> u32 {
        2
    }

    pub fn foot_traffic_score() -> f64 {
        50.0
    }

    pub fn income_level() -> f64 {
        45000.0
    }

    pub fn accessibility_score() -> f64 {
        7.0
    }

    pub fn yes() -> bool {
        true
    }
}

/// Accept `true`/`false` as well as the `1`/`0` integers older clients send
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "expected 0 or 1, got {}",
            other
        ))),
    }
}

impl CandidateLocation {
    /// Candidate at the given coordinates with every feature at its default
    pub fn at(latitude: f64, longitude: f64) -> Self {
        CandidateLocation {
            latitude,
            longitude,
            population_density: defaults::population_density(),
            commercial_poi_count: defaults::commercial_poi_count(),
            competitor_atms_500m: defaults::competitor_atms_500m(),
            foot_traffic_score: defaults::foot_traffic_score(),
            income_level: defaults::income_level(),
            accessibility_score: defaults::accessibility_score(),
            parking_availability: true,
            public_transport_nearby: true,
            business_district: false,
            residential_area: true,
        }
    }

    /// Reject coordinates out of range and negative/non-finite features
    pub fn validate(&self) -> AtmResult<()> {
        if !is_valid_latitude(self.latitude) {
            return Err(AtmError::InvalidCandidate(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !is_valid_longitude(self.longitude) {
            return Err(AtmError::InvalidCandidate(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }

        let numeric = [
            ("population_density", self.population_density),
            ("foot_traffic_score", self.foot_traffic_score),
            ("income_level", self.income_level),
            ("accessibility_score", self.accessibility_score),
        ];
        for (field, value) in numeric {
            if !value.is_finite() || value < 0.0 {
                return Err(AtmError::InvalidCandidate(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_take_defaults() {
        let c: CandidateLocation =
            serde_json::from_str(r#"{"latitude": 33.58, "longitude": -7.60}"#).unwrap();

        assert_eq!(c, CandidateLocation::at(33.58, -7.60));
        assert_eq!(c.population_density, 1000.0);
        assert_eq!(c.competitor_atms_500m, 2);
        assert!(c.parking_availability);
        assert!(!c.business_district);
    }

    #[test]
    fn test_integer_flags_accepted() {
        let c: CandidateLocation = serde_json::from_str(
            r#"{"latitude": 33.58, "longitude": -7.60, "business_district": 1, "parking_availability": 0}"#,
        )
        .unwrap();

        assert!(c.business_district);
        assert!(!c.parking_availability);
    }

    #[test]
    fn test_flag_out_of_range_rejected() {
        let result: Result<CandidateLocation, _> = serde_json::from_str(
            r#"{"latitude": 33.58, "longitude": -7.60, "residential_area": 7}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_coordinates_required() {
        let result: Result<CandidateLocation, _> = serde_json::from_str(r#"{"latitude": 33.58}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(CandidateLocation::at(33.58, -7.60).validate().is_ok());
        assert!(CandidateLocation::at(120.0, -7.60).validate().is_err());

        let mut c = CandidateLocation::at(33.58, -7.60);
        c.income_level = -1.0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("income_level"));
    }
}
