// 🤖 Volume / ROI predictor - collaborator seam
//
// The site assessment only needs `train()` once and `predict()` afterwards.
// `HeuristicPredictor` is a deterministic weighted scorer standing in for a
// trained model:
//
//   global = w_pop·P + w_inc·I + w_acc·A + w_comp·C + w_infra·F   (0-100)

use crate::entities::CandidateLocation;
use crate::error::{AtmError, AtmResult};
use serde::{Deserialize, Serialize};

/// Prediction for one candidate site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_volume: f64,
    pub roi_probability: f64,
    pub roi_prediction: bool,
    pub global_score: f64,
    pub reason_codes: Vec<String>,
    pub recommendation: String,
}

pub trait VolumePredictor: Send + Sync {
    /// Prepare the model; calling it again is a no-op
    fn train(&mut self) -> AtmResult<()>;

    fn is_trained(&self) -> bool;

    fn predict(&self, candidate: &CandidateLocation) -> AtmResult<Prediction>;
}

// ============================================================================
// SCORING WEIGHTS
// ============================================================================

/// Sum = 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub population: f64,
    pub income: f64,
    pub accessibility: f64,
    pub competition: f64,
    pub infrastructure: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            population: 0.25,
            income: 0.15,
            accessibility: 0.20,
            competition: 0.20,
            infrastructure: 0.20,
        }
    }
}

/// Per-category scores, each 0-100
#[derive(Debug, Clone, Copy, PartialEq)]
struct CategoryScores {
    population: f64,
    income: f64,
    accessibility: f64,
    competition: f64,
    infrastructure: f64,
}

// Normalization anchors
const POPULATION_SATURATION: f64 = 5000.0;
const OPTIMAL_INCOME: f64 = 50000.0;
const PENALTY_PER_COMPETITOR: f64 = 15.0;

// Volume model: base + slope * score
const BASE_VOLUME: f64 = 400.0;
const VOLUME_PER_POINT: f64 = 20.0;

// ============================================================================
// HEURISTIC PREDICTOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct HeuristicPredictor {
    weights: ScoringWeights,
    trained: bool,
}

impl HeuristicPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        HeuristicPredictor {
            weights,
            trained: false,
        }
    }

    fn category_scores(c: &CandidateLocation) -> CategoryScores {
        let population = (c.population_density / POPULATION_SATURATION * 100.0).min(100.0);
        let income = (c.income_level / OPTIMAL_INCOME * 100.0).min(100.0);

        let mut accessibility = c.foot_traffic_score * 0.5 + c.accessibility_score * 3.0;
        if c.parking_availability {
            accessibility += 10.0;
        }
        if c.public_transport_nearby {
            accessibility += 10.0;
        }

        let competition = (100.0 - c.competitor_atms_500m as f64 * PENALTY_PER_COMPETITOR).max(0.0);

        let mut infrastructure = (c.commercial_poi_count as f64 * 3.0).min(60.0);
        if c.business_district {
            infrastructure += 25.0;
        }
        if c.residential_area {
            infrastructure += 15.0;
        }

        CategoryScores {
            population,
            income,
            accessibility: accessibility.min(100.0),
            competition,
            infrastructure: infrastructure.min(100.0),
        }
    }

    fn reason_codes(c: &CandidateLocation, s: &CategoryScores) -> Vec<String> {
        let mut codes = Vec::new();

        if s.population >= 80.0 {
            codes.push("HIGH_POPULATION_DENSITY");
        } else if s.population <= 30.0 {
            codes.push("LOW_POPULATION_DENSITY");
        }
        if s.income >= 90.0 {
            codes.push("HIGH_INCOME_AREA");
        }
        if c.competitor_atms_500m >= 4 {
            codes.push("STRONG_COMPETITION");
        } else if c.competitor_atms_500m <= 1 {
            codes.push("LOW_COMPETITION");
        }
        if s.accessibility >= 75.0 {
            codes.push("EXCELLENT_ACCESSIBILITY");
        } else if s.accessibility <= 35.0 {
            codes.push("POOR_ACCESSIBILITY");
        }
        if c.business_district {
            codes.push("BUSINESS_DISTRICT");
        }
        if c.commercial_poi_count >= 20 {
            codes.push("COMMERCIAL_HUB");
        }

        codes.into_iter().map(String::from).collect()
    }

    fn recommendation(global_score: f64) -> &'static str {
        if global_score >= 75.0 {
            "Highly recommended"
        } else if global_score >= 55.0 {
            "Recommended"
        } else if global_score >= 40.0 {
            "Consider with caution"
        } else {
            "Not recommended"
        }
    }
}

impl VolumePredictor for HeuristicPredictor {
    fn train(&mut self) -> AtmResult<()> {
        self.trained = true;
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn predict(&self, candidate: &CandidateLocation) -> AtmResult<Prediction> {
        if !self.trained {
            return Err(AtmError::PredictorNotTrained);
        }
        candidate.validate()?;

        let s = Self::category_scores(candidate);
        let w = &self.weights;
        let global_score = (w.population * s.population
            + w.income * s.income
            + w.accessibility * s.accessibility
            + w.competition * s.competition
            + w.infrastructure * s.infrastructure)
            .clamp(0.0, 100.0);

        let roi_probability = 1.0 / (1.0 + (-(global_score - 50.0) / 10.0).exp());

        Ok(Prediction {
            predicted_volume: (BASE_VOLUME + VOLUME_PER_POINT * global_score).round(),
            roi_probability,
            roi_prediction: roi_probability >= 0.5,
            global_score,
            reason_codes: Self::reason_codes(candidate, &s),
            recommendation: Self::recommendation(global_score).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> HeuristicPredictor {
        let mut p = HeuristicPredictor::new();
        p.train().unwrap();
        p
    }

    #[test]
    fn test_predict_before_train_fails() {
        let p = HeuristicPredictor::new();
        let err = p.predict(&CandidateLocation::at(33.5, -7.6)).unwrap_err();
        assert!(matches!(err, AtmError::PredictorNotTrained));
    }

    #[test]
    fn test_train_is_idempotent() {
        let mut p = HeuristicPredictor::new();
        p.train().unwrap();
        p.train().unwrap();
        assert!(p.is_trained());
    }

    #[test]
    fn test_default_candidate_prediction() {
        let prediction = trained().predict(&CandidateLocation::at(33.5, -7.6)).unwrap();

        // 0.25*20 + 0.15*90 + 0.2*66 + 0.2*70 + 0.2*45
        assert!((prediction.global_score - 54.7).abs() < 1e-9);
        assert_eq!(prediction.predicted_volume, 1494.0);
        assert!(prediction.roi_prediction);
        assert!(prediction.roi_probability > 0.5 && prediction.roi_probability < 1.0);
        assert_eq!(prediction.recommendation, "Consider with caution");
        assert!(prediction.reason_codes.contains(&"LOW_POPULATION_DENSITY".to_string()));
        assert!(prediction.reason_codes.contains(&"HIGH_INCOME_AREA".to_string()));
    }

    #[test]
    fn test_better_site_scores_higher() {
        let p = trained();
        let base = CandidateLocation::at(33.5, -7.6);
        let mut prime = base.clone();
        prime.population_density = 8000.0;
        prime.competitor_atms_500m = 0;
        prime.business_district = true;
        prime.commercial_poi_count = 25;
        prime.foot_traffic_score = 90.0;

        let base_score = p.predict(&base).unwrap().global_score;
        let prime_prediction = p.predict(&prime).unwrap();

        assert!(prime_prediction.global_score > base_score);
        assert!(prime_prediction.global_score <= 100.0);
        assert!(prime_prediction.reason_codes.contains(&"LOW_COMPETITION".to_string()));
        assert!(prime_prediction.reason_codes.contains(&"COMMERCIAL_HUB".to_string()));
    }

    #[test]
    fn test_invalid_candidate_rejected() {
        let err = trained().predict(&CandidateLocation::at(91.0, 0.0)).unwrap_err();
        assert!(matches!(err, AtmError::InvalidCandidate(_)));
    }
}
