// 🏦 ATM Service - registry + analyzer + predictor behind one façade
//
// Invariant: the installed analyzer is rebuilt after every registry change
// this service makes. A rebuild snapshots the registry while holding the
// analyzer lock, so a later rebuild can never install an older snapshot.

use crate::cannibalization::{AnalyzerConfig, CannibalizationAnalyzer, CannibalizationResult};
use crate::entities::{AtmRecord, CandidateLocation};
use crate::error::AtmResult;
use crate::predictor::VolumePredictor;
use crate::reconciliation::{CatalogReconciler, ReconciliationReport};
use crate::registry::AtmRegistry;
use crate::stats::NetworkStats;
use crate::store::AtmStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// Attenuate the predictor's score by cannibalization risk
///
/// Risk 100 halves the score, risk 0 leaves it unchanged; never negative.
pub fn adjusted_score(global_score: f64, cannibalization_risk: f64) -> f64 {
    (global_score * (1.0 - cannibalization_risk / 200.0)).max(0.0)
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAssessment {
    pub predicted_volume: f64,
    pub roi_probability: f64,
    pub roi_prediction: bool,
    /// Predictor score after cannibalization attenuation
    pub global_score: f64,
    pub raw_global_score: f64,
    pub reason_codes: Vec<String>,
    pub recommendation: String,
    pub canibalization_analysis: CannibalizationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmListing {
    pub atms: Vec<AtmRecord>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOutcome {
    pub atm: AtmRecord,
    pub replaced: bool,
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub models_loaded: bool,
    pub atms_count: usize,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct AtmService {
    registry: AtmRegistry,
    analyzer: RwLock<Arc<CannibalizationAnalyzer>>,
    analyzer_config: AnalyzerConfig,
    predictor: Box<dyn VolumePredictor>,
}

impl AtmService {
    /// Train the predictor once, then load and index the registry
    pub fn initialize<P>(
        store: Arc<dyn AtmStore>,
        mut predictor: P,
        analyzer_config: AnalyzerConfig,
    ) -> AtmResult<Self>
    where
        P: VolumePredictor + 'static,
    {
        info!("Training predictor...");
        predictor.train()?;

        let service = AtmService {
            registry: AtmRegistry::new(store, CatalogReconciler::with_reference_catalog()),
            analyzer: RwLock::new(Arc::new(CannibalizationAnalyzer::new(analyzer_config))),
            analyzer_config,
            predictor: Box::new(predictor),
        };

        info!("Loading ATM data...");
        service.reload();

        Ok(service)
    }

    pub fn registry(&self) -> &AtmRegistry {
        &self.registry
    }

    /// The analyzer currently installed
    pub fn analyzer(&self) -> Arc<CannibalizationAnalyzer> {
        Arc::clone(&self.analyzer.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Build a fresh analyzer from the current registry snapshot and install it
    pub fn rebuild_analyzer(&self) -> Arc<CannibalizationAnalyzer> {
        let mut installed = self.analyzer.write().unwrap_or_else(|e| e.into_inner());

        let snapshot = self.registry.snapshot();
        let analyzer = Arc::new(CannibalizationAnalyzer::from_records(
            self.analyzer_config,
            snapshot.iter(),
        ));
        *installed = Arc::clone(&analyzer);

        info!(
            indexed = analyzer.indexed_count(),
            active = analyzer.active_count(),
            "Cannibalization analyzer rebuilt"
        );
        analyzer
    }

    pub fn reload(&self) -> ReconciliationReport {
        let report = self.registry.reload();
        self.rebuild_analyzer();
        report
    }

    /// Predict a candidate site and attenuate it by cannibalization risk
    pub fn assess(&self, candidate: &CandidateLocation) -> AtmResult<SiteAssessment> {
        candidate.validate()?;

        let prediction = self.predictor.predict(candidate)?;
        let risk = self.analyzer().calculate(candidate);

        Ok(SiteAssessment {
            predicted_volume: prediction.predicted_volume,
            roi_probability: prediction.roi_probability,
            roi_prediction: prediction.roi_prediction,
            global_score: adjusted_score(prediction.global_score, risk.cannibalization_risk),
            raw_global_score: prediction.global_score,
            reason_codes: prediction.reason_codes,
            recommendation: prediction.recommendation,
            canibalization_analysis: risk,
        })
    }

    /// Insert or replace an ATM, re-index, then persist the new snapshot
    ///
    /// A failed write is logged and reported; the in-memory change stays.
    pub fn add_atm(&self, record: AtmRecord) -> AtmResult<AddOutcome> {
        let replaced = self.registry.insert_or_replace(record.clone())?.is_some();
        self.rebuild_analyzer();

        let persisted = match self.registry.persist() {
            Ok(()) => true,
            Err(e) => {
                error!(atm_id = %record.id, error = %e, "Could not persist ATM registry");
                false
            }
        };

        info!(atm_id = %record.id, replaced, persisted, "ATM added");
        Ok(AddOutcome {
            atm: record,
            replaced,
            persisted,
        })
    }

    pub fn atms(&self) -> AtmListing {
        let snapshot = self.registry.snapshot();
        AtmListing {
            total_count: snapshot.len(),
            atms: snapshot.as_ref().clone(),
        }
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats::from_records(&self.registry.snapshot())
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            models_loaded: self.predictor.is_trained(),
            atms_count: self.registry.len(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
