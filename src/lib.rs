// ATM Siting - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod geo;
pub mod entities;        // ATM records + candidate sites
pub mod catalog;         // Reference catalog + potential sites
pub mod reconciliation;  // Persisted data ⨝ reference catalog
pub mod store;           // JSON snapshot persistence
pub mod registry;        // Live, lock-protected ATM collection
pub mod cannibalization; // Distance-weighted overlap risk
pub mod predictor;       // Volume / ROI predictor seam
pub mod stats;
pub mod service;         // Façade used by both binaries
pub mod refresher;       // Background churn simulation
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{AtmError, AtmResult};
pub use entities::{AtmRecord, AtmStatus, CandidateLocation, DEFAULT_MONTHLY_VOLUME};
pub use catalog::{potential_sites, reference_catalog, CatalogEntry, POTENTIAL_SITES, REFERENCE_CATALOG};
pub use reconciliation::{reconcile, CatalogReconciler, ReconciliationReport, RejectedRecord};
pub use store::{AtmStore, JsonFileStore, MemoryStore};
pub use registry::{AtmRegistry, RegistrySnapshot};
pub use cannibalization::{
    AffectedAtm, AnalyzerConfig, CannibalizationAnalyzer, CannibalizationResult, RiskLevel,
    DEFAULT_INFLUENCE_RADIUS_KM,
};
pub use predictor::{HeuristicPredictor, Prediction, ScoringWeights, VolumePredictor};
pub use stats::{NetworkStats, RegionStats, StatusCounts};
pub use service::{adjusted_score, AddOutcome, AtmListing, AtmService, HealthStatus, SiteAssessment};
pub use refresher::{PeriodicRefresher, RefreshOutcome, RefresherConfig};
pub use config::{Config, LogFormat};
pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
