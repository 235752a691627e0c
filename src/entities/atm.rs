// 🏧 ATM Entity - Stable identity + typed field defaults
//
// "The ATM id is IDENTITY (never overridden), everything else is a VALUE"
//
// Problem solved:
// - Persisted snapshots carry loosely-typed records with missing fields
// - Every field has one explicit default, applied once at construction
// - Coordinates and volume are validated once, never re-checked downstream

use crate::error::{AtmError, AtmResult};
use crate::geo::{is_valid_latitude, is_valid_longitude};
use serde::{Deserialize, Serialize};

/// Nominal monthly volume used when a record doesn't carry one
pub const DEFAULT_MONTHLY_VOLUME: f64 = 1000.0;

/// Label used for missing city/region
pub const UNKNOWN_LOCATION: &str = "Unknown";

// ============================================================================
// ATM STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtmStatus {
    /// Serving customers, competes for volume
    #[default]
    Active,

    /// Switched off
    Inactive,

    /// Temporarily out of service
    Maintenance,
}

impl AtmStatus {
    pub const ALL: [AtmStatus; 3] = [AtmStatus::Active, AtmStatus::Maintenance, AtmStatus::Inactive];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtmStatus::Active => "active",
            AtmStatus::Inactive => "inactive",
            AtmStatus::Maintenance => "maintenance",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AtmStatus::Active)
    }
}

impl std::fmt::Display for AtmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ATM RECORD
// ============================================================================

/// One deployed or catalogued ATM
///
/// Identity: `id` (unique within the registry)
/// Values: everything else (can be overridden by a persisted snapshot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AtmRecordInput")]
pub struct AtmRecord {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: String,

    // ========================================================================
    // CORE VALUES
    // ========================================================================
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub monthly_volume: f64,
    pub status: AtmStatus,
    pub city: String,
    pub region: String,

    // ========================================================================
    // DESCRIPTIVE (catalog-sourced, carried through merges)
    // ========================================================================
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,

    /// "fixed" or "portable"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_location: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

/// Accepted JSON shape: everything but identity and coordinates is optional
#[derive(Deserialize)]
struct AtmRecordInput {
    id: String,
    #[serde(default)]
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_monthly_volume")]
    monthly_volume: f64,
    #[serde(default)]
    status: AtmStatus,
    #[serde(default = "default_location")]
    city: String,
    #[serde(default = "default_location")]
    region: String,
    #[serde(default)]
    bank_name: Option<String>,
    #[serde(default)]
    installation_type: Option<String>,
    #[serde(default)]
    branch_location: Option<String>,
    #[serde(default)]
    services: Vec<String>,
}

impl From<AtmRecordInput> for AtmRecord {
    fn from(input: AtmRecordInput) -> Self {
        // Missing or blank name falls back to the id
        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| input.id.clone());

        AtmRecord {
            id: input.id,
            name,
            latitude: input.latitude,
            longitude: input.longitude,
            monthly_volume: input.monthly_volume,
            status: input.status,
            city: input.city,
            region: input.region,
            bank_name: input.bank_name,
            installation_type: input.installation_type,
            branch_location: input.branch_location,
            services: input.services,
        }
    }
}

// Helper functions for serde defaults
fn default_monthly_volume() -> f64 {
    DEFAULT_MONTHLY_VOLUME
}

fn default_location() -> String {
    UNKNOWN_LOCATION.to_string()
}

impl AtmRecord {
    /// Create a record with every optional field at its default
    ///
    /// The name falls back to the id.
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        let id = id.into();
        AtmRecord {
            name: id.clone(),
            id,
            latitude,
            longitude,
            monthly_volume: DEFAULT_MONTHLY_VOLUME,
            status: AtmStatus::Active,
            city: default_location(),
            region: default_location(),
            bank_name: None,
            installation_type: None,
            branch_location: None,
            services: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_volume(mut self, monthly_volume: f64) -> Self {
        self.monthly_volume = monthly_volume;
        self
    }

    pub fn with_status(mut self, status: AtmStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_location(mut self, city: impl Into<String>, region: impl Into<String>) -> Self {
        self.city = city.into();
        self.region = region.into();
        self
    }

    pub fn with_bank(mut self, bank_name: impl Into<String>) -> Self {
        self.bank_name = Some(bank_name.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Check identity, coordinate ranges and volume
    pub fn validate(&self) -> AtmResult<()> {
        if self.id.trim().is_empty() {
            return Err(AtmError::MissingIdentity);
        }

        if !is_valid_latitude(self.latitude) {
            return Err(AtmError::invalid_record(
                &self.id,
                format!("latitude {} outside [-90, 90]", self.latitude),
            ));
        }

        if !is_valid_longitude(self.longitude) {
            return Err(AtmError::invalid_record(
                &self.id,
                format!("longitude {} outside [-180, 180]", self.longitude),
            ));
        }

        if !self.monthly_volume.is_finite() || self.monthly_volume < 0.0 {
            return Err(AtmError::invalid_record(
                &self.id,
                format!("monthly_volume {} must be a non-negative number", self.monthly_volume),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
