// 📚 Reference Catalog - known ATMs compiled into the binary
//
// The catalog is constant data injected into the reconciler, never mutated.
// `POTENTIAL_SITES` feeds the refresher's simulated network growth.

use crate::entities::{AtmRecord, AtmStatus};

/// Static description of a catalogued ATM
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub monthly_volume: f64,
    pub city: &'static str,
    pub region: &'static str,
    pub bank_name: &'static str,
    pub installation_type: Option<&'static str>,
    pub branch_location: Option<&'static str>,
    pub services: &'static [&'static str],
}

impl CatalogEntry {
    pub fn to_record(&self) -> AtmRecord {
        AtmRecord {
            id: self.id.to_string(),
            name: self.name.to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            monthly_volume: self.monthly_volume,
            status: AtmStatus::Active,
            city: self.city.to_string(),
            region: self.region.to_string(),
            bank_name: Some(self.bank_name.to_string()),
            installation_type: self.installation_type.map(str::to_string),
            branch_location: self.branch_location.map(str::to_string),
            services: self.services.iter().map(|s| s.to_string()).collect(),
        }
    }
}

const CASABLANCA: &str = "Casablanca";
const CASA_SETTAT: &str = "Casablanca-Settat";

pub const REFERENCE_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "ATM001",
        name: "Attijariwafa Bank - Maarif",
        latitude: 33.5731,
        longitude: -7.5898,
        monthly_volume: 1200.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "Attijariwafa Bank",
        installation_type: Some("fixed"),
        branch_location: Some("Agence Maarif"),
        services: &["retrait", "depot", "consultation", "virement"],
    },
    CatalogEntry {
        id: "ATM002",
        name: "Banque Populaire - Anfa",
        latitude: 33.5891,
        longitude: -7.6031,
        monthly_volume: 950.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "Banque Populaire",
        installation_type: Some("fixed"),
        branch_location: Some("Agence Anfa"),
        services: &["retrait", "depot", "consultation"],
    },
    CatalogEntry {
        id: "ATM003",
        name: "BMCE Bank - CFC",
        latitude: 33.5642,
        longitude: -7.5756,
        monthly_volume: 1400.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "BMCE Bank",
        installation_type: Some("fixed"),
        branch_location: Some("Centre Financier"),
        services: &["retrait", "depot", "consultation", "virement", "change"],
    },
    CatalogEntry {
        id: "ATM004",
        name: "Crédit du Maroc - Gauthier",
        latitude: 33.5923,
        longitude: -7.6156,
        monthly_volume: 800.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "Crédit du Maroc",
        installation_type: Some("portable"),
        branch_location: Some("Centre Commercial Gauthier"),
        services: &["retrait", "consultation"],
    },
    CatalogEntry {
        id: "ATM005",
        name: "CIH Bank - Ain Diab",
        latitude: 33.5534,
        longitude: -7.5634,
        monthly_volume: 1100.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "CIH Bank",
        installation_type: Some("fixed"),
        branch_location: Some("Corniche Ain Diab"),
        services: &["retrait", "depot", "consultation"],
    },
    CatalogEntry {
        id: "ATM006",
        name: "BMCI - Twin Center",
        latitude: 33.5831,
        longitude: -7.5998,
        monthly_volume: 1350.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "BMCI",
        installation_type: Some("fixed"),
        branch_location: Some("Twin Center"),
        services: &["retrait", "depot", "consultation", "virement"],
    },
];

pub const POTENTIAL_SITES: &[CatalogEntry] = &[
    CatalogEntry {
        id: "SAHAMCASA_NEW",
        name: "Saham Bank - Casablanca",
        latitude: 33.59,
        longitude: -7.61,
        monthly_volume: 1800.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "Saham Bank",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
    CatalogEntry {
        id: "SGCASA_NEW",
        name: "Société Générale Maroc - Casablanca",
        latitude: 33.58,
        longitude: -7.62,
        monthly_volume: 1200.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "Société Générale Maroc",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
    CatalogEntry {
        id: "SAHAMRABAT_NEW",
        name: "Saham Bank - Rabat",
        latitude: 34.025,
        longitude: -6.835,
        monthly_volume: 1750.0,
        city: "Rabat",
        region: "Rabat-Salé-Kénitra",
        bank_name: "Saham Bank",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
    CatalogEntry {
        id: "SAHAMMARRA_NEW",
        name: "Saham Bank - Marrakech",
        latitude: 31.64,
        longitude: -8.02,
        monthly_volume: 1600.0,
        city: "Marrakech",
        region: "Marrakech-Safi",
        bank_name: "Saham Bank",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
    CatalogEntry {
        id: "SGMARRA_NEW",
        name: "Société Générale Maroc - Marrakech",
        latitude: 31.625,
        longitude: -7.99,
        monthly_volume: 1150.0,
        city: "Marrakech",
        region: "Marrakech-Safi",
        bank_name: "Société Générale Maroc",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
    CatalogEntry {
        id: "BMCI_NEW",
        name: "BMCI - Casablanca",
        latitude: 33.55,
        longitude: -7.55,
        monthly_volume: 900.0,
        city: CASABLANCA,
        region: CASA_SETTAT,
        bank_name: "BMCI",
        installation_type: None,
        branch_location: None,
        services: &[],
    },
];

/// The reference catalog as records
pub fn reference_catalog() -> Vec<AtmRecord> {
    REFERENCE_CATALOG.iter().map(CatalogEntry::to_record).collect()
}

/// Sites the refresher may open during simulated growth
pub fn potential_sites() -> Vec<AtmRecord> {
    POTENTIAL_SITES.iter().map(CatalogEntry::to_record).collect()
}
