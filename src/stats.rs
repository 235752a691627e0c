// 📊 Network statistics over one registry snapshot

use crate::entities::{AtmRecord, AtmStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub count: usize,
    pub volume: f64,
    pub avg_volume: f64,
    pub cities: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active: usize,
    pub inactive: usize,
    pub maintenance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_atms: usize,
    pub by_status: StatusCounts,
    pub total_monthly_volume: f64,
    /// Rounded to whole units
    pub average_volume_per_atm: f64,
    pub cities_covered: usize,
    pub regions_covered: usize,
    pub regional_analysis: BTreeMap<String, RegionStats>,
    pub by_bank: BTreeMap<String, usize>,
    pub computed_at: DateTime<Utc>,
}

impl NetworkStats {
    pub fn from_records(records: &[AtmRecord]) -> Self {
        let mut by_status = StatusCounts::default();
        let mut regions: BTreeMap<String, RegionStats> = BTreeMap::new();
        let mut by_bank: BTreeMap<String, usize> = BTreeMap::new();
        let mut cities: BTreeSet<&str> = BTreeSet::new();
        let mut total_volume = 0.0;

        for atm in records {
            match atm.status {
                AtmStatus::Active => by_status.active += 1,
                AtmStatus::Inactive => by_status.inactive += 1,
                AtmStatus::Maintenance => by_status.maintenance += 1,
            }

            total_volume += atm.monthly_volume;
            cities.insert(atm.city.as_str());

            let region = regions.entry(atm.region.clone()).or_default();
            region.count += 1;
            region.volume += atm.monthly_volume;
            region.cities.insert(atm.city.clone());

            let bank = atm.bank_name.as_deref().unwrap_or("Unknown");
            *by_bank.entry(bank.to_string()).or_insert(0) += 1;
        }

        for region in regions.values_mut() {
            region.avg_volume = region.volume / region.count as f64;
        }

        let average = if records.is_empty() {
            0.0
        } else {
            (total_volume / records.len() as f64).round()
        };

        NetworkStats {
            total_atms: records.len(),
            by_status,
            total_monthly_volume: total_volume,
            average_volume_per_atm: average,
            cities_covered: cities.len(),
            regions_covered: regions.len(),
            regional_analysis: regions,
            by_bank,
            computed_at: Utc::now(),
        }
    }
}
