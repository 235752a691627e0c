use anyhow::{bail, Context, Result};
use std::env;
use std::sync::Arc;

use atm_siting::{
    init_logging, AnalyzerConfig, AtmService, AtmStore, CandidateLocation, CatalogReconciler, Config,
    HeuristicPredictor, JsonFileStore,
};

const USAGE: &str = "usage: atm-siting <reconcile [file] | assess <lat> <lon> | stats>";

fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    init_logging(config.log_format);

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("reconcile") => run_reconcile(&config, args.get(2).map(String::as_str))?,
        Some("assess") => {
            let (lat, lon) = match (args.get(2), args.get(3)) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => bail!(USAGE),
            };
            let lat: f64 = lat.parse().with_context(|| format!("Invalid latitude `{}`", lat))?;
            let lon: f64 = lon.parse().with_context(|| format!("Invalid longitude `{}`", lon))?;
            run_assess(&config, lat, lon)?;
        }
        Some("stats") => run_stats(&config)?,
        _ => bail!(USAGE),
    }

    Ok(())
}

fn run_reconcile(config: &Config, file: Option<&str>) -> Result<()> {
    let store = match file {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::new(&config.data_file),
    };

    println!("🔄 Reconciling {:?} against the reference catalog", store.path());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let persisted = store
        .load()
        .with_context(|| format!("Failed to read {:?}", store.path()))?;
    println!("✓ Loaded {} persisted records", persisted.len());

    let report = CatalogReconciler::with_reference_catalog().reconcile(&persisted);

    println!("\n📋 {}", report.summary());
    for atm in &report.records {
        println!(
            "   {:<16} {:<12} {:>8.0}/month  {}, {}",
            atm.id, atm.status.as_str(), atm.monthly_volume, atm.city, atm.region
        );
    }

    if !report.rejected.is_empty() {
        println!("\n⚠️  Rejected:");
        for rejected in &report.rejected {
            println!("   #{} {}: {}", rejected.index, rejected.id, rejected.reason);
        }
    }

    Ok(())
}

fn open_service(config: &Config) -> Result<AtmService> {
    let store: Arc<dyn AtmStore> = Arc::new(JsonFileStore::new(&config.data_file));
    let service = AtmService::initialize(
        store,
        HeuristicPredictor::new(),
        AnalyzerConfig::with_radius(config.influence_radius_km),
    )?;
    Ok(service)
}

fn run_assess(config: &Config, latitude: f64, longitude: f64) -> Result<()> {
    let service = open_service(config)?;

    let assessment = service
        .assess(&CandidateLocation::at(latitude, longitude))
        .context("Assessment failed")?;

    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let service = open_service(config)?;

    println!("{}", serde_json::to_string_pretty(&service.stats())?);
    Ok(())
}
