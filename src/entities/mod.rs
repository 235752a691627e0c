// Entity Models
//
// Each entity has:
// - Stable identity (`id`) that NEVER changes through a merge
// - Typed values with one explicit default per field
// - Validation applied once, at construction

pub mod atm;
pub mod candidate;

pub use atm::{AtmRecord, AtmStatus, DEFAULT_MONTHLY_VOLUME, UNKNOWN_LOCATION};
pub use candidate::CandidateLocation;
