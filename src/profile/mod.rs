//! Citizen profile: the single record of everything the session knows.
//!
//! Any component may read every field. Writes made by the engine go through
//! `Provenance`, which tracks which component owns each field: intake fills
//! empty slots, the conversation answers the fields in its script, and only
//! an explicit correction replaces a trusted value.

pub mod field;
pub mod model;
pub mod provenance;

pub use field::{CasteCategory, FieldValue, Gender, MaritalStatus, ProfileField};
pub use model::{FieldSource, Profile};
pub use provenance::Provenance;
