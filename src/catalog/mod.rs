//! Program catalog: the closed set of benefit programs the matcher reads.
//!
//! The catalog is data: the built-in one ships as `data/catalog.json` and a
//! replacement can be loaded from any JSON document of the same shape.

pub mod model;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::profile::ProfileField;

pub use model::{CompareOp, Criterion, DEFAULT_LANGUAGE, Program, Rule};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

/// Validated, ordered list of programs. Order is significant: it is the
/// default ranking of match results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog")]
pub struct Catalog {
    programs: Vec<Program>,
}

#[derive(Deserialize)]
struct RawCatalog {
    programs: Vec<Program>,
}

impl TryFrom<RawCatalog> for Catalog {
    type Error = CatalogError;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        Catalog::new(raw.programs)
    }
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and malformed criteria.
    pub fn new(programs: Vec<Program>) -> Result<Self, CatalogError> {
        if programs.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for program in &programs {
            if !seen.insert(program.id.as_str()) {
                return Err(CatalogError::DuplicateProgram {
                    id: program.id.clone(),
                });
            }
            if !program.names.contains_key(DEFAULT_LANGUAGE) {
                return Err(CatalogError::MissingName {
                    program: program.id.clone(),
                });
            }
            for criterion in &program.criteria {
                validate_rule(&program.id, &criterion.rule)?;
            }
        }

        Ok(Self { programs })
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Self::new(raw.programs)
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn get(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Every profile field some criterion reads. The conversation must be
    /// able to collect all of these before results are shown.
    pub fn required_fields(&self) -> BTreeSet<ProfileField> {
        self.programs
            .iter()
            .flat_map(|p| p.criteria.iter().map(Criterion::field))
            .collect()
    }
}

fn validate_rule(program: &str, rule: &Rule) -> Result<(), CatalogError> {
    let field = rule.field();
    match rule {
        Rule::Threshold { .. } if !field.is_numeric() => Err(CatalogError::NonNumericThreshold {
            program: program.to_string(),
            field,
        }),
        Rule::Equals { value, .. } => validate_option(program, field, value),
        Rule::OneOf { values, .. } => values
            .iter()
            .try_for_each(|value| validate_option(program, field, value)),
        _ => Ok(()),
    }
}

fn validate_option(program: &str, field: ProfileField, value: &str) -> Result<(), CatalogError> {
    let recognized = match field {
        ProfileField::Gender => crate::profile::Gender::from_answer(value).is_some(),
        ProfileField::MaritalStatus => crate::profile::MaritalStatus::from_answer(value).is_some(),
        ProfileField::Caste => crate::profile::CasteCategory::from_answer(value).is_some(),
        f if f.is_numeric() => false,
        _ => !value.trim().is_empty(),
    };
    if recognized {
        Ok(())
    } else {
        Err(CatalogError::UnrecognizedOption {
            program: program.to_string(),
            field,
            value: value.to_string(),
        })
    }
}
