//! Pure profile → ranked programs matcher.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, Program};
use crate::profile::Profile;

use super::rules::{UnmetCriterion, evaluate};

/// How matched programs are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Catalog order.
    #[default]
    Catalog,
    /// Programs satisfying more criteria first, ties in catalog order.
    Specificity,
}

/// Outcome of evaluating one program against a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub program: Program,
    pub matched: bool,
    /// Number of criteria that held.
    pub satisfied: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<UnmetCriterion>,
}

impl MatchResult {
    pub fn program_id(&self) -> &str {
        &self.program.id
    }
}

/// Evaluates every program in a catalog. Holds no state beyond its ranking,
/// so identical inputs always produce identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityMatcher {
    ranking: Ranking,
}

impl EligibilityMatcher {
    pub fn new(ranking: Ranking) -> Self {
        Self { ranking }
    }

    pub fn ranking(&self) -> Ranking {
        self.ranking
    }

    /// Programs whose every criterion holds, ranked.
    pub fn match_programs(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult> {
        let mut matched: Vec<MatchResult> = self
            .diagnose(profile, catalog)
            .into_iter()
            .filter(|result| result.matched)
            .collect();

        if self.ranking == Ranking::Specificity {
            // sort_by is stable, so ties keep catalog order
            matched.sort_by(|a, b| b.satisfied.cmp(&a.satisfied));
        }

        debug!(
            matched = matched.len(),
            catalog = catalog.len(),
            ranking = ?self.ranking,
            "Matched programs"
        );
        matched
    }

    /// Every program in catalog order, including the unmatched ones with
    /// their unmet criteria.
    pub fn diagnose(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult> {
        catalog
            .programs()
            .iter()
            .map(|program| Self::evaluate_program(program, profile))
            .collect()
    }

    fn evaluate_program(program: &Program, profile: &Profile) -> MatchResult {
        let mut unmet = Vec::new();
        let mut satisfied = 0;
        for criterion in &program.criteria {
            match evaluate(criterion, profile) {
                Ok(()) => satisfied += 1,
                Err(miss) => unmet.push(miss),
            }
        }
        MatchResult {
            program: program.clone(),
            matched: unmet.is_empty(),
            satisfied,
            unmet,
        }
    }
}
