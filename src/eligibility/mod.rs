//! Eligibility matching: derives the programs a profile qualifies for.
//!
//! The matcher is a pure function of (profile, catalog). A program matches
//! only when every one of its criteria holds; there is no partial credit.
//! `diagnose` keeps the unmet criteria of the programs that did not match.

pub mod matcher;
pub mod rules;

pub use matcher::{EligibilityMatcher, MatchResult, Ranking};
pub use rules::{UnmetCriterion, UnmetReason, evaluate};
