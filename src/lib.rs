//! Benefit Navigator: workflow and eligibility engine.
//!
//! Guides a citizen from document intake through a scripted conversation to
//! the benefit programs they qualify for and a prefilled application form.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod eligibility;
pub mod error;
pub mod forms;
pub mod intake;
pub mod profile;
pub mod workflow;

pub use error::{Error, Result};
