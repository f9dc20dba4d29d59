//! Conversational data collection.
//!
//! A `Script` lists the profile fields to ask for, in order. The
//! `ConversationController` walks that script against a seed profile, asking
//! only for what is still missing and validating every answer before it
//! reaches the profile. Acknowledgement text around the prompts belongs to the
//! presentation layer.

pub mod controller;
pub mod script;
pub mod validate;

pub use controller::{Answer, ConversationController, Prompt};
pub use script::{ConversationField, Script, Validator};
pub use validate::validate;
