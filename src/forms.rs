//! Prefilled application form data for the selected program.
//!
//! Rendering the actual PDF is left to the presentation layer; this module
//! only decides what goes into it.

use serde::{Deserialize, Serialize};

use crate::catalog::{DEFAULT_LANGUAGE, Program};
use crate::profile::{Profile, ProfileField};

/// One line of the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormEntry {
    pub field: ProfileField,
    pub value: Option<String>,
}

/// Everything needed to render a prefilled application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDraft {
    pub program_id: String,
    pub program_name: String,
    pub form_ref: Option<String>,
    /// Suggested download name, e.g. `Widow_Pension_Scheme.pdf`.
    pub file_name: String,
    pub entries: Vec<FormEntry>,
    /// Fields the citizen still has to fill in by hand.
    pub missing: Vec<ProfileField>,
}

impl FormDraft {
    pub fn new(program: &Program, profile: &Profile) -> Self {
        let entries: Vec<FormEntry> = ProfileField::ALL
            .into_iter()
            .map(|field| FormEntry {
                field,
                value: profile.get(field).map(|v| v.to_string()),
            })
            .collect();
        let missing = entries
            .iter()
            .filter(|e| e.value.is_none())
            .map(|e| e.field)
            .collect();
        let program_name = program.name(DEFAULT_LANGUAGE).to_string();

        Self {
            program_id: program.id.clone(),
            file_name: download_name(&program_name),
            program_name,
            form_ref: program.form_ref.clone(),
            entries,
            missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn value(&self, field: ProfileField) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .and_then(|e| e.value.as_deref())
    }
}

fn download_name(program_name: &str) -> String {
    let stem = program_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{stem}.pdf")
}
