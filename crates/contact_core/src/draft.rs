//! Unsaved form input for a new contact plus dialog visibility.

use serde::Serialize;
use shared::{domain::Contact, error::ContactError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DraftState {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub dialog_visible: bool,
}

impl DraftState {
    pub fn set_first_name(&mut self, value: String) {
        self.first_name = value;
    }

    pub fn set_last_name(&mut self, value: String) {
        self.last_name = value;
    }

    pub fn set_phone_number(&mut self, value: String) {
        self.phone_number = value;
    }

    pub fn show_dialog(&mut self) {
        self.dialog_visible = true;
    }

    pub fn hide_dialog(&mut self) {
        self.dialog_visible = false;
    }

    /// Builds an unsaved contact from the draft, rejecting whitespace-only
    /// fields. Values are taken as typed, without trimming.
    pub fn validated_contact(&self) -> Result<Contact, ContactError> {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone_number", &self.phone_number),
        ] {
            if value.trim().is_empty() {
                return Err(ContactError::ValidationRejected { field });
            }
        }
        Ok(Contact::new(
            self.first_name.clone(),
            self.last_name.clone(),
            self.phone_number.clone(),
        ))
    }

    /// Clears the form after a save and closes the dialog.
    pub fn reset_fields(&mut self) {
        self.first_name.clear();
        self.last_name.clear();
        self.phone_number.clear();
        self.dialog_visible = false;
    }
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
