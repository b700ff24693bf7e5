//! User intents forwarded by the rendering layer.

use shared::domain::{Contact, SortSelector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactEvent {
    SaveContact,
    SetFirstName(String),
    SetLastName(String),
    SetPhoneNumber(String),
    ShowDialog,
    HideDialog,
    SortContacts(SortSelector),
    DeleteContact(Contact),
}

impl ContactEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SaveContact => "save_contact",
            Self::SetFirstName(_) => "set_first_name",
            Self::SetLastName(_) => "set_last_name",
            Self::SetPhoneNumber(_) => "set_phone_number",
            Self::ShowDialog => "show_dialog",
            Self::HideDialog => "hide_dialog",
            Self::SortContacts(_) => "sort_contacts",
            Self::DeleteContact(_) => "delete_contact",
        }
    }
}
