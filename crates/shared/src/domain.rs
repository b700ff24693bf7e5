use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ContactError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ContactId);

/// A persisted (or about to be persisted) contact record.
///
/// `id` is `None` until the store assigns a key on first insert. Updates are
/// made by building a replacement value with the same key and upserting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<ContactId>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl Contact {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: phone_number.into(),
        }
    }

    pub fn with_id(mut self, id: ContactId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn key(&self) -> Option<ContactId> {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortSelector {
    #[default]
    FirstName,
    LastName,
    PhoneNumber,
}

impl SortSelector {
    pub const ALL: [Self; 3] = [Self::FirstName, Self::LastName, Self::PhoneNumber];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::PhoneNumber => "phone_number",
        }
    }

    /// Column the persisted query orders by.
    pub fn column(self) -> &'static str {
        self.as_str()
    }

    pub fn field(self, contact: &Contact) -> &str {
        match self {
            Self::FirstName => &contact.first_name,
            Self::LastName => &contact.last_name,
            Self::PhoneNumber => &contact.phone_number,
        }
    }

    /// Byte-wise ordering on the selected field with the key as tie-breaker,
    /// the same order SQLite's default collation produces.
    pub fn compare(self, a: &Contact, b: &Contact) -> Ordering {
        self.field(a)
            .cmp(self.field(b))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn is_sorted(self, contacts: &[Contact]) -> bool {
        contacts
            .windows(2)
            .all(|pair| self.compare(&pair[0], &pair[1]) != Ordering::Greater)
    }
}

impl fmt::Display for SortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortSelector {
    type Err = ContactError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first" | "first_name" => Ok(Self::FirstName),
            "last" | "last_name" => Ok(Self::LastName),
            "phone" | "phone_number" => Ok(Self::PhoneNumber),
            other => Err(ContactError::UnknownEvent(format!(
                "unknown sort selector '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selector_aliases() {
        assert_eq!("first".parse::<SortSelector>().unwrap(), SortSelector::FirstName);
        assert_eq!(" Last_Name ".parse::<SortSelector>().unwrap(), SortSelector::LastName);
        assert_eq!("phone".parse::<SortSelector>().unwrap(), SortSelector::PhoneNumber);
        assert!(matches!(
            "age".parse::<SortSelector>(),
            Err(ContactError::UnknownEvent(_))
        ));
    }

    #[test]
    fn compare_breaks_ties_by_key() {
        let a = Contact::new("Ann", "Zed", "1").with_id(ContactId(2));
        let b = Contact::new("Ann", "Young", "2").with_id(ContactId(1));
        assert_eq!(SortSelector::FirstName.compare(&b, &a), Ordering::Less);
        assert!(SortSelector::FirstName.is_sorted(&[b.clone(), a.clone()]));
        assert!(!SortSelector::LastName.is_sorted(&[a, b]));
    }

    #[test]
    fn selector_serializes_snake_case() {
        let raw = serde_json::to_string(&SortSelector::PhoneNumber).unwrap();
        assert_eq!(raw, "\"phone_number\"");
    }
}
