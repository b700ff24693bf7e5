//! Text commands typed by the user, mapped onto contact events.

use contact_core::{ContactError, ContactEvent, ContactId, SortSelector};

pub const HELP: &str = "\
commands:
  first <value>     set the draft first name
  last <value>      set the draft last name
  phone <value>     set the draft phone number
  show | hide       open or close the add-contact dialog
  save              save the draft as a new contact
  sort <order>      sort by first_name, last_name or phone_number
  delete <id>       delete the listed contact with that id
  help              show this text
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Event(ContactEvent),
    /// Resolved against the current snapshot before dispatch.
    Delete(ContactId),
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ContactError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "first" => Command::Event(ContactEvent::SetFirstName(rest.to_string())),
        "last" => Command::Event(ContactEvent::SetLastName(rest.to_string())),
        "phone" => Command::Event(ContactEvent::SetPhoneNumber(rest.to_string())),
        "show" => Command::Event(ContactEvent::ShowDialog),
        "hide" => Command::Event(ContactEvent::HideDialog),
        "save" => Command::Event(ContactEvent::SaveContact),
        "sort" => Command::Event(ContactEvent::SortContacts(rest.parse::<SortSelector>()?)),
        "delete" => {
            let id = rest.parse::<i64>().map_err(|_| {
                ContactError::UnknownEvent(format!("delete expects a numeric id, got '{rest}'"))
            })?;
            Command::Delete(ContactId(id))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ContactError::UnknownEvent(format!("unknown command '{other}'"))),
    };
    Ok(Some(command))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
