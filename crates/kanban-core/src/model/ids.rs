//! Identifiers for tickets and columns.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Server-assigned ticket number. Displayed as `#<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for TicketId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Error returned when a ticket reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ticket id '{0}'")]
pub struct ParseTicketIdError(pub String);

impl FromStr for TicketId {
    type Err = ParseTicketIdError;

    /// Accepts `5` and `#5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseTicketIdError(s.to_string()))
    }
}

/// Column identifier.
///
/// Board configurations written by hand use integers, generated ones may
/// use names; the wire form is preserved either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnId {
    Number(i64),
    Name(String),
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ColumnId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ColumnId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl ColumnId {
    /// Parse user input, preferring the numeric form when it fits.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Name(trimmed.to_string()), Self::Number)
    }
}

/// Extract the ticket number from a dropped ticket link such as
/// `https://host/myproject/ticket/42#comment:3`.
///
/// Only links into `project` are accepted.
#[must_use]
pub fn parse_ticket_link(url: &str, project: &str) -> Option<TicketId> {
    let pattern = format!(r"/{}/ticket/(\d+)", regex::escape(project));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(url)?;
    caps.get(1)?.as_str().parse::<u64>().ok().map(TicketId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_id_parses_with_and_without_hash() {
        assert_eq!("5".parse::<TicketId>(), Ok(TicketId::new(5)));
        assert_eq!(" #12 ".parse::<TicketId>(), Ok(TicketId::new(12)));
        assert!("five".parse::<TicketId>().is_err());
        assert!("-3".parse::<TicketId>().is_err());
    }

    #[test]
    fn ticket_id_displays_with_hash() {
        assert_eq!(TicketId::new(5).to_string(), "#5");
    }

    #[test]
    fn column_id_keeps_wire_form() {
        let numeric: ColumnId = serde_json::from_str("2").expect("numeric id");
        assert_eq!(numeric, ColumnId::Number(2));
        assert_eq!(serde_json::to_string(&numeric).expect("serialize"), "2");

        let named: ColumnId = serde_json::from_str("\"A\"").expect("named id");
        assert_eq!(named, ColumnId::from("A"));
        assert_eq!(serde_json::to_string(&named).expect("serialize"), "\"A\"");
    }

    #[test]
    fn column_id_parse_prefers_numbers() {
        assert_eq!(ColumnId::parse("3"), ColumnId::Number(3));
        assert_eq!(ColumnId::parse("done"), ColumnId::from("done"));
    }

    #[test]
    fn ticket_link_must_point_into_project() {
        assert_eq!(
            parse_ticket_link("http://trac.local/proj/ticket/42", "proj"),
            Some(TicketId::new(42))
        );
        assert_eq!(
            parse_ticket_link("http://trac.local/proj/ticket/7#comment:2", "proj"),
            Some(TicketId::new(7))
        );
        assert_eq!(
            parse_ticket_link("http://trac.local/other/ticket/42", "proj"),
            None
        );
        assert_eq!(parse_ticket_link("http://trac.local/proj/wiki/Start", "proj"), None);
    }

    #[test]
    fn ticket_link_escapes_project_name() {
        assert_eq!(parse_ticket_link("/a.b/ticket/1", "a.b"), Some(TicketId::new(1)));
        assert_eq!(parse_ticket_link("/axb/ticket/1", "a.b"), None);
    }
}
