//! Ticket field catalog.
//!
//! The catalog is fetched once from the server and never mutated. It tells
//! the board which field names exist (and may therefore be marked dirty),
//! how to label them, which values enumerated fields offer, and which
//! fields are server-maintained timestamps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BoardError;
use crate::model::value::FieldValue;

/// Input kind declared for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Time,
    #[serde(other)]
    Other,
}

impl FieldKind {
    /// Fields whose value is picked from a declared option list.
    #[must_use]
    pub const fn is_enumerated(self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

/// One catalog entry, as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub optional: bool,
    /// Set by the server for fields the board lets users leave unset even
    /// though the project does not declare them optional.
    #[serde(default, rename = "kanbanOptional")]
    pub kanban_optional: bool,
    /// Declared default value.
    #[serde(default, rename = "value", skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            options: None,
            optional: false,
            kanban_optional: false,
            default: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(ToString::to_string).collect());
        self
    }

    #[must_use]
    pub const fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(FieldValue::text(default));
        self
    }

    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional || self.kanban_optional
    }

    #[must_use]
    pub const fn is_timestamp(&self) -> bool {
        matches!(self.kind, FieldKind::Time)
    }
}

/// Body of the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPayload {
    #[serde(rename = "ticketFields")]
    pub ticket_fields: Vec<FieldDef>,
}

/// Names of the fields that play a fixed role in the board workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRoles {
    /// Workflow-state field; set on cross-column drops, never unset.
    #[serde(default = "default_state")]
    pub state: String,
    /// Assignee field; drafts get the owner placeholder.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Reporter field; drafts get the current user.
    #[serde(default = "default_reporter")]
    pub reporter: String,
    /// Free-text note sent with a dialog save. Not a catalog field.
    #[serde(default = "default_note")]
    pub note: String,
    /// Last-modified timestamp stamped on every local edit.
    #[serde(default = "default_modified")]
    pub modified: String,
}

impl Default for FieldRoles {
    fn default() -> Self {
        Self {
            state: default_state(),
            owner: default_owner(),
            reporter: default_reporter(),
            note: default_note(),
            modified: default_modified(),
        }
    }
}

fn default_state() -> String {
    "status".to_string()
}

fn default_owner() -> String {
    "owner".to_string()
}

fn default_reporter() -> String {
    "reporter".to_string()
}

fn default_note() -> String {
    "comment".to_string()
}

fn default_modified() -> String {
    "changetime".to_string()
}

/// Read-only field catalog with role assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    fields: Vec<FieldDef>,
    by_name: HashMap<String, usize>,
    roles: FieldRoles,
}

impl FieldCatalog {
    #[must_use]
    pub fn new(fields: Vec<FieldDef>, roles: FieldRoles) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, def)| (def.name.clone(), i))
            .collect();
        Self {
            fields,
            by_name,
            roles,
        }
    }

    #[must_use]
    pub fn from_payload(payload: CatalogPayload, roles: FieldRoles) -> Self {
        Self::new(payload.ticket_fields, roles)
    }

    /// Catalog fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub const fn roles(&self) -> &FieldRoles {
        &self.roles
    }

    /// User-facing label for a field.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.get(name).map(|def| def.label.as_str())
    }

    /// Check that `name` may be set on a ticket and marked dirty.
    ///
    /// # Errors
    ///
    /// `ReservedField` for `id`, `UnknownField` for anything that is neither
    /// a catalog field nor the note field.
    pub fn ensure_settable(&self, name: &str) -> Result<(), BoardError> {
        if name == "id" {
            return Err(BoardError::ReservedField(name.to_string()));
        }
        if self.contains(name) || name == self.roles.note {
            Ok(())
        } else {
            Err(BoardError::UnknownField(name.to_string()))
        }
    }

    /// Catalog fields that are sent by dialog save and create.
    pub fn editable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|def| !def.is_timestamp() && def.name != self.roles.modified)
    }

    /// Declared choices for a field before widening: the option list, with a
    /// leading empty choice for optional fields other than the state field.
    #[must_use]
    pub fn base_domain(&self, def: &FieldDef) -> Vec<String> {
        let mut domain = Vec::new();
        if def.is_optional() && def.name != self.roles.state {
            domain.push(String::new());
        }
        domain.extend(def.options.iter().flatten().cloned());
        domain
    }

    /// Choices offered for `name` given the ticket's current value.
    ///
    /// A current value missing from the declared choices is put in front so
    /// the UI never hides or overwrites it.
    ///
    /// # Errors
    ///
    /// `UnknownField` if `name` is not in the catalog.
    pub fn domain(
        &self,
        name: &str,
        current: Option<&FieldValue>,
    ) -> Result<Vec<String>, BoardError> {
        let def = self
            .get(name)
            .ok_or_else(|| BoardError::UnknownField(name.to_string()))?;
        Ok(widen(self.base_domain(def), current))
    }
}

/// Prepend `current` to `domain` when it is not already offered.
fn widen(mut domain: Vec<String>, current: Option<&FieldValue>) -> Vec<String> {
    if let Some(value) = current {
        let shown = value.to_string();
        if !domain.contains(&shown) {
            domain.insert(0, shown);
        }
    }
    domain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(
            vec![
                FieldDef::new("summary", "Summary", FieldKind::Text),
                FieldDef::new("status", "Status", FieldKind::Radio)
                    .with_options(&["new", "accepted", "closed"])
                    .with_optional(true),
                FieldDef::new("priority", "Priority", FieldKind::Select)
                    .with_options(&["major", "minor"]),
                FieldDef::new("milestone", "Milestone", FieldKind::Select)
                    .with_options(&["m1", "m2"])
                    .with_optional(true),
                FieldDef::new("changetime", "Modified", FieldKind::Time),
            ],
            FieldRoles::default(),
        )
    }

    #[test]
    fn catalog_payload_parses_server_shape() {
        let payload: CatalogPayload = serde_json::from_value(serde_json::json!({
            "ticketFields": [
                { "name": "summary", "label": "Summary", "type": "text" },
                { "name": "version", "label": "Version", "type": "select",
                  "options": ["1.0", "2.0"], "kanbanOptional": true, "value": "" },
                { "name": "time", "label": "Created", "type": "time" },
                { "name": "keywords", "label": "Keywords", "type": "text", "format": "list" },
                { "name": "blocking", "label": "Blocking", "type": "id-list" }
            ]
        }))
        .expect("catalog payload");

        let cat = FieldCatalog::from_payload(payload, FieldRoles::default());
        let version = cat.get("version").expect("version field");
        assert!(version.is_optional());
        assert_eq!(version.default, Some(FieldValue::text("")));
        assert!(cat.get("time").expect("time").is_timestamp());
        assert_eq!(cat.get("blocking").expect("blocking").kind, FieldKind::Other);
        assert_eq!(cat.label("keywords"), Some("Keywords"));
    }

    #[test]
    fn optional_fields_offer_an_empty_choice() {
        let cat = catalog();
        assert_eq!(
            cat.domain("milestone", None).expect("domain"),
            vec!["", "m1", "m2"]
        );
    }

    #[test]
    fn state_field_never_offers_an_empty_choice() {
        let cat = catalog();
        assert_eq!(
            cat.domain("status", None).expect("domain"),
            vec!["new", "accepted", "closed"]
        );
    }

    #[test]
    fn stale_current_value_is_prepended() {
        let cat = catalog();
        let current = FieldValue::text("critical");
        assert_eq!(
            cat.domain("priority", Some(&current)).expect("domain"),
            vec!["critical", "major", "minor"]
        );
    }

    #[test]
    fn offered_current_value_is_not_duplicated() {
        let cat = catalog();
        let current = FieldValue::text("minor");
        assert_eq!(
            cat.domain("priority", Some(&current)).expect("domain"),
            vec!["major", "minor"]
        );
    }

    #[test]
    fn unknown_field_has_no_domain() {
        assert_eq!(
            catalog().domain("nope", None),
            Err(BoardError::UnknownField("nope".into()))
        );
    }

    #[test]
    fn settable_fields() {
        let cat = catalog();
        assert!(cat.ensure_settable("summary").is_ok());
        assert!(cat.ensure_settable("comment").is_ok());
        assert_eq!(
            cat.ensure_settable("id"),
            Err(BoardError::ReservedField("id".into()))
        );
        assert_eq!(
            cat.ensure_settable("bogus"),
            Err(BoardError::UnknownField("bogus".into()))
        );
    }

    #[test]
    fn editable_fields_skip_timestamps() {
        let names: Vec<_> = catalog().editable_fields().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["summary", "status", "priority", "milestone"]);
    }
}
