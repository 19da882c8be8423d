//! Ticket: a field map with a dirty-field tracker.
//!
//! Local edits go through [`Ticket::set_field`], which records the field name
//! as dirty. Only dirty fields are ever serialized ([`Ticket::to_diff`]);
//! server data is applied with [`Ticket::merge_from_server`], which
//! overwrites whatever it carries.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::BoardError;
use crate::model::catalog::FieldCatalog;
use crate::model::ids::TicketId;
use crate::model::value::{ChangelogEntry, FieldValue};
use crate::sync::wire::{TicketDiff, TicketSnapshot};

/// How much of a ticket the local copy has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fidelity {
    /// List view data: id, summary, status.
    Summary,
    /// Every catalog field plus timestamps and changelog.
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: Option<TicketId>,
    fields: BTreeMap<String, FieldValue>,
    dirty: BTreeSet<String>,
    fidelity: Fidelity,
}

impl Ticket {
    /// Ticket as first seen in a server snapshot.
    #[must_use]
    pub fn from_snapshot(data: &TicketSnapshot) -> Self {
        Self {
            id: Some(data.id),
            fields: data.fields.clone(),
            dirty: BTreeSet::new(),
            fidelity: Fidelity::Summary,
        }
    }

    /// Ticket that does not exist on the server yet.
    #[must_use]
    pub const fn draft(fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            id: None,
            fields,
            dirty: BTreeSet::new(),
            fidelity: Fidelity::Detailed,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Option<TicketId> {
        self.id
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text of a field, empty when absent or not text.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.get(name).and_then(FieldValue::as_text).unwrap_or("")
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    #[must_use]
    pub const fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    #[must_use]
    pub const fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    pub const fn mark_detailed(&mut self) {
        self.fidelity = Fidelity::Detailed;
    }

    /// `#<id>` or `(new)` for drafts.
    #[must_use]
    pub fn label(&self) -> String {
        self.id.map_or_else(|| "(new)".to_string(), |id| id.to_string())
    }

    /// Assign a field locally and mark it dirty.
    ///
    /// Stamps the last-modified field (without marking it dirty) when the
    /// ticket carries one. The value is not checked against the field's
    /// declared options.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is `id` or not a known field.
    pub fn set_field(
        &mut self,
        catalog: &FieldCatalog,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), BoardError> {
        catalog.ensure_settable(name)?;
        self.fields.insert(name.to_string(), value.into());
        self.dirty.insert(name.to_string());

        let modified = &catalog.roles().modified;
        if name != modified.as_str() && self.fields.contains_key(modified.as_str()) {
            self.fields.insert(modified.clone(), FieldValue::now());
        }
        Ok(())
    }

    /// Mark a field dirty without changing its value.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is `id` or not a known field.
    pub fn mark_dirty(&mut self, catalog: &FieldCatalog, name: &str) -> Result<(), BoardError> {
        catalog.ensure_settable(name)?;
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// `{ id, ...dirty fields }`. Dirty fields without a value are skipped.
    #[must_use]
    pub fn to_diff(&self) -> TicketDiff {
        let fields = self
            .dirty
            .iter()
            .filter_map(|name| self.fields.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        TicketDiff {
            id: self.id,
            fields,
        }
    }

    /// Overwrite every field present in `data`, dirty or not.
    ///
    /// Fields `data` does not carry are kept, so summary data never strips a
    /// detailed copy. Overwritten fields lose their dirty mark. Returns
    /// `true` if any value changed.
    pub fn merge_from_server(&mut self, data: &TicketSnapshot) -> bool {
        if self.id.is_none() {
            self.id = Some(data.id);
        }

        let mut changed = false;
        for (name, value) in &data.fields {
            self.dirty.remove(name);
            if self.fields.get(name) != Some(value) {
                self.fields.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Independent copy for a dialog buffer: same fields, clean tracker.
    #[must_use]
    pub fn detached_copy(&self) -> Self {
        Self {
            id: self.id,
            fields: self.fields.clone(),
            dirty: BTreeSet::new(),
            fidelity: self.fidelity,
        }
    }

    /// Change history carried by detailed tickets; empty otherwise.
    #[must_use]
    pub fn changelog(&self) -> Vec<ChangelogEntry> {
        match self.fields.get("changelog") {
            Some(FieldValue::Other(raw)) => {
                serde_json::from_value(raw.clone()).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }
}
