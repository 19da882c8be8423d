//! Ticket dialog: select, edit a scratch copy, save or create.
//!
//! The dialog buffer is an independent copy. Nothing typed into it reaches
//! the board until [`Board::save_dialog_ticket`] copies the differing fields
//! onto the original ticket, or [`Board::create_dialog_ticket`] sends a
//! draft.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{Board, Pending, lookup_fault};
use crate::error::BoardError;
use crate::model::ids::TicketId;
use crate::model::ticket::Ticket;
use crate::model::value::FieldValue;
use crate::sync::client::{Call, Request};
use crate::sync::wire::TicketDiff;

/// Scratch copy of a ticket being viewed, edited or created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogBuffer {
    ticket: Ticket,
    note: String,
    origin: Option<TicketId>,
    /// Which draft this is, counted per board. Zero for existing tickets.
    generation: u64,
}

impl DialogBuffer {
    #[must_use]
    pub fn for_ticket(ticket: &Ticket) -> Self {
        Self {
            ticket: ticket.detached_copy(),
            note: String::new(),
            origin: ticket.id(),
            generation: 0,
        }
    }

    #[must_use]
    pub const fn draft(ticket: Ticket, generation: u64) -> Self {
        Self {
            ticket,
            note: String::new(),
            origin: None,
            generation,
        }
    }

    #[must_use]
    pub const fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Ticket this buffer was copied from; `None` for a draft.
    #[must_use]
    pub const fn origin(&self) -> Option<TicketId> {
        self.origin
    }

    #[must_use]
    pub const fn is_draft(&self) -> bool {
        self.origin.is_none()
    }

    /// Tells drafts apart: every [`Board::create_ticket`] opens a new one.
    #[must_use]
    pub const fn draft_generation(&self) -> Option<u64> {
        if self.is_draft() {
            Some(self.generation)
        } else {
            None
        }
    }

    /// No edits and no note.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        !self.ticket.is_dirty() && self.note.is_empty()
    }
}

impl Board {
    /// Select a ticket, open a dialog copy of it and ask for its details.
    ///
    /// # Errors
    ///
    /// `UnknownTicket` if the ticket is not on the board.
    pub fn select_ticket(&mut self, id: TicketId) -> Result<Request, BoardError> {
        let ticket = self
            .ticket(id)
            .ok_or(BoardError::UnknownTicket(id))
            .map_err(lookup_fault)?;
        self.dialog = Some(DialogBuffer::for_ticket(ticket));
        self.selected = Some(id);
        debug!(ticket = %id, "ticket selected");
        Ok(self.issue(
            Call::FetchBoard { detailed: vec![id] },
            Pending {
                detailed: vec![id],
                ..Pending::default()
            },
        ))
    }

    /// Open a dialog on a blank draft and drop the selection.
    pub fn create_ticket(&mut self) -> &DialogBuffer {
        let draft = Ticket::draft(self.draft_fields());
        self.drafts_opened += 1;
        self.selected = None;
        self.dialog.insert(DialogBuffer::draft(draft, self.drafts_opened))
    }

    /// Catalog defaults for a new ticket: empty text, declared defaults for
    /// enumerated fields, and the configured workflow values.
    fn draft_fields(&self) -> BTreeMap<String, FieldValue> {
        let mut fields: BTreeMap<String, FieldValue> = self
            .catalog
            .editable_fields()
            .map(|def| {
                let value = if def.kind.is_enumerated() {
                    def.default.clone().unwrap_or_else(|| FieldValue::text(""))
                } else {
                    FieldValue::text("")
                };
                (def.name.clone(), value)
            })
            .collect();

        let roles = self.catalog.roles();
        let overrides = [
            (&roles.state, &self.settings.draft.initial_state),
            (&roles.owner, &self.settings.draft.owner_placeholder),
            (&roles.reporter, &self.settings.user),
        ];
        for (field, value) in overrides {
            if let Some(slot) = fields.get_mut(field.as_str()) {
                *slot = FieldValue::text(value.clone());
            }
        }
        fields
    }

    /// Edit a field of the dialog copy.
    ///
    /// # Errors
    ///
    /// `NoDialog`, `UnknownField` or `ReservedField`.
    pub fn edit_dialog(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), BoardError> {
        let dialog = self.dialog.as_mut().ok_or(BoardError::NoDialog)?;
        dialog.ticket.set_field(&self.catalog, name, value)
    }

    /// Set the note sent along with the next save.
    ///
    /// # Errors
    ///
    /// `NoDialog`.
    pub fn set_dialog_note(&mut self, text: &str) -> Result<(), BoardError> {
        let dialog = self.dialog.as_mut().ok_or(BoardError::NoDialog)?;
        dialog.note = text.to_string();
        Ok(())
    }

    /// Discard the dialog buffer. The selection stays.
    pub const fn close_dialog(&mut self) -> Option<DialogBuffer> {
        self.dialog.take()
    }

    /// Apply the dialog's changes to the original ticket and send them.
    ///
    /// Closes the dialog. Returns `None` when nothing differs and the note
    /// is empty, or when the original ticket has left the board. A draft is
    /// handed to [`Board::create_dialog_ticket`].
    ///
    /// # Errors
    ///
    /// `NoDialog`, or a field error from applying the changes.
    pub fn save_dialog_ticket(&mut self) -> Result<Option<Request>, BoardError> {
        let origin = match &self.dialog {
            None => return Err(BoardError::NoDialog),
            Some(dialog) => dialog.origin,
        };
        let Some(id) = origin else {
            return self.create_dialog_ticket().map(Some);
        };
        let Some(dialog) = self.dialog.take() else {
            return Err(BoardError::NoDialog);
        };

        let Self {
            catalog, columns, ..
        } = self;
        let Some(original) = columns.iter_mut().find_map(|c| c.ticket_mut(id)) else {
            warn!(ticket = %id, "saved ticket is no longer on the board; dropping edits");
            return Ok(None);
        };

        let mut changed = false;
        for def in catalog.editable_fields() {
            let Some(edited) = dialog.ticket.get(&def.name) else {
                continue;
            };
            if original.get(&def.name) != Some(edited) {
                original.set_field(catalog, &def.name, edited.clone())?;
                changed = true;
            }
        }
        if !changed && dialog.note.is_empty() {
            debug!(ticket = %id, "dialog unchanged; nothing to save");
            return Ok(None);
        }

        // The note travels in the diff only; the ticket never holds it.
        let mut diff = original.to_diff();
        original.clear_dirty();
        attach_note(&mut diff, &catalog.roles().note, dialog.note);
        debug!(ticket = %id, fields = diff.fields.len(), "saving ticket");
        Ok(Some(self.issue(
            Call::SendTicketDiff(diff),
            Pending {
                tickets: vec![id],
                ..Pending::default()
            },
        )))
    }

    /// Send the draft in the dialog for creation.
    ///
    /// Every editable field is sent. The dialog stays open until the server
    /// confirms, so a failed create can be retried.
    ///
    /// # Errors
    ///
    /// `NoDialog`, `NotADraft` when the dialog shows an existing ticket, or
    /// a field error from marking the draft.
    pub fn create_dialog_ticket(&mut self) -> Result<Request, BoardError> {
        let dialog = self.dialog.as_mut().ok_or(BoardError::NoDialog)?;
        let Some(generation) = dialog.draft_generation() else {
            return Err(BoardError::NotADraft);
        };

        for def in self.catalog.editable_fields() {
            dialog.ticket.mark_dirty(&self.catalog, &def.name)?;
        }
        let mut diff = dialog.ticket.to_diff();
        dialog.ticket.clear_dirty();
        attach_note(&mut diff, &self.catalog.roles().note, dialog.note.clone());

        debug!(fields = diff.fields.len(), draft = generation, "creating ticket");
        Ok(self.issue(
            Call::SendTicketDiff(diff),
            Pending {
                closes_draft: Some(generation),
                ..Pending::default()
            },
        ))
    }

    /// Put an existing ticket on the board.
    pub fn link_ticket(&mut self, id: TicketId) -> Request {
        if self.ticket(id).is_some() {
            debug!(ticket = %id, "ticket already on the board; linking anyway");
        }
        self.issue(Call::Link(id), Pending::default())
    }

    /// Take a ticket off the board. The ticket itself is not touched.
    pub fn unlink_ticket(&mut self, id: TicketId) -> Request {
        self.issue(Call::Unlink(id), Pending::default())
    }
}

fn attach_note(diff: &mut TicketDiff, note_field: &str, note: String) {
    if !note.is_empty() {
        diff.fields.insert(note_field.to_string(), FieldValue::text(note));
    }
}
