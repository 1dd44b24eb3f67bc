use dockwatch_core::engine::TableUpdate;
use dockwatch_core::{EntityId, EntityRecord};
use std::collections::BTreeMap;

pub const HEADERS: [&str; 7] = ["ID", "Container", "Image", "Uptime", "Status", "CPU", "Memory"];

/// Rendered copy of the row index. Rows are slot numbers and render in slot
/// order; the selection follows an identity, not a position.
#[derive(Debug, Default)]
pub struct TableModel {
    rows: BTreeMap<usize, EntityRecord>,
    selected: Option<EntityId>,
    last_error: Option<String>,
}

impl TableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.last_error = None;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.rows.values()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn apply(&mut self, update: TableUpdate) {
        match update {
            TableUpdate::Upsert { row, record } => {
                // A slot freed by a removal can be reused by a different identity.
                self.rows.retain(|slot, existing| *slot == row || existing.id != record.id);
                self.rows.insert(row, record);
                self.last_error = None;
            }
            TableUpdate::Remove { row, id } => {
                if self.rows.get(&row).is_some_and(|record| record.id == id) {
                    self.rows.remove(&row);
                }
            }
            TableUpdate::PollFailed { message } => {
                self.last_error = Some(message);
            }
        }
        self.fix_selection();
    }

    pub fn selected(&self) -> Option<&EntityId> {
        self.selected.as_ref()
    }

    pub fn selected_position(&self) -> Option<usize> {
        let selected = self.selected.as_ref()?;
        self.rows.values().position(|record| &record.id == selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            self.selected = None;
            return;
        }
        let last = self.rows.len() - 1;
        let next = match self.selected_position() {
            Some(current) => current.saturating_add_signed(delta).min(last),
            None => 0,
        };
        self.selected = self.rows.values().nth(next).map(|record| record.id.clone());
    }

    pub fn select_first(&mut self) {
        self.selected = self.rows.values().next().map(|record| record.id.clone());
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows.values().last().map(|record| record.id.clone());
    }

    fn fix_selection(&mut self) {
        let still_present = self
            .selected
            .as_ref()
            .is_some_and(|id| self.rows.values().any(|record| &record.id == id));
        if !still_present {
            self.select_first();
        }
    }
}
