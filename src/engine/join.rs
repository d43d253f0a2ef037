// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::Handler;
use crate::events::{Event, EventKind};

/// An ordered list of required event kinds plus the handler that fires when
/// every slot can be filled by a distinct queued event.
///
/// Registrations are never merged: two calls to
/// [`Workflow::handle`](crate::engine::Workflow::handle) with the same kinds
/// produce two independent join-specs.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    kinds: Vec<EventKind>,
    handler: Handler,
}

impl JoinSpec {
    pub(crate) fn new(kinds: Vec<EventKind>, handler: Handler) -> Self {
        Self { kinds, handler }
    }

    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// First-fit slot assignment.
    ///
    /// Candidates are scanned in arrival order; each one goes to the first
    /// still-empty slot whose kind recognizes it. Returns the candidate
    /// positions in slot order once every slot is filled.
    pub(crate) fn match_slots<'a, I>(&self, candidates: I) -> Option<Vec<usize>>
    where
        I: IntoIterator<Item = (usize, &'a Event)>,
    {
        let mut slots: Vec<Option<usize>> = vec![None; self.kinds.len()];
        let mut open = slots.len();

        for (position, event) in candidates {
            if open == 0 {
                break;
            }
            let slot = self
                .kinds
                .iter()
                .zip(slots.iter())
                .position(|(kind, filled)| filled.is_none() && kind.recognizes(event));
            if let Some(slot) = slot {
                slots[slot] = Some(position);
                open -= 1;
            }
        }

        if open > 0 {
            return None;
        }
        slots.into_iter().collect()
    }
}
