//! Bounded per-tab console and dialog history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Level recorded for uncaught page exceptions.
pub const PAGE_ERROR_LEVEL: &str = "pageerror";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleEntry {
    /// `error` also matches uncaught page exceptions.
    pub fn matches_level(&self, level: &str) -> bool {
        self.level.eq_ignore_ascii_case(level)
            || (level.eq_ignore_ascii_case("error") && self.level == PAGE_ERROR_LEVEL)
    }
}

/// One dialog and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    /// `accepted`, `dismissed` or `error: <reason>`.
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

/// How the next dialog(s) on a tab get answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogPlan {
    pub accept: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    /// Disarm after the first dialog.
    pub once: bool,
}

/// Ring buffer capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCaps {
    pub console: usize,
    pub dialogs: usize,
}

impl Default for BufferCaps {
    fn default() -> Self {
        Self {
            console: 400,
            dialogs: 80,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TabBuffers {
    caps: BufferCaps,
    console: VecDeque<ConsoleEntry>,
    dialogs: VecDeque<DialogEvent>,
    plan: Option<DialogPlan>,
}

fn push_bounded<T>(ring: &mut VecDeque<T>, cap: usize, item: T) {
    if cap == 0 {
        return;
    }
    while ring.len() >= cap {
        ring.pop_front();
    }
    ring.push_back(item);
}

/// Newest `limit` items, oldest first.
fn tail<T: Clone>(ring: impl DoubleEndedIterator<Item = T>, limit: usize) -> Vec<T> {
    let mut items: Vec<T> = ring.rev().take(limit).collect();
    items.reverse();
    items
}

impl TabBuffers {
    pub(crate) fn new(caps: BufferCaps) -> Self {
        Self {
            caps,
            console: VecDeque::new(),
            dialogs: VecDeque::new(),
            plan: None,
        }
    }

    pub(crate) fn push_console(&mut self, level: impl Into<String>, text: impl Into<String>) {
        let entry = ConsoleEntry {
            level: level.into(),
            text: text.into(),
            timestamp: Utc::now(),
        };
        push_bounded(&mut self.console, self.caps.console, entry);
    }

    pub(crate) fn push_dialog(&mut self, event: DialogEvent) {
        push_bounded(&mut self.dialogs, self.caps.dialogs, event);
    }

    pub(crate) fn console(&mut self, limit: usize, level: Option<&str>, clear: bool) -> Vec<ConsoleEntry> {
        let entries = match level {
            Some(level) => tail(
                self.console.iter().filter(|e| e.matches_level(level)).cloned(),
                limit,
            ),
            None => tail(self.console.iter().cloned(), limit),
        };
        if clear {
            self.console.clear();
        }
        entries
    }

    pub(crate) fn dialogs(&self, limit: usize) -> Vec<DialogEvent> {
        tail(self.dialogs.iter().cloned(), limit)
    }

    pub(crate) fn arm(&mut self, plan: DialogPlan) {
        self.plan = Some(plan);
    }

    pub(crate) fn plan(&self) -> Option<&DialogPlan> {
        self.plan.as_ref()
    }

    /// The plan for the dialog that just opened; a `once` plan is consumed.
    pub(crate) fn take_plan_for_dialog(&mut self) -> Option<DialogPlan> {
        let plan = self.plan.clone()?;
        if plan.once {
            self.plan = None;
        }
        Some(plan)
    }
}
