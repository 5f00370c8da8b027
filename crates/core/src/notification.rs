// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-application notification configuration.

use serde::{Deserialize, Serialize};

/// When a failure notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyWhen {
    /// Any failing run.
    Failing,
    /// A failing run whose change includes a new application build.
    FailingCommit,
}

crate::simple_display! {
    NotifyWhen {
        Failing => "failing",
        FailingCommit => "failing-commit",
    }
}

/// Recipients configured for one trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTarget {
    #[serde(default)]
    pub emails: Vec<String>,
    /// Whether the submitting author is notified as well.
    #[serde(default)]
    pub include_author: bool,
}

impl NotifyTarget {
    pub fn new(emails: Vec<String>, include_author: bool) -> Self {
        Self { emails, include_author }
    }
}

/// Per-application notification spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifications {
    #[serde(default)]
    pub failing: NotifyTarget,
    #[serde(default)]
    pub failing_commit: NotifyTarget,
}

impl Notifications {
    pub fn target(&self, when: NotifyWhen) -> &NotifyTarget {
        match when {
            NotifyWhen::Failing => &self.failing,
            NotifyWhen::FailingCommit => &self.failing_commit,
        }
    }
}
