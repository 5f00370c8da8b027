// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The outbound mailer.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from mail delivery.
#[derive(Debug, Clone, Error)]
pub enum MailerError {
    #[error("mail delivery failed: {0}")]
    SendFailed(String),
}

/// One outbound mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn new(recipients: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { recipients, subject: subject.into(), body: body.into() }
    }
}

/// The external mailer.
#[async_trait]
pub trait Mailer: Clone + Send + Sync + 'static {
    async fn send(&self, mail: Mail) -> Result<(), MailerError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        sent: Vec<Mail>,
        failing: bool,
    }

    /// Recording mailer double.
    #[derive(Clone, Default)]
    pub struct FakeMailer {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every send fail until turned off again.
        pub fn set_failing(&self, failing: bool) {
            self.state.lock().failing = failing;
        }

        pub fn sent(&self) -> Vec<Mail> {
            self.state.lock().sent.clone()
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, mail: Mail) -> Result<(), MailerError> {
            let mut state = self.state.lock();
            if state.failing {
                return Err(MailerError::SendFailed("scripted failure".to_string()));
            }
            state.sent.push(mail);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMailer;
