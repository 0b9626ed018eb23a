//! Shared test support for the Shelfwatch integration suites.
//!
//! The suites under `tests/` drive the poller and worker crates through
//! their public APIs, with the network and SMTP seams replaced by the
//! in-process doubles defined here. No external services are required.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::{Arc, Mutex};

use shelfwatch_core::{Email, Product, ProductId, TrackedUser, UserId};
use shelfwatch_worker::email::{EmailError, Mailer};

/// One email captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Mailer double that records every send instead of speaking SMTP.
///
/// Optionally fails for a single recipient address so failure isolation can
/// be exercised.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    fail_for: Option<String>,
}

impl RecordingMailer {
    /// A mailer that rejects sends to `address` and accepts all others.
    #[must_use]
    pub fn failing_for(address: &str) -> Self {
        Self {
            sent: Arc::default(),
            fail_for: Some(address.to_owned()),
        }
    }

    /// Everything sent so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        if self.fail_for.as_deref() == Some(to.as_str()) {
            return Err(EmailError::InvalidAddress(to.as_str().to_owned()));
        }
        self.sent.lock().expect("mailer mutex poisoned").push(SentEmail {
            to: to.as_str().to_owned(),
            subject: subject.to_owned(),
            text_body: text_body.to_owned(),
            html_body: html_body.to_owned(),
        });
        Ok(())
    }
}

/// A tracked user with a valid parsed email.
#[must_use]
pub fn sample_user(id: &str, name: &str, email: &str) -> TrackedUser {
    TrackedUser {
        id: UserId::new(id),
        name: name.to_owned(),
        email: Email::parse(email).expect("test email is valid"),
    }
}

/// A catalog product with derived alias and SKU.
#[must_use]
pub fn sample_product(id: &str, name: &str) -> Product {
    Product {
        id: ProductId::new(id),
        alias: format!("{id}-alias"),
        sku: format!("SKU-{id}"),
        name: name.to_owned(),
        description: None,
        image: None,
        usual_price: 325,
    }
}
