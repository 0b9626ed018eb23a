//! Restock notification email delivery.
//!
//! Uses SMTP via lettre for delivery with Askama templates, rendered as
//! multipart messages (plain text and HTML alternatives).

use std::future::Future;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use shelfwatch_core::{Email, NotificationBatch, Product};

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Delivery transport seam.
///
/// The job runner is generic over this so processing tests can record sends
/// instead of speaking SMTP.
pub trait Mailer: Send + Sync {
    /// Send one multipart email.
    fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// SMTP-backed mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.as_str().to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(message).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// One product line in a rendered notification.
struct ProductLine {
    name: String,
    sku: String,
    description: Option<String>,
    image: Option<String>,
    price: i32,
    url: String,
}

/// HTML template for the restock notification.
#[derive(Template)]
#[template(path = "email/back_in_stock.html")]
struct BackInStockHtml<'a> {
    name: &'a str,
    products: &'a [ProductLine],
}

/// Plain text template for the restock notification.
#[derive(Template)]
#[template(path = "email/back_in_stock.txt")]
struct BackInStockText<'a> {
    name: &'a str,
    products: &'a [ProductLine],
}

/// Storefront link for a product.
fn product_url(base: &str, alias: &str) -> String {
    format!("{base}/en/product/{alias}")
}

/// Subject line for a batch.
///
/// A single product is named outright; several are counted. Kept plain on
/// purpose so the subject does not read like marketing.
#[must_use]
pub fn subject_line(products: &[Product]) -> String {
    match products {
        [] => "Product Back in Stock".to_string(),
        [only] => format!("Product Back in Stock: {} is now available", only.name),
        many => format!(
            "Product Back in Stock: {} products you track are now in stock",
            many.len()
        ),
    }
}

/// Render and send the restock email for one notification batch.
///
/// # Errors
///
/// Returns error if a template fails to render or the send fails.
pub async fn deliver_batch<M: Mailer>(
    mailer: &M,
    storefront_base: &str,
    batch: &NotificationBatch,
) -> Result<(), EmailError> {
    let lines: Vec<ProductLine> = batch
        .products
        .iter()
        .map(|product| ProductLine {
            name: product.name.clone(),
            sku: product.sku.clone(),
            description: product.description.clone(),
            image: product.image.clone(),
            price: product.usual_price,
            url: product_url(storefront_base, &product.alias),
        })
        .collect();

    let subject = subject_line(&batch.products);
    let html = BackInStockHtml {
        name: &batch.user.name,
        products: &lines,
    }
    .render()?;
    let text = BackInStockText {
        name: &batch.user.name,
        products: &lines,
    }
    .render()?;

    mailer.send(&batch.user.email, &subject, &text, &html).await
}
