//! Outbound transactional mail.
//!
//! SMTP delivery via lettre with askama-rendered HTML and plain-text bodies.
//! Checkout treats every send as best-effort: a failed or unconfigured
//! delivery is logged and the order stands.

use askama::Template;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::domain::order::Order;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), DeliveryError>;
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    customer: &'a str,
    order: &'a Order,
    placed_at: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    customer: &'a str,
    order: &'a Order,
    placed_at: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_alert.html")]
struct OrderAlertHtml<'a> {
    customer: &'a str,
    customer_email: &'a str,
    order: &'a Order,
}

#[derive(Template)]
#[template(path = "email/order_alert.txt")]
struct OrderAlertText<'a> {
    customer: &'a str,
    customer_email: &'a str,
    order: &'a Order,
}

/// The customer-facing confirmation for a placed order.
pub fn order_confirmation(
    customer: &str,
    to: &str,
    order: &Order,
) -> Result<Email, DeliveryError> {
    let placed_at = order.created_at.format("%Y-%m-%d %H:%M UTC").to_string();
    let html = OrderConfirmationHtml {
        customer,
        order,
        placed_at: &placed_at,
    }
    .render()?;
    let text = OrderConfirmationText {
        customer,
        order,
        placed_at: &placed_at,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: "Your Order Confirmation".to_string(),
        html,
        text,
    })
}

/// The operator-facing alert about a new order.
pub fn order_alert(
    customer: &str,
    customer_email: &str,
    to: &str,
    order: &Order,
) -> Result<Email, DeliveryError> {
    let html = OrderAlertHtml {
        customer,
        customer_email,
        order,
    }
    .render()?;
    let text = OrderAlertText {
        customer,
        customer_email,
        order,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: "New Order Received".to_string(),
        html,
        text,
    })
}

/// lettre-backed SMTP delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured: messages are logged, not sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, skipping delivery"
        );
        Ok(())
    }
}
