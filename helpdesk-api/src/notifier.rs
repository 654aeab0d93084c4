//! Mail delivery for notifications.
//!
//! Notification rows are written inside the ticket transaction. Once that
//! commits, each row is handed to [`Notifier::dispatch`], which composes a
//! mail from a fixed template per event type and forwards it to the
//! configured [`MailTransport`]. Delivery is attempted once; a failure is
//! logged and reported as `false` but never undoes the stored notification.

use std::sync::Arc;

use diesel::prelude::*;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rocket::fairing::AdHoc;
use thiserror::Error;

use crate::config::{AppConfig, MailConfig, MailTransportKind};
use crate::models::{Notification, NotificationType, TicketStatus};
use crate::orm::DbRunner;
use crate::schema::{sectors, tickets, units, users};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mail transport misconfigured: {0}")]
    Config(String),
    #[cfg(any(test, feature = "test-staging"))]
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// A composed mail ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[rocket::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Writes mails to the log. Used in development.
pub struct LogTransport;

#[rocket::async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        info!("Mail to {} | {} | {}", mail.to, mail.subject, mail.html);
        Ok(())
    }
}

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MailError::Config("smtp_host is required".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?;
        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(SmtpMailTransport {
            mailer: builder.build(),
            from: config.from.parse()?,
        })
    }
}

#[rocket::async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse()?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html.clone())?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Ticket fields shown in a notification mail.
struct TicketSummary {
    id: i32,
    requester_name: String,
    status: TicketStatus,
    unit_name: String,
    sector_name: String,
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Subject and HTML body for a notification. Every user-supplied value is
/// escaped before it reaches the markup.
fn render(notification: &Notification, ticket: &TicketSummary, link: &str) -> (String, String) {
    let id = ticket.id;
    let footer = format!(
        r#"<p><a href="{}">Open ticket #{id}</a></p>"#,
        html_escape(link)
    );
    let message = html_escape(&notification.message);
    match notification.notification_type {
        NotificationType::NovoTicket => (
            format!("New ticket #{id} opened"),
            format!(
                "<h2>New ticket opened</h2>\
                 <ul>\
                 <li><strong>Ticket:</strong> #{id}</li>\
                 <li><strong>Requester:</strong> {}</li>\
                 <li><strong>Unit:</strong> {}</li>\
                 <li><strong>Sector:</strong> {}</li>\
                 </ul>{footer}",
                html_escape(&ticket.requester_name),
                html_escape(&ticket.unit_name),
                html_escape(&ticket.sector_name)
            ),
        ),
        NotificationType::Comentario => (
            format!("New comment on ticket #{id}"),
            format!("<h2>New comment</h2><p>{message}</p>{footer}"),
        ),
        NotificationType::MudancaStatus => (
            format!("Ticket #{id} status updated"),
            format!(
                "<h2>Status updated</h2><p>{message}</p><p>Current status: {}</p>{footer}",
                ticket.status
            ),
        ),
        NotificationType::Atribuicao => (
            format!("Ticket #{id} assigned"),
            format!("<h2>Ticket assigned</h2><p>{message}</p>{footer}"),
        ),
        NotificationType::Anexo => (
            format!("New attachment on ticket #{id}"),
            format!("<h2>New attachment</h2><p>{message}</p>{footer}"),
        ),
    }
}

/// Builds the mail for a stored notification. `None` when the recipient or
/// ticket no longer exists.
pub fn compose_mail(
    conn: &mut SqliteConnection,
    notification: &Notification,
    public_url: &str,
) -> QueryResult<Option<OutgoingMail>> {
    let Some(to) = users::table
        .find(notification.user_id)
        .select(users::email)
        .first::<String>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let row = tickets::table
        .inner_join(units::table)
        .inner_join(sectors::table)
        .filter(tickets::id.eq(notification.ticket_id))
        .select((
            tickets::id,
            tickets::requester_name,
            tickets::status,
            units::name,
            sectors::name,
        ))
        .first::<(i32, String, TicketStatus, String, String)>(conn)
        .optional()?;
    let Some((id, requester_name, status, unit_name, sector_name)) = row else {
        return Ok(None);
    };

    let ticket = TicketSummary {
        id,
        requester_name,
        status,
        unit_name,
        sector_name,
    };
    let link = format!("{}/tickets/{}", public_url.trim_end_matches('/'), id);
    let (subject, html) = render(notification, &ticket, &link);
    Ok(Some(OutgoingMail { to, subject, html }))
}

/// Forwards notifications to the mail transport. Placed in managed state.
pub struct Notifier {
    transport: Option<Arc<dyn MailTransport>>,
    public_url: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, public_url: impl Into<String>) -> Self {
        Notifier {
            transport: Some(transport),
            public_url: public_url.into(),
        }
    }

    /// A notifier that never sends mail.
    pub fn disabled() -> Self {
        Notifier {
            transport: None,
            public_url: String::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
        let transport: Arc<dyn MailTransport> = match config.mail.transport {
            MailTransportKind::Disabled => return Ok(Notifier::disabled()),
            MailTransportKind::Log => Arc::new(LogTransport),
            MailTransportKind::Smtp => Arc::new(SmtpMailTransport::from_config(&config.mail)?),
        };
        Ok(Notifier::new(transport, config.public_url.clone()))
    }

    /// Sends the mail for one notification. Returns whether the transport
    /// accepted it.
    pub async fn dispatch<D: DbRunner>(&self, db: &D, notification: &Notification) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };

        let stored = notification.clone();
        let public_url = self.public_url.clone();
        let mail = match db
            .run(move |conn| compose_mail(conn, &stored, &public_url))
            .await
        {
            Ok(Some(mail)) => mail,
            Ok(None) => {
                warn!(
                    "Notification {} has no recipient or ticket to mail about",
                    notification.id
                );
                return false;
            }
            Err(e) => {
                error!("Could not compose mail for notification {}: {}", notification.id, e);
                return false;
            }
        };

        match transport.send(&mail).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Mail for notification {} to {} failed: {}", notification.id, mail.to, e);
                false
            }
        }
    }

    /// Dispatches each notification in turn and returns how many were delivered.
    pub async fn dispatch_all<D: DbRunner>(&self, db: &D, notifications: &[Notification]) -> usize {
        let mut delivered = 0;
        for notification in notifications {
            if self.dispatch(db, notification).await {
                delivered += 1;
            }
        }
        delivered
    }
}

/// Places a [`Notifier`] built from the `[helpdesk.mail]` settings in managed
/// state, unless one was already provided.
pub fn notifier_fairing() -> AdHoc {
    AdHoc::try_on_ignite("Mail Notifier", |rocket| async {
        if rocket.state::<Notifier>().is_some() {
            return Ok(rocket);
        }
        let config = match rocket.figment().focus("helpdesk").extract::<AppConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Invalid [helpdesk] configuration: {}", e);
                return Err(rocket);
            }
        };
        match Notifier::from_config(&config) {
            Ok(notifier) => {
                info!("Mail transport: {:?}", config.mail.transport);
                Ok(rocket.manage(notifier))
            }
            Err(e) => {
                error!("Could not set up mail transport: {}", e);
                Err(rocket)
            }
        }
    })
}
