//! Email service for newsletter mail.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use minijinja::{AutoEscape, Environment, context};
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub const BRAND: &str = "Books&Bites";
pub const WELCOME_SUBJECT: &str = "📚 Welcome to Books&Bites Newsletter!";

const WELCOME_HTML: &str = "welcome.html";
const WELCOME_TEXT: &str = "welcome.txt";

/// Sends the emails the application produces. The outbox worker is the only caller.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome_email(&self, to_email: &str) -> Result<(), Error>;
}

/// A rendered welcome email.
#[derive(Debug, Clone)]
pub struct WelcomeEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
    reply_to: Option<Mailbox>,
    site_url: String,
    templates: Environment<'static>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                // Use SMTP transport
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from = Mailbox::new(Some(email_config.from_name.clone()), parse_address(&email_config.from_email, "from")?);
        let reply_to = email_config
            .reply_to
            .as_deref()
            .map(|addr| parse_address(addr, "reply-to").map(|address| Mailbox::new(None, address)))
            .transpose()?;

        Ok(Self {
            transport,
            from,
            reply_to,
            site_url: config.site_url.clone(),
            templates: templates()?,
        })
    }

    /// Render the welcome email for the configured site.
    pub fn render_welcome(&self) -> Result<WelcomeEmail, Error> {
        let ctx = context! {
            brand => BRAND,
            site_url => &self.site_url,
            year => Utc::now().year(),
        };

        let render = |name: &str| {
            self.templates
                .get_template(name)
                .and_then(|template| template.render(&ctx))
                .map_err(|e| Error::Internal {
                    operation: format!("render {name} template: {e}"),
                })
        };

        Ok(WelcomeEmail {
            subject: WELCOME_SUBJECT.to_string(),
            html: render(WELCOME_HTML)?,
            text: render(WELCOME_TEXT)?,
        })
    }

    async fn send_email(&self, to_email: &str, email: WelcomeEmail) -> Result<(), Error> {
        let to = Mailbox::new(None, parse_address(to_email, "to")?);

        let mut builder = Message::builder().from(self.from.clone()).to(to).subject(email.subject);
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        // Send based on transport type
        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_welcome_email(&self, to_email: &str) -> Result<(), Error> {
        let email = self.render_welcome()?;
        self.send_email(to_email, email).await
    }
}

fn parse_address(address: &str, field: &str) -> Result<Address, Error> {
    address.parse::<Address>().map_err(|e| Error::Internal {
        operation: format!("parse {field} email: {e}"),
    })
}

fn templates() -> Result<Environment<'static>, Error> {
    let mut env = Environment::new();
    // Only operator-supplied config values are rendered, and the link must stay a plain URL
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template(WELCOME_HTML, include_str!("../templates/welcome.html.j2"))
        .and_then(|_| env.add_template(WELCOME_TEXT, include_str!("../templates/welcome.txt.j2")))
        .map_err(|e| Error::Internal {
            operation: format!("load email templates: {e}"),
        })?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    #[tokio::test]
    async fn test_email_service_creation() {
        let (config, _dir) = create_test_config();
        assert!(EmailService::new(&config).is_ok());
    }

    #[test]
    fn test_welcome_email_links_site() {
        let (mut config, _dir) = create_test_config();
        config.site_url = "https://booksandbites.example".to_string();
        let email_service = EmailService::new(&config).unwrap();

        let email = email_service.render_welcome().unwrap();

        assert_eq!(email.subject, "📚 Welcome to Books&Bites Newsletter!");
        assert!(email.html.contains(r#"href="https://booksandbites.example""#));
        assert!(email.html.contains("Welcome to Books&Bites!"));
        assert!(email.text.contains("Visit us at: https://booksandbites.example"));
        assert!(email.text.contains("Weekly book reviews and recommendations"));
    }

    #[tokio::test]
    async fn test_welcome_email_written_by_file_transport() {
        let (config, dir) = create_test_config();
        let email_service = EmailService::new(&config).unwrap();

        email_service.send_welcome_email("reader@example.com").await.unwrap();

        let emails: Vec<_> = std::fs::read_dir(dir.path().join("emails"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "eml"))
            .collect();
        assert_eq!(emails.len(), 1);

        let raw = std::fs::read_to_string(&emails[0]).unwrap();
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let (config, _dir) = create_test_config();
        let email_service = EmailService::new(&config).unwrap();
        assert!(email_service.send_welcome_email("not an address").await.is_err());
    }
}
