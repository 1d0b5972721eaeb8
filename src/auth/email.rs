//! Outbound email for account verification and password reset links

use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Mutex;

pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Email configuration
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            smtp_host: std::env::var("SMTP_HOST").ok()?,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            smtp_username: std::env::var("SMTP_USERNAME").ok()?,
            smtp_password: std::env::var("SMTP_PASSWORD").ok()?,
            from_email: std::env::var("FROM_EMAIL").ok()?,
            from_name: std::env::var("FROM_NAME").unwrap_or_else(|_| "Loan Tracker".to_string()),
        })
    }
}

/// SMTP email service
pub struct EmailService {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { config, mailer })
    }

    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let email = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_email).parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

/// A message accepted by the mock service
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mock email service for development/testing
#[derive(Default)]
pub struct MockEmailService {
    outbox: Mutex<Vec<SentEmail>>,
    fail_deliveries: bool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose every delivery fails
    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fail_deliveries: true,
        }
    }

    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), SendError> {
        if self.fail_deliveries {
            return Err(format!("mock delivery to {} refused", to_email).into());
        }
        log::info!("[MOCK EMAIL] {} -> {}", subject, to_email);
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentEmail {
                to: to_email.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Unified email sender
pub enum EmailSender {
    Real(EmailService),
    Mock(MockEmailService),
}

impl EmailSender {
    pub fn from_env() -> Self {
        match EmailConfig::from_env() {
            Some(config) => match EmailService::new(config) {
                Ok(service) => EmailSender::Real(service),
                Err(e) => {
                    log::warn!("Failed to initialize email service: {}. Using mock.", e);
                    EmailSender::Mock(MockEmailService::new())
                }
            },
            None => {
                log::info!("Email not configured. Using mock email service.");
                EmailSender::Mock(MockEmailService::new())
            }
        }
    }

    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), SendError> {
        match self {
            EmailSender::Real(service) => service.send(to_email, subject, body).await,
            EmailSender::Mock(mock) => mock.send(to_email, subject, body).await,
        }
    }

    /// Messages captured by the mock sender; always empty for SMTP
    pub fn sent(&self) -> Vec<SentEmail> {
        match self {
            EmailSender::Real(_) => Vec::new(),
            EmailSender::Mock(mock) => mock.sent(),
        }
    }
}

/// Escape text for interpolation into an HTML body or attribute
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn verification_email(name: &str, link: &str) -> (String, String) {
    let (name, link) = (escape_html(name), escape_html(link));
    let subject = "Welcome to Loan Tracker!".to_string();
    let body = format!(
        r#"<p>Hi {},</p>
<p>Welcome to our platform! Please verify your account by clicking the link below:</p>
<p><a href="{}">{}</a></p>
<p>Thank you!</p>"#,
        name, link, link
    );
    (subject, body)
}

pub fn password_reset_email(name: &str, link: &str) -> (String, String) {
    let (name, link) = (escape_html(name), escape_html(link));
    let subject = "Password Reset Request".to_string();
    let body = format!(
        r#"<p>Hi {},</p>
<p>It seems like you requested a password reset. You can sign back in by clicking the link below:</p>
<p><a href="{}">Reset Your Password</a></p>
<p>If you did not request a password reset, please ignore this email.</p>"#,
        name, link
    );
    (subject, body)
}
