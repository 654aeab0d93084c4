//! Application settings read from the `helpdesk` table of the Rocket figment.
//!
//! ```toml
//! [default.helpdesk]
//! upload_dir = "uploads"
//! session_days = 7
//! secure_cookies = true
//! public_url = "https://helpdesk.example.com"
//!
//! [default.helpdesk.mail]
//! transport = "smtp"
//! smtp_host = "smtp.example.com"
//! smtp_port = 587
//! from = "Help Desk <helpdesk@example.com>"
//! ```

use std::path::PathBuf;

use rocket::fairing::AdHoc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory attachment contents are written to.
    pub upload_dir: PathBuf,
    /// Lifetime of a session and of its cookie.
    pub session_days: i64,
    pub secure_cookies: bool,
    /// Base URL used for links in notification mails.
    pub public_url: String,
    pub mail: MailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            upload_dir: PathBuf::from("uploads"),
            session_days: 7,
            secure_cookies: true,
            public_url: "http://localhost:8000".to_string(),
            mail: MailConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    /// Write the composed mail to the log instead of sending it.
    Log,
    Smtp,
    Disabled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub transport: MailTransportKind,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            transport: MailTransportKind::Log,
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_password: None,
            from: "Help Desk <helpdesk@localhost>".to_string(),
        }
    }
}

/// Extracts [`AppConfig`] and places it in managed state.
pub fn app_config_fairing() -> AdHoc {
    AdHoc::try_on_ignite("Application Config", |rocket| async {
        match rocket.figment().focus("helpdesk").extract::<AppConfig>() {
            Ok(config) => {
                info!(
                    "Uploads stored in {}, sessions last {} days",
                    config.upload_dir.display(),
                    config.session_days
                );
                Ok(rocket.manage(config))
            }
            Err(e) => {
                error!("Invalid [helpdesk] configuration: {}", e);
                Err(rocket)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::Figment;
    use rocket::figment::providers::Serialized;

    #[test]
    fn missing_table_falls_back_to_defaults() {
        let config: AppConfig = Figment::new().focus("helpdesk").extract().unwrap();
        assert_eq!(config.session_days, 7);
        assert!(config.secure_cookies);
        assert_eq!(config.mail.transport, MailTransportKind::Log);
    }

    #[test]
    fn nested_mail_settings_are_read() {
        let figment = Figment::new()
            .merge(Serialized::default("helpdesk.session_days", 3))
            .merge(Serialized::default("helpdesk.mail.transport", "smtp"))
            .merge(Serialized::default("helpdesk.mail.smtp_port", 2525));
        let config: AppConfig = figment.focus("helpdesk").extract().unwrap();
        assert_eq!(config.session_days, 3);
        assert_eq!(config.mail.transport, MailTransportKind::Smtp);
        assert_eq!(config.mail.smtp_port, Some(2525));
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    }
}
