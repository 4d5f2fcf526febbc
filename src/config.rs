//! Environment configuration.

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    /// Absent means order emails are logged instead of delivered.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    /// Recipient of new-order alerts.
    pub operator: String,
}

const DEFAULT_JWT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let port = opt_parsed("PORT")?.unwrap_or(5000);
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET is required")?;
        let jwt_ttl_secs = opt_parsed("JWT_EXPIRES_IN_SECS")?.unwrap_or(DEFAULT_JWT_TTL_SECS);

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => {
                let from = std::env::var("SMTP_FROM")
                    .context("SMTP_FROM is required when SMTP_HOST is set")?;
                Some(SmtpConfig {
                    host,
                    port: opt_parsed("SMTP_PORT")?.unwrap_or(587),
                    username: std::env::var("SMTP_USERNAME")
                        .context("SMTP_USERNAME is required when SMTP_HOST is set")?,
                    password: std::env::var("SMTP_PASSWORD")
                        .context("SMTP_PASSWORD is required when SMTP_HOST is set")?,
                    operator: std::env::var("OPERATOR_EMAIL").unwrap_or_else(|_| from.clone()),
                    from,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            jwt_ttl_secs,
            smtp,
        })
    }
}

fn opt_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    std::env::var(name)
        .ok()
        .map(|value| {
            value
                .parse()
                .map_err(|_| anyhow::anyhow!("{name} must be a number, got {value:?}"))
        })
        .transpose()
}
