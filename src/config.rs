use std::env;

use anyhow::Context;
use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub jwt: JwtConfig,
    pub payments: PaymentConfig,
    /// `None` when `SMTP_HOST` is not set; contact notifications are skipped.
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: SecretString,
    pub api_base: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
    pub notify_to: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(5 * 1024 * 1024);

        let jwt = JwtConfig {
            secret: SecretString::from(
                env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            ),
            ttl_minutes: env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };

        let payments = PaymentConfig {
            key_id: env::var("RAZORPAY_KEY_ID").context("RAZORPAY_KEY_ID is not set")?,
            key_secret: SecretString::from(
                env::var("RAZORPAY_KEY_SECRET").context("RAZORPAY_KEY_SECRET is not set")?,
            ),
            api_base: env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
        };

        Ok(Self {
            port,
            database_url,
            host,
            upload_dir,
            max_upload_bytes,
            jwt,
            payments,
            email: EmailConfig::from_env()?,
        })
    }
}

/// Room for the text fields of a multipart form.
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// Largest request body accepted: two images at the per-image limit plus form fields.
pub fn request_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(2)
        .saturating_add(FORM_FIELDS_ALLOWANCE)
}

impl EmailConfig {
    fn from_env() -> anyhow::Result<Option<Self>> {
        let Ok(smtp_host) = env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_username = env::var("SMTP_USERNAME").context("SMTP_USERNAME is not set")?;
        let from_address = env::var("EMAIL_FROM").unwrap_or_else(|_| smtp_username.clone());
        Ok(Some(Self {
            smtp_host,
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(587),
            smtp_password: SecretString::from(
                env::var("SMTP_PASSWORD").context("SMTP_PASSWORD is not set")?,
            ),
            notify_to: env::var("CONTACT_NOTIFY_TO").unwrap_or_else(|_| from_address.clone()),
            from_address,
            smtp_username,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_fits_two_images() {
        let per_image = 8 * 1024 * 1024;
        assert!(request_body_limit(per_image) > 2 * per_image);
        assert_eq!(request_body_limit(usize::MAX), usize::MAX);
    }
}
