use std::sync::Arc;

use crate::{
    config::{AppConfig, JwtConfig},
    db::OrmConn,
    mailer::EmailService,
    media::MediaStore,
    payments::{Payments, RazorpayGateway},
};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub jwt: JwtConfig,
    pub payments: Payments,
    pub media: MediaStore,
    /// `None` when SMTP is not configured.
    pub mailer: Option<EmailService>,
}

impl AppState {
    pub fn from_config(config: &AppConfig, orm: OrmConn) -> anyhow::Result<Self> {
        let gateway = RazorpayGateway::new(
            config.payments.api_base.clone(),
            config.payments.key_id.clone(),
            config.payments.key_secret.clone(),
        )?;

        let mailer = match &config.email {
            Some(email) => Some(EmailService::new(email)?),
            None => {
                tracing::info!("SMTP_HOST not set, contact notifications disabled");
                None
            }
        };

        Ok(Self {
            orm,
            jwt: config.jwt.clone(),
            payments: Payments {
                gateway: Arc::new(gateway),
                key_id: config.payments.key_id.clone(),
                key_secret: config.payments.key_secret.clone(),
                currency: config.payments.currency.clone(),
            },
            media: MediaStore::new(&config.upload_dir, config.max_upload_bytes),
            mailer,
        })
    }
}
