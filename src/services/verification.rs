//! Follow-on verification for newly provisioned accounts.
//!
//! Delivery (templated email) lives outside this service. The sender runs
//! inside the provisioning transaction; an error rolls the account back.

use async_trait::async_trait;

use crate::config::Config;
use crate::db::Account;

#[async_trait]
pub trait VerificationSender: Send + Sync {
    async fn send(&self, account: &Account) -> anyhow::Result<()>;
}

/// Records the verification request in the log. Used when no delivery
/// backend is wired in.
pub struct LogVerificationSender {
    from: String,
    redirect: String,
}

impl LogVerificationSender {
    pub fn new(config: &Config) -> Self {
        Self {
            from: config.accounts.verification_from.clone(),
            redirect: config.accounts.verification_redirect.clone(),
        }
    }
}

#[async_trait]
impl VerificationSender for LogVerificationSender {
    async fn send(&self, account: &Account) -> anyhow::Result<()> {
        tracing::info!(
            account_id = account.id,
            to = %account.email,
            from = %self.from,
            redirect = %self.redirect,
            "Verification requested for new account"
        );
        Ok(())
    }
}
