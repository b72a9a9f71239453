//! Command line entry points.
//!
//! ```bash
//! collection-share                       # run the HTTP server
//! collection-share publish "Basics" --category warmup
//! collection-share set-tier 42 subscribed
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::db::models::{CollectionDraft, SubscriptionTier};
use crate::error::AppResult;
use crate::services::collections::CollectionService;
use crate::services::quota::QuotaEnforcer;
use crate::AppState;

#[derive(Debug, Parser)]
#[command(name = "collection-share")]
#[command(about = "Account provisioning and collection sharing service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (the default)
    Serve,
    /// Create a public collection granted to every new account
    Publish {
        name: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        comments: String,
    },
    /// Move an account to a subscription tier
    SetTier {
        account_id: i64,
        #[arg(value_parser = parse_tier)]
        tier: SubscriptionTier,
    },
}

fn parse_tier(s: &str) -> Result<SubscriptionTier, String> {
    SubscriptionTier::from_str(s)
        .ok_or_else(|| format!("unknown tier '{}', expected unsubscribed or subscribed", s))
}

/// Run one operator command against the store.
pub async fn run_admin(state: &Arc<AppState>, command: Command) -> AppResult<()> {
    match command {
        Command::Serve => Ok(()),
        Command::Publish {
            name,
            category,
            comments,
        } => {
            let draft = CollectionDraft {
                name,
                category,
                comments,
            };
            let collection = CollectionService::publish(state, draft).await?;
            println!("{}", collection.id);
            Ok(())
        }
        Command::SetTier { account_id, tier } => {
            let subscription = QuotaEnforcer::change_tier(state, account_id, tier).await?;
            println!("{} {}", subscription.tier.as_str(), subscription.max_collections);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountDraft;
    use crate::db::{CollectionRepository, SubscriptionRepository};
    use crate::db::testing::test_state;
    use crate::services::provisioning::AccountProvisioner;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["collection-share"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn unknown_tier_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["collection-share", "set-tier", "1", "gold"]).is_err());

        let cli = Cli::try_parse_from(["collection-share", "set-tier", "7", "Subscribed"]).unwrap();
        match cli.command {
            Some(Command::SetTier { account_id, tier }) => {
                assert_eq!(account_id, 7);
                assert_eq!(tier, SubscriptionTier::Subscribed);
            }
            other => panic!("expected set-tier, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn admin_commands_reach_the_store() {
        let state = test_state().await;

        let cli = Cli::try_parse_from(["collection-share", "publish", "Basics", "--category", "warmup"])
            .unwrap();
        run_admin(&state, cli.command.unwrap()).await.unwrap();
        let public = CollectionRepository::find_public_ids(state.store.pool()).await.unwrap();
        assert_eq!(public.len(), 1);

        let account = AccountProvisioner::provision_account(
            &state,
            AccountDraft {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await
        .unwrap();
        run_admin(
            &state,
            Command::SetTier {
                account_id: account.id,
                tier: SubscriptionTier::Subscribed,
            },
        )
        .await
        .unwrap();
        let subscription = SubscriptionRepository::find_by_account(state.store.pool(), account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.tier, SubscriptionTier::Subscribed);
    }
}
