//! Entitlement gate in front of the embed.
//!
//! [`resolve`] decides what the page shows; [`page`] turns that decision
//! into DOM.
pub mod checkout;
pub mod page;
pub mod supabase;

use crate::config::{EmbedConfig, PageConfig};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row of the entitlement table. Read-only from here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EntitlementRecord {
    #[serde(default)]
    pub has_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingMode {
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPrompt {
    pub mode: BillingMode,
    pub price_id: String,
}

#[async_trait(?Send)]
pub trait AuthProvider {
    async fn current_user(&self) -> Result<Option<User>>;
}

#[async_trait(?Send)]
pub trait EntitlementStore {
    async fn entitlement(&self, user_id: &str) -> Result<Option<EntitlementRecord>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    /// No session; normally unreachable behind the site's auth middleware.
    SignIn,
    Embed { user: User, config: EmbedConfig },
    Checkout { user: User, prompt: CheckoutPrompt },
}

/// Looks up the user and their entitlement and picks the page to show.
///
/// A failed entitlement lookup counts as no access.
pub async fn resolve(
    config: &PageConfig,
    auth: &dyn AuthProvider,
    store: &dyn EntitlementStore,
) -> PageView {
    let user = match auth.current_user().await {
        Ok(Some(user)) => user,
        Ok(None) => {
            log::warn!("no signed-in user on gated page");
            return PageView::SignIn;
        }
        Err(err) => {
            log::error!("could not resolve current user: {err:#}");
            return PageView::SignIn;
        }
    };

    let has_access = match store.entitlement(&user.id).await {
        Ok(record) => record.is_some_and(|record| record.has_access),
        Err(err) => {
            log::warn!("entitlement lookup failed for {}: {err:#}", user.id);
            false
        }
    };
    log::info!("user {} has_access={has_access}", user.id);

    if has_access {
        PageView::Embed {
            user,
            config: EmbedConfig {
                responsive: true,
                maintain_aspect_ratio: true,
                ..config.embed.clone()
            },
        }
    } else {
        PageView::Checkout {
            user,
            prompt: CheckoutPrompt {
                mode: BillingMode::Subscription,
                price_id: config.subscription_price_id.clone(),
            },
        }
    }
}
