use super::{AuthProvider, EntitlementRecord, EntitlementStore, User};
use crate::browser;
use crate::config::PageConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Minimal Supabase REST client: the signed-in user and one table read.
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    session_key: String,
    table: String,
}

#[derive(Debug, Deserialize)]
struct StoredSession {
    access_token: String,
}

impl SupabaseClient {
    pub fn new(config: &PageConfig) -> Self {
        Self {
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            session_key: config.session_storage_key.clone(),
            table: config.entitlement_table.clone(),
        }
    }

    pub fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }

    pub fn entitlement_url(&self, user_id: &str) -> String {
        format!(
            "{}/rest/v1/{}?select=has_access&user_id=eq.{}&limit=1",
            self.base_url,
            self.table,
            urlencoding::encode(user_id)
        )
    }

    fn access_token(&self) -> Result<Option<String>> {
        let Some(raw) = browser::local_storage_item(&self.session_key)? else {
            return Ok(None);
        };
        let session: StoredSession = serde_json::from_str(&raw)
            .with_context(|| format!("malformed session in localStorage['{}']", self.session_key))?;
        Ok(Some(session.access_token))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let bearer = format!("Bearer {token}");
        browser::fetch_json_with(
            url,
            "GET",
            &[
                ("apikey", self.anon_key.as_str()),
                ("Authorization", bearer.as_str()),
                ("Accept", "application/json"),
            ],
            None::<&()>,
        )
        .await
    }

    fn token_or_anon(&self) -> Result<String> {
        Ok(self.access_token()?.unwrap_or_else(|| self.anon_key.clone()))
    }
}

#[async_trait(?Send)]
impl AuthProvider for SupabaseClient {
    async fn current_user(&self) -> Result<Option<User>> {
        let Some(token) = self.access_token()? else {
            return Ok(None);
        };
        let user = self
            .get::<User>(&self.user_url(), &token)
            .await
            .context("fetching current user")?;
        Ok(Some(user))
    }
}

#[async_trait(?Send)]
impl EntitlementStore for SupabaseClient {
    async fn entitlement(&self, user_id: &str) -> Result<Option<EntitlementRecord>> {
        if self.base_url.is_empty() {
            return Err(anyhow!("supabaseUrl is not configured"));
        }
        let token = self.token_or_anon()?;
        let rows: Vec<EntitlementRecord> = self
            .get(&self.entitlement_url(user_id), &token)
            .await
            .with_context(|| format!("fetching entitlement for {user_id}"))?;
        Ok(rows.into_iter().next())
    }
}
