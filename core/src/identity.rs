/*
    moodtune | Mood-driven song recommendations for voice assistants.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::auth::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use log::info;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

const SIGN_IN_TOKEN_LENGTH: usize = 48;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity backend failure: {0}")]
    Backend(String),
}

/// Account record for a user who signed in through the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

pub fn identity_uid(provider_user_id: &str) -> String {
    format!("spotify:{}", provider_user_id)
}

/// Creates or updates accounts, keeps their provider tokens and issues sign-in tokens.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Provisions the `spotify:<id>` account and returns a fresh sign-in token for it.
    async fn provision(
        &self,
        profile: &ProviderProfile,
        tokens: &ProviderTokens,
    ) -> Result<String, IdentityError>;

    async fn identity(&self, uid: &str) -> Result<Option<Identity>, IdentityError>;

    /// Resolves a sign-in token back to the account it was issued for.
    async fn uid_for_sign_in_token(&self, token: &str) -> Result<Option<String>, IdentityError>;
}

#[derive(Default)]
struct Accounts {
    identities: HashMap<String, Identity>,
    sign_in_tokens: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    accounts: RwLock<Accounts>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_sign_in_token() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SIGN_IN_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn provision(
        &self,
        profile: &ProviderProfile,
        tokens: &ProviderTokens,
    ) -> Result<String, IdentityError> {
        let uid = identity_uid(&profile.id);
        let mut accounts = self.accounts.write().await;

        // A refresh token is only handed out on first consent; keep the old one otherwise.
        let previous_refresh = accounts
            .identities
            .get(&uid)
            .and_then(|identity| identity.refresh_token.clone());
        let created = !accounts.identities.contains_key(&uid);

        accounts.identities.insert(
            uid.clone(),
            Identity {
                uid: uid.clone(),
                display_name: profile.display_name.clone(),
                email: profile.email.clone(),
                photo_url: profile.image_url.clone(),
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token.clone().or(previous_refresh),
            },
        );

        // Signing in again revokes the account's previous sign-in token.
        let sign_in_token = Self::generate_sign_in_token();
        accounts.sign_in_tokens.retain(|_, owner| *owner != uid);
        accounts
            .sign_in_tokens
            .insert(sign_in_token.clone(), uid.clone());

        info!(
            "{} account {}",
            if created { "Created" } else { "Updated" },
            uid
        );
        Ok(sign_in_token)
    }

    async fn identity(&self, uid: &str) -> Result<Option<Identity>, IdentityError> {
        Ok(self.accounts.read().await.identities.get(uid).cloned())
    }

    async fn uid_for_sign_in_token(&self, token: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.accounts.read().await.sign_in_tokens.get(token).cloned())
    }
}
