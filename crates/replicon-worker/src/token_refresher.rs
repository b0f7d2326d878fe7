//! Wires the Token Cache's `TokenRefresher` seam to the Broker
//! Client: on a cache miss, fetch the follower's stored broker credentials,
//! run the two-stage vendor+client login, and hand back the session token.

use anyhow::{Context, Result};
use sqlx::PgPool;

use replicon_broker::{BrokerAdapter, BrokerCredentials};
use replicon_cache::TokenRefresher;
use replicon_schemas::UserId;

pub struct BrokerTokenRefresher<B> {
    pool: PgPool,
    broker: std::sync::Arc<B>,
}

impl<B> BrokerTokenRefresher<B> {
    pub fn new(pool: PgPool, broker: std::sync::Arc<B>) -> Self {
        Self { pool, broker }
    }
}

#[async_trait::async_trait]
impl<B: BrokerAdapter> TokenRefresher for BrokerTokenRefresher<B> {
    async fn refresh(&self, user_id: UserId) -> Result<String> {
        let user = replicon_db::users::get(&self.pool, user_id)
            .await?
            .with_context(|| format!("no user row for id {user_id}"))?;

        let credentials = BrokerCredentials {
            client_code: user.broker_account_code.clone(),
            broker_user_id: user.broker_user_id.clone(),
            encrypted_secret: user.broker_password_encrypted.clone(),
            public_ip: user.public_ip.clone(),
        };

        let vendor = self
            .broker
            .vendor_login()
            .await
            .map_err(|e| anyhow::anyhow!("vendor_login failed for user {user_id}: {e}"))?;

        let client = self
            .broker
            .client_login(&vendor, &credentials)
            .await
            .map_err(|e| anyhow::anyhow!("client_login failed for user {user_id}: {e}"))?;

        tracing::info!(user_id, token_len = client.session_token.len(), "refreshed broker session token");

        Ok(client.session_token)
    }
}
