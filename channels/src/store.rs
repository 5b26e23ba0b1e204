// ============================================================================
// MERIDIAN COMMERCE - INTEGRATION STORE
// ============================================================================
// Module: channels/src/store.rs
// Description: Storage contract for channels and shipping accounts, with
//              Postgres and in-memory implementations
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use meridian_shared::Result;

use crate::models::{AccountStatus, Channel, ShippingAccount};

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Lookup by id alone: webhook routes are unauthenticated, the tenant is
    /// read off the channel itself.
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>>;

    async fn get_shipping_account(
        &self,
        org: Uuid,
        account_id: Uuid,
    ) -> Result<Option<ShippingAccount>>;

    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> Result<()>;
}

#[derive(Clone)]
pub struct PgIntegrationStore {
    pool: PgPool,
}

impl PgIntegrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationStore for PgIntegrationStore {
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>> {
        let row = sqlx::query(
            "SELECT id, organization_id, channel_type, status, webhook_secret \
             FROM channels WHERE id = $1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Channel {
                id: row.get("id"),
                organization_id: row.get("organization_id"),
                channel_type: row.get::<String, _>("channel_type").parse()?,
                status: row.get::<String, _>("status").parse()?,
                webhook_secret: row.get("webhook_secret"),
            })
        })
        .transpose()
    }

    async fn get_shipping_account(
        &self,
        org: Uuid,
        account_id: Uuid,
    ) -> Result<Option<ShippingAccount>> {
        let row = sqlx::query(
            "SELECT id, organization_id, carrier, account_number, test_mode, \
             encrypted_client_id, encrypted_client_secret, status \
             FROM shipping_accounts WHERE id = $1 AND organization_id = $2",
        )
        .bind(account_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ShippingAccount {
                id: row.get("id"),
                organization_id: row.get("organization_id"),
                carrier: row.get::<String, _>("carrier").parse()?,
                account_number: row.get("account_number"),
                test_mode: row.get("test_mode"),
                encrypted_client_id: row.get("encrypted_client_id"),
                encrypted_client_secret: row.get("encrypted_client_secret"),
                status: row.get::<String, _>("status").parse()?,
            })
        })
        .transpose()
    }

    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> Result<()> {
        sqlx::query("UPDATE shipping_accounts SET status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory implementation for tests.
#[derive(Default)]
pub struct MemoryIntegrationStore {
    channels: Mutex<HashMap<Uuid, Channel>>,
    accounts: Mutex<HashMap<Uuid, ShippingAccount>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_channel(&self, channel: Channel) {
        self.channels
            .lock()
            .expect("store poisoned")
            .insert(channel.id, channel);
    }

    pub fn seed_account(&self, account: ShippingAccount) {
        self.accounts
            .lock()
            .expect("store poisoned")
            .insert(account.id, account);
    }

    pub fn account_status(&self, account_id: Uuid) -> Option<AccountStatus> {
        self.accounts
            .lock()
            .expect("store poisoned")
            .get(&account_id)
            .map(|a| a.status)
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>> {
        Ok(self
            .channels
            .lock()
            .expect("store poisoned")
            .get(&channel_id)
            .cloned())
    }

    async fn get_shipping_account(
        &self,
        org: Uuid,
        account_id: Uuid,
    ) -> Result<Option<ShippingAccount>> {
        Ok(self
            .accounts
            .lock()
            .expect("store poisoned")
            .get(&account_id)
            .filter(|a| a.organization_id == org)
            .cloned())
    }

    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> Result<()> {
        if let Some(account) = self
            .accounts
            .lock()
            .expect("store poisoned")
            .get_mut(&account_id)
        {
            account.status = status;
        }
        Ok(())
    }
}
