// ============================================================================
// MERIDIAN COMMERCE - CHANNEL & CARRIER MODELS
// ============================================================================
// Module: channels/src/models.rs
// Description: Storefront channels and carrier shipping accounts
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use meridian_shared::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Shopify,
    Woocommerce,
}

impl ChannelType {
    /// Header carrying the storefront's HMAC signature.
    pub fn signature_header(&self) -> &'static str {
        match self {
            ChannelType::Shopify => "X-Shopify-Hmac-Sha256",
            ChannelType::Woocommerce => "X-WC-Webhook-Signature",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Shopify => f.write_str("SHOPIFY"),
            ChannelType::Woocommerce => f.write_str("WOOCOMMERCE"),
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SHOPIFY" => Ok(ChannelType::Shopify),
            "WOOCOMMERCE" => Ok(ChannelType::Woocommerce),
            other => Err(Error::validation("type", format!("unknown channel type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Active,
    Inactive,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Active => f.write_str("ACTIVE"),
            ChannelStatus::Inactive => f.write_str("INACTIVE"),
        }
    }
}

impl std::str::FromStr for ChannelStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(ChannelStatus::Active),
            "INACTIVE" => Ok(ChannelStatus::Inactive),
            other => Err(Error::validation("status", format!("unknown channel status: {other}"))),
        }
    }
}

/// A connected storefront. The webhook secret is the shared HMAC key for
/// inbound callbacks; it never appears in logs or responses.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub channel_type: ChannelType,
    pub status: ChannelStatus,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Carrier {
    Fedex,
    Dhl,
}

impl Carrier {
    pub fn as_key(&self) -> &'static str {
        match self {
            Carrier::Fedex => "fedex",
            Carrier::Dhl => "dhl",
        }
    }

    /// OAuth token endpoint, sandbox vs production per account `test_mode`.
    pub fn token_endpoint(&self, test_mode: bool) -> &'static str {
        match (self, test_mode) {
            (Carrier::Fedex, false) => "https://apis.fedex.com/oauth/token",
            (Carrier::Fedex, true) => "https://apis-sandbox.fedex.com/oauth/token",
            (Carrier::Dhl, false) => "https://api-eu.dhl.com/auth/accesstoken",
            (Carrier::Dhl, true) => "https://api-sandbox.dhl.com/auth/accesstoken",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Carrier::Fedex => f.write_str("FEDEX"),
            Carrier::Dhl => f.write_str("DHL"),
        }
    }
}

impl std::str::FromStr for Carrier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FEDEX" => Ok(Carrier::Fedex),
            "DHL" => Ok(Carrier::Dhl),
            other => Err(Error::validation("carrier", format!("unknown carrier: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    NeedsReauth,
    Inactive,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("ACTIVE"),
            AccountStatus::NeedsReauth => f.write_str("NEEDS_REAUTH"),
            AccountStatus::Inactive => f.write_str("INACTIVE"),
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "NEEDS_REAUTH" => Ok(AccountStatus::NeedsReauth),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            other => Err(Error::validation("status", format!("unknown account status: {other}"))),
        }
    }
}

/// Carrier account with envelope-encrypted API credentials. The stored
/// `client_id`/`client_secret` fields hold ciphertext blobs.
#[derive(Debug, Clone)]
pub struct ShippingAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub carrier: Carrier,
    pub account_number: String,
    pub test_mode: bool,
    pub encrypted_client_id: String,
    pub encrypted_client_secret: String,
    pub status: AccountStatus,
}

/// Decrypted credential pair. Debug output is redacted so the secret cannot
/// leak through logging.
#[derive(Clone)]
pub struct CarrierCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for CarrierCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
