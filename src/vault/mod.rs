//! HashiCorp Vault lookups authenticated with credentials from the local secret store.
//!
//! `vault-uri` holds the KV read prefix including the trailing slash
//! (e.g. `http://vault:8200/v1/secret/data/`) and `vault-token` the token sent
//! as `X-Vault-Token`.

pub mod client;

pub use client::VaultClient;

/// Secret holding the vault read prefix.
pub const VAULT_URI_SECRET: &str = "vault-uri";

/// Secret holding the vault token.
pub const VAULT_TOKEN_SECRET: &str = "vault-token";
