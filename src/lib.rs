//! faas-kit: helpers for serverless functions: local and vault secrets,
//! calling-convention normalization, parameter validation/expansion,
//! `{{ name }}` templates and vault-described service calls.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod host;
pub mod http;
pub mod params;
pub mod secrets;
pub mod template;
pub mod vault;
