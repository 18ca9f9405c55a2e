//! qsl-auth: who is calling, and which tenant database they own.
//!
//! - [`JwtService`] issues and verifies access tokens
//! - [`password`] hashes with bcrypt off the async runtime
//! - [`UserDirectory`] reads accounts from the administrative database
//! - [`AuthenticateHook`] turns a bearer token into a tenant-bound `TenantContext`
//! - [`ProtectHook`] strips secrets from results

pub mod directory;
pub mod error;
pub mod hooks;
pub mod jwt;
pub mod options;
pub mod params;
pub mod password;

pub use directory::{tenant_database_name, NewUser, UserDirectory, TENANT_DATABASE_PREFIX};
pub use error::AuthError;
pub use hooks::{AuthenticateHook, ProtectHook};
pub use jwt::{Claims, JwtService};
pub use options::{AuthOptions, JwtAlgorithm, JwtOptions};
pub use params::{extract_bearer_token, AuthParams};
