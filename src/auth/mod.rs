//! Bearer-token authentication for the HTTP layer.
//!
//! Handlers take an [`Auth`] extractor parameterized by a
//! [`RoleConstraint`]. The extractor resolves the `Authorization: Bearer`
//! header through [`AccountService::verify_access`], so a token is only
//! accepted while its version matches the user's live access counter.
//!
//! [`AccountService::verify_access`]: crate::accounts::AccountService::verify_access

mod errors;
mod extractors;
mod ip;
mod state;

pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{ActiveOnly, AdminOnly, AnyRole, Auth, RoleConstraint};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAccounts;
