//! Authentication state trait and macro.

use crate::accounts::AccountService;

/// Router states that can authenticate requests.
pub trait HasAccounts {
    fn accounts(&self) -> &AccountService;
}

/// Implement `HasAccounts` for a state struct with an
/// `accounts: Arc<AccountService>` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub accounts: Arc<AccountService>,
/// }
///
/// impl_has_accounts!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_accounts {
    ($state_type:ty) => {
        impl $crate::auth::HasAccounts for $state_type {
            fn accounts(&self) -> &$crate::accounts::AccountService {
                &self.accounts
            }
        }
    };
}
