//! Wallet session lifecycle.
//!
//! At most one account is connected at a time. Every bind and disconnect
//! bumps a generation counter; anything derived from an older generation
//! (an in-flight aggregation, a cached handle) is stale and must be dropped.

use cb_api_types::AccountAddress;
use cb_ledger::LedgerBinder;
use tracing::{debug, info};

use crate::errors::SessionError;

/// The injected wallet surface the session manager consumes.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait WalletProvider {
    /// Accounts already authorized for this origin. Never prompts.
    async fn existing_accounts(&self) -> Result<Vec<AccountAddress>, SessionError>;

    /// Ask the user to authorize accounts. Prompts.
    async fn request_accounts(&self) -> Result<Vec<AccountAddress>, SessionError>;
}

/// A live session: one bound ledger handle, pinned to the account and
/// generation it was created under.
pub struct SessionHandle<H> {
    pub account: AccountAddress,
    pub generation: u64,
    pub ledger: H,
}

/// Owns the connected-account state and all transitions into and out of it.
pub struct SessionManager<P, B> {
    provider: P,
    binder: B,
    account: Option<AccountAddress>,
    generation: u64,
}

impl<P, B> SessionManager<P, B>
where
    P: WalletProvider,
    B: LedgerBinder,
{
    pub fn new(provider: P, binder: B) -> Self {
        Self {
            provider,
            binder,
            account: None,
            generation: 0,
        }
    }

    /// The currently connected account, if any.
    pub fn account(&self) -> Option<&AccountAddress> {
        self.account.as_ref()
    }

    /// Current session generation. Bumped on every bind and disconnect.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Silent session restore on load. An absent provider or an empty
    /// authorization list is a normal no-session outcome, not an error.
    pub async fn check_existing_session(
        &mut self,
    ) -> Result<Option<SessionHandle<B::Handle>>, SessionError> {
        let accounts = match self.provider.existing_accounts().await {
            Ok(accounts) => accounts,
            Err(SessionError::ProviderUnavailable) => return Ok(None),
            Err(e) => return Err(e),
        };
        match accounts.into_iter().next() {
            Some(account) => self.bind(account).map(Some),
            None => Ok(None),
        }
    }

    /// Explicit connect. Surfaces [`SessionError::Rejected`] when the user
    /// declines, [`SessionError::ProviderUnavailable`] when nothing is
    /// injected.
    pub async fn request_connection(
        &mut self,
    ) -> Result<SessionHandle<B::Handle>, SessionError> {
        let accounts = self.provider.request_accounts().await?;
        let account = accounts.into_iter().next().ok_or(SessionError::Rejected)?;
        self.bind(account)
    }

    /// Provider-initiated account change. An empty list is a disconnect;
    /// otherwise the session re-binds to the new primary account.
    pub fn accounts_changed(
        &mut self,
        accounts: &[AccountAddress],
    ) -> Result<Option<SessionHandle<B::Handle>>, SessionError> {
        match accounts.first() {
            None => {
                self.disconnect();
                Ok(None)
            }
            Some(account) => self.bind(account.clone()).map(Some),
        }
    }

    /// Drop the connected account. In-flight work from earlier generations
    /// can no longer be applied.
    pub fn disconnect(&mut self) {
        if self.account.take().is_some() {
            info!("wallet disconnected");
        }
        self.generation += 1;
    }

    fn bind(&mut self, account: AccountAddress) -> Result<SessionHandle<B::Handle>, SessionError> {
        let ledger = self.binder.bind(&account)?;
        self.generation += 1;
        self.account = Some(account.clone());
        debug!(%account, generation = self.generation, "wallet session bound");
        Ok(SessionHandle {
            account,
            generation: self.generation,
            ledger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_ledger::memory::MemoryChain;

    /// Scripted provider: fixed answers, no browser.
    struct FakeProvider {
        existing: Result<Vec<AccountAddress>, SessionError>,
        requested: Result<Vec<AccountAddress>, SessionError>,
    }

    #[async_trait::async_trait]
    impl WalletProvider for FakeProvider {
        async fn existing_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
            clone_result(&self.existing)
        }

        async fn request_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
            clone_result(&self.requested)
        }
    }

    fn clone_result(
        r: &Result<Vec<AccountAddress>, SessionError>,
    ) -> Result<Vec<AccountAddress>, SessionError> {
        match r {
            Ok(accounts) => Ok(accounts.clone()),
            Err(SessionError::ProviderUnavailable) => Err(SessionError::ProviderUnavailable),
            Err(SessionError::Rejected) => Err(SessionError::Rejected),
            Err(e) => Err(SessionError::Provider(e.to_string())),
        }
    }

    fn manager(
        existing: Result<Vec<AccountAddress>, SessionError>,
        requested: Result<Vec<AccountAddress>, SessionError>,
    ) -> SessionManager<FakeProvider, MemoryChain> {
        SessionManager::new(
            FakeProvider {
                existing,
                requested,
            },
            MemoryChain::new(AccountAddress::new("0xowner")),
        )
    }

    #[tokio::test]
    async fn missing_provider_is_a_quiet_no_session() {
        let mut mgr = manager(Err(SessionError::ProviderUnavailable), Ok(vec![]));
        assert!(mgr.check_existing_session().await.unwrap().is_none());
        assert!(mgr.account().is_none());
    }

    #[tokio::test]
    async fn existing_authorization_restores_the_session() {
        let account = AccountAddress::new("0xAAA");
        let mut mgr = manager(Ok(vec![account.clone()]), Ok(vec![]));
        let handle = mgr.check_existing_session().await.unwrap().unwrap();
        assert_eq!(handle.account, account);
        assert_eq!(mgr.account(), Some(&account));
    }

    #[tokio::test]
    async fn rejection_surfaces_and_leaves_no_session() {
        let mut mgr = manager(Ok(vec![]), Err(SessionError::Rejected));
        assert!(matches!(
            mgr.request_connection().await,
            Err(SessionError::Rejected)
        ));
        assert!(mgr.account().is_none());
    }

    #[tokio::test]
    async fn account_switch_rebinds_and_bumps_the_generation() {
        let first = AccountAddress::new("0xaaa");
        let second = AccountAddress::new("0xbbb");
        let mut mgr = manager(Ok(vec![]), Ok(vec![first.clone()]));

        let h1 = mgr.request_connection().await.unwrap();
        let h2 = mgr.accounts_changed(&[second.clone()]).unwrap().unwrap();
        assert!(h2.generation > h1.generation);
        assert_eq!(mgr.account(), Some(&second));

        assert!(mgr.accounts_changed(&[]).unwrap().is_none());
        assert!(mgr.account().is_none());
        assert!(mgr.generation() > h2.generation);
    }
}
