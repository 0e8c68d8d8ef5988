//! Global application state.
//!
//! Uses `RefCell`-wrapped `thread_local!` storage (WASM is single-threaded).
//! The session manager lives in its own slot and is taken out around await
//! points so no borrow is held across them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cb_api_types::{AccountAddress, RegistryEntry, TokenMetadata};
use cb_bridge_core::{ChainView, SessionManager, ViewSlot, ViewTicket};
use cb_registry::RegistrySource;

use crate::ledger::{ProviderChain, ProviderLedger};
use crate::provider::Ethereum;

pub type Manager = SessionManager<Ethereum, ProviderChain>;

/// Central application state.
#[derive(Default)]
pub struct AppState {
    pub ledger: Option<ProviderLedger>,
    pub registry: Vec<RegistryEntry>,
    pub metadata: HashMap<u64, TokenMetadata>,
    /// Bridges whose create landed but whose mint did not:
    /// registry id → (project id, outstanding amount).
    pub pending_mint: HashMap<String, (u64, u32)>,
    pub busy: bool,
}

thread_local! {
    static STATE: RefCell<AppState> = RefCell::new(AppState::default());
    static MANAGER: RefCell<Option<Manager>> = const { RefCell::new(None) };
    static SLOT: RefCell<ViewSlot> = RefCell::new(ViewSlot::new());
    static SOURCE: Rc<RegistrySource> = Rc::new(RegistrySource::default());
}

/// Run a closure with shared read access to the state.
pub fn with<F, R>(f: F) -> R
where
    F: FnOnce(&AppState) -> R,
{
    STATE.with(|s| f(&s.borrow()))
}

/// Run a closure with mutable access to the state.
pub fn with_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    STATE.with(|s| f(&mut s.borrow_mut()))
}

// ── Convenience accessors ──

pub fn ledger() -> Option<ProviderLedger> {
    with(|s| s.ledger.clone())
}

pub fn set_ledger(ledger: Option<ProviderLedger>) {
    with_mut(|s| s.ledger = ledger);
}

pub fn account() -> Option<AccountAddress> {
    with(|s| s.ledger.as_ref().map(|l| cb_ledger::CarbonLedger::account(l).clone()))
}

pub fn registry() -> Vec<RegistryEntry> {
    with(|s| s.registry.clone())
}

pub fn set_registry(entries: Vec<RegistryEntry>) {
    with_mut(|s| s.registry = entries);
}

pub fn metadata() -> HashMap<u64, TokenMetadata> {
    with(|s| s.metadata.clone())
}

pub fn set_metadata(m: HashMap<u64, TokenMetadata>) {
    with_mut(|s| s.metadata = m);
}

pub fn pending_mint(registry_id: &str) -> Option<(u64, u32)> {
    with(|s| s.pending_mint.get(registry_id).copied())
}

pub fn set_pending_mint(registry_id: &str, project_id: u64, amount: u32) {
    with_mut(|s| {
        s.pending_mint
            .insert(registry_id.to_string(), (project_id, amount))
    });
}

pub fn clear_pending_mint(registry_id: &str) {
    with_mut(|s| s.pending_mint.remove(registry_id));
}

pub fn busy() -> bool {
    with(|s| s.busy)
}

pub fn set_busy(busy: bool) {
    with_mut(|s| s.busy = busy);
}

// ── Session manager ──

pub fn install_manager(eth: Ethereum) {
    MANAGER.with(|m| {
        *m.borrow_mut() = Some(SessionManager::new(eth.clone(), ProviderChain::new(eth)));
    });
}

/// Take the manager out for an async call. Pair with [`put_manager`].
pub fn take_manager() -> Option<Manager> {
    MANAGER.with(|m| m.borrow_mut().take())
}

pub fn put_manager(manager: Manager) {
    MANAGER.with(|m| *m.borrow_mut() = Some(manager));
}

/// Synchronous access for non-awaiting calls (`accounts_changed`).
pub fn with_manager<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut Manager) -> R,
{
    MANAGER.with(|m| m.borrow_mut().as_mut().map(f))
}

// ── View slot ──

pub fn begin_view() -> ViewTicket {
    SLOT.with(|s| s.borrow_mut().begin())
}

pub fn commit_view(ticket: ViewTicket, view: ChainView) -> bool {
    SLOT.with(|s| s.borrow_mut().commit(ticket, view))
}

pub fn invalidate_view() {
    SLOT.with(|s| s.borrow_mut().invalidate());
}

pub fn view() -> Option<ChainView> {
    SLOT.with(|s| s.borrow().view().cloned())
}

// ── Registry source ──

pub fn source() -> Rc<RegistrySource> {
    SOURCE.with(|s| s.clone())
}
