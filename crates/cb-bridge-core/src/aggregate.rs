//! Read-side aggregation of on-chain state.
//!
//! [`aggregate`] walks both dense counters sequentially and produces an
//! order-stable [`ChainView`]; any read failure aborts the whole pass so a
//! partial view can never be rendered. [`ViewSlot`] enforces supersession:
//! when aggregations overlap, only the most recently started one may commit.

use cb_api_types::{AccountAddress, Project, Token};
use cb_ledger::CarbonLedger;
use tracing::{debug, info};

use crate::errors::AggregationError;

/// A complete, self-consistent snapshot of the contract's projects and
/// tokens, evaluated relative to one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainView {
    pub wallet: AccountAddress,
    pub projects: Vec<Project>,
    pub tokens: Vec<Token>,
}

/// Per-project roll-up relative to the view's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project: Project,
    pub total_minted: u32,
    pub my_active: u32,
    pub my_retired: u32,
}

/// Enumerate every project and token by index. Reads are sequential, so the
/// resulting vectors are ordered by id.
pub async fn aggregate<L: CarbonLedger>(ledger: &L) -> Result<ChainView, AggregationError> {
    let wallet = ledger.account().clone();
    debug!(%wallet, "aggregating chain state");

    let project_count = ledger.project_counter().await?;
    let mut projects = Vec::with_capacity(project_count as usize);
    for project_id in 0..project_count {
        let data = ledger.project_data(project_id).await?;
        projects.push(Project {
            project_id,
            registry_project_id: data.registry_project_id,
            content_pointer: data.content_pointer,
            location: data.location,
            name: data.name,
        });
    }

    let token_count = ledger.token_counter().await?;
    let mut tokens = Vec::with_capacity(token_count as usize);
    for token_id in 0..token_count {
        let owner = ledger.owner_of(token_id).await?;
        let retired = ledger.is_retired(token_id).await?;
        let project_id = ledger.token_project(token_id).await?;
        tokens.push(Token {
            token_id,
            owner,
            project_id,
            retired,
        });
    }

    info!(
        projects = projects.len(),
        tokens = tokens.len(),
        "chain state aggregated"
    );
    Ok(ChainView {
        wallet,
        projects,
        tokens,
    })
}

impl ChainView {
    /// Tokens held by the view's wallet, in ascending token order.
    pub fn my_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.owner == self.wallet)
    }

    /// Tokens held by anyone else, in ascending token order.
    pub fn other_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.owner != self.wallet)
    }

    /// Ids of the wallet's active (non-retired) tokens under one project,
    /// ascending.
    pub fn my_active_token_ids(&self, project_id: u64) -> Vec<u64> {
        self.my_tokens()
            .filter(|t| t.project_id == project_id && !t.retired)
            .map(|t| t.token_id)
            .collect()
    }

    /// One summary per project, in project order.
    pub fn project_summaries(&self) -> Vec<ProjectSummary> {
        self.projects
            .iter()
            .map(|project| {
                let mut total_minted = 0;
                let mut my_active = 0;
                let mut my_retired = 0;
                for token in &self.tokens {
                    if token.project_id != project.project_id {
                        continue;
                    }
                    total_minted += 1;
                    if token.owner == self.wallet {
                        if token.retired {
                            my_retired += 1;
                        } else {
                            my_active += 1;
                        }
                    }
                }
                ProjectSummary {
                    project: project.clone(),
                    total_minted,
                    my_active,
                    my_retired,
                }
            })
            .collect()
    }
}

/// A ticket issued by [`ViewSlot::begin`]; pass it back to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket(u64);

/// Holds the current [`ChainView`] and arbitrates between overlapping
/// aggregations: only the ticket from the most recent [`ViewSlot::begin`]
/// may commit, and [`ViewSlot::invalidate`] (on disconnect or account
/// switch) orphans every outstanding ticket.
#[derive(Debug, Default)]
pub struct ViewSlot {
    latest: u64,
    view: Option<ChainView>,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> ViewTicket {
        self.latest += 1;
        ViewTicket(self.latest)
    }

    /// Install `view` if `ticket` is still the newest. Returns whether the
    /// view was accepted.
    pub fn commit(&mut self, ticket: ViewTicket, view: ChainView) -> bool {
        if ticket.0 != self.latest {
            debug!(ticket = ticket.0, latest = self.latest, "stale view discarded");
            return false;
        }
        self.view = Some(view);
        true
    }

    /// Drop the current view and orphan all outstanding tickets.
    pub fn invalidate(&mut self) {
        self.latest += 1;
        self.view = None;
    }

    pub fn view(&self) -> Option<&ChainView> {
        self.view.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_ledger::memory::MemoryChain;
    use cb_ledger::{LedgerBinder, ProjectData};

    fn wallet() -> AccountAddress {
        AccountAddress::new("0xaaa")
    }

    async fn seeded_chain() -> MemoryChain {
        let owner = AccountAddress::new("0xowner");
        let chain = MemoryChain::new(owner.clone());
        let ledger = chain.bind(&owner).unwrap();
        ledger
            .create_project(&ProjectData {
                registry_project_id: "VCS-1".to_string(),
                content_pointer: "bafy1".to_string(),
                location: "Kenya".to_string(),
                name: "Mangroves".to_string(),
            })
            .await
            .unwrap();
        ledger.mint_batch(&wallet(), 0, 3).await.unwrap();
        ledger
            .mint_batch(&AccountAddress::new("0xbbb"), 0, 2)
            .await
            .unwrap();
        chain
    }

    #[tokio::test]
    async fn views_partition_by_owner_in_token_order() {
        let chain = seeded_chain().await;
        let view = aggregate(&chain.bind(&wallet()).unwrap()).await.unwrap();

        let mine: Vec<u64> = view.my_tokens().map(|t| t.token_id).collect();
        let others: Vec<u64> = view.other_tokens().map(|t| t.token_id).collect();
        assert_eq!(mine, vec![0, 1, 2]);
        assert_eq!(others, vec![3, 4]);
    }

    #[tokio::test]
    async fn summaries_count_mine_and_everyone_elses() {
        let chain = seeded_chain().await;
        let ledger = chain.bind(&wallet()).unwrap();
        ledger.retire(1).await.unwrap();

        let view = aggregate(&ledger).await.unwrap();
        let summaries = view.project_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_minted, 5);
        assert_eq!(summaries[0].my_active, 2);
        assert_eq!(summaries[0].my_retired, 1);
        assert_eq!(view.my_active_token_ids(0), vec![0, 2]);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent_over_unchanged_state() {
        let chain = seeded_chain().await;
        let ledger = chain.bind(&wallet()).unwrap();
        let first = aggregate(&ledger).await.unwrap();
        let second = aggregate(&ledger).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn only_the_newest_ticket_commits() {
        let chain = seeded_chain().await;
        let view = aggregate(&chain.bind(&wallet()).unwrap()).await.unwrap();

        let mut slot = ViewSlot::new();
        let stale = slot.begin();
        let fresh = slot.begin();
        assert!(slot.commit(fresh, view.clone()));
        assert!(!slot.commit(stale, view));
        assert!(slot.view().is_some());
    }

    #[tokio::test]
    async fn invalidation_orphans_outstanding_tickets() {
        let chain = seeded_chain().await;
        let view = aggregate(&chain.bind(&wallet()).unwrap()).await.unwrap();

        let mut slot = ViewSlot::new();
        let ticket = slot.begin();
        slot.invalidate();
        assert!(!slot.commit(ticket, view));
        assert!(slot.view().is_none());
    }
}
