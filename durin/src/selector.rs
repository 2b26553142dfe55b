//! ENS name search and selection.
//!
//! The selector keeps the names of the connected account on the chosen L1
//! network, a free-text filter and the current selection. Each refresh is
//! tagged with a generation number; a fetch that completes after a newer
//! refresh started is discarded, so a slow response for an old address or
//! network never overwrites the current list.

use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;

use crate::lookup::DomainLookup;
use crate::types::{Domain, L1Network};

#[derive(Debug, Default)]
struct SelectorState {
    generation: u64,
    key: Option<(Address, L1Network)>,
    loading: bool,
    domains: Vec<Domain>,
    input: String,
    selected: Option<Domain>,
}

impl SelectorState {
    fn filtered(&self) -> Vec<Domain> {
        let needle = self.input.to_lowercase();
        self.domains
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

/// Domain list, filter and selection for one page.
#[derive(Debug)]
pub struct DomainSelector<L> {
    lookup: L,
    state: Mutex<SelectorState>,
}

impl<L: DomainLookup> DomainSelector<L> {
    /// Create an empty selector.
    #[must_use]
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-fetch the names for `address` on `network`.
    ///
    /// Clears the input and selection. A `None` address (wallet
    /// disconnected) empties the list without fetching. Lookup errors leave
    /// an empty list. Returns `false` if a newer refresh superseded this one
    /// and its result was discarded.
    pub async fn refresh(&self, address: Option<Address>, network: L1Network) -> bool {
        let generation = {
            let mut st = self.lock();
            st.generation += 1;
            st.key = address.map(|a| (a, network));
            st.input.clear();
            st.selected = None;
            st.domains.clear();
            st.loading = address.is_some();
            st.generation
        };
        let Some(address) = address else {
            return true;
        };

        tracing::debug!(%address, %network, generation, "fetching domains");
        let fetched = self.lookup.domains_for(address, network).await;

        let mut st = self.lock();
        if st.generation != generation {
            tracing::debug!(%address, %network, generation, current = st.generation, "discarding stale domain list");
            return false;
        }
        st.loading = false;
        st.domains = fetched.unwrap_or_else(|e| {
            tracing::warn!(%address, %network, error = %e, "domain lookup failed");
            Vec::new()
        });
        tracing::info!(%address, %network, count = st.domains.len(), "domains loaded");
        true
    }

    /// Update the search text.
    ///
    /// Typing clears the selection, except that a filter matching exactly one
    /// name that equals the input verbatim selects that name.
    pub fn set_input(&self, text: impl Into<String>) {
        let mut st = self.lock();
        st.input = text.into();
        let filtered = st.filtered();
        st.selected = match filtered.as_slice() {
            [only] if only.name == st.input => Some(only.clone()),
            _ => None,
        };
    }

    /// Explicitly pick `name` from the list.
    ///
    /// Returns the selected domain, or `None` if the name is not listed.
    pub fn select(&self, name: &str) -> Option<Domain> {
        let mut st = self.lock();
        let domain = st.domains.iter().find(|d| d.name == name).cloned()?;
        st.input = domain.name.clone();
        st.selected = Some(domain.clone());
        Some(domain)
    }

    /// Names matching the current input, case-insensitively.
    #[must_use]
    pub fn filtered(&self) -> Vec<Domain> {
        self.lock().filtered()
    }

    /// The selected domain.
    #[must_use]
    pub fn selected(&self) -> Option<Domain> {
        self.lock().selected.clone()
    }

    /// All fetched names.
    #[must_use]
    pub fn domains(&self) -> Vec<Domain> {
        self.lock().domains.clone()
    }

    /// The `(address, network)` of the latest refresh.
    #[must_use]
    pub fn key(&self) -> Option<(Address, L1Network)> {
        self.lock().key
    }

    /// Whether a fetch is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Text to show when the dropdown has nothing to list.
    #[must_use]
    pub fn empty_hint(&self) -> &'static str {
        let st = self.lock();
        if st.loading {
            "Loading your ENS names..."
        } else if !st.input.is_empty() {
            "No matching ENS names found"
        } else if st.domains.is_empty() {
            "No ENS names found for this address"
        } else {
            "Type to search your ENS names"
        }
    }

    /// Replace the resolver of `name` after a successful on-chain update.
    ///
    /// Returns `false` if the name is not listed.
    pub fn replace_resolver(&self, name: &str, resolver: Address) -> bool {
        let mut st = self.lock();
        let Some(domain) = st.domains.iter_mut().find(|d| d.name == name) else {
            return false;
        };
        domain.resolver = resolver;
        if let Some(selected) = st.selected.as_mut().filter(|d| d.name == name) {
            selected.resolver = resolver;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use alloy::primitives::address;

    use super::*;
    use crate::error::LookupError;

    /// Lookup answering from a fixed table after a per-address delay.
    struct FixedLookup {
        names: HashMap<Address, (Vec<&'static str>, Duration)>,
    }

    impl FixedLookup {
        fn new(entries: &[(Address, &[&'static str], u64)]) -> Self {
            let names = entries
                .iter()
                .map(|(a, n, ms)| (*a, (n.to_vec(), Duration::from_millis(*ms))))
                .collect();
            Self { names }
        }
    }

    impl DomainLookup for FixedLookup {
        async fn domains_for(
            &self,
            address: Address,
            _network: L1Network,
        ) -> Result<Vec<Domain>, LookupError> {
            let Some((names, delay)) = self.names.get(&address) else {
                return Err(LookupError::InvalidAddress(address.to_string()));
            };
            tokio::time::sleep(*delay).await;
            Ok(names
                .iter()
                .map(|n| Domain::new(*n, address, Address::ZERO))
                .collect())
        }
    }

    const ALICE: Address = address!("a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1");
    const BOB: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");

    async fn loaded(names: &[&'static str]) -> DomainSelector<FixedLookup> {
        let selector = DomainSelector::new(FixedLookup::new(&[(ALICE, names, 0)]));
        assert!(selector.refresh(Some(ALICE), L1Network::Sepolia).await, "refresh applied");
        selector
    }

    #[tokio::test]
    async fn filter_is_case_insensitive_substring() {
        let selector = loaded(&["alice.eth", "Bob.eth"]).await;
        selector.set_input("OB");
        let names: Vec<_> = selector.filtered().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["Bob.eth"]);
        assert_eq!(selector.selected(), None);
    }

    #[tokio::test]
    async fn exact_single_match_auto_selects() {
        let selector = loaded(&["alice.eth"]).await;
        selector.set_input("alice.eth");
        assert_eq!(selector.selected().map(|d| d.name).as_deref(), Some("alice.eth"));

        selector.set_input("alice.et");
        assert_eq!(selector.selected(), None);
    }

    #[tokio::test]
    async fn explicit_select_sets_input() {
        let selector = loaded(&["alice.eth", "alice.base.eth"]).await;
        selector.set_input("alice");
        assert_eq!(selector.filtered().len(), 2);
        assert!(selector.select("alice.base.eth").is_some());
        assert_eq!(selector.filtered().len(), 1);
        assert!(selector.select("carol.eth").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fetch_is_discarded() {
        let selector = DomainSelector::new(FixedLookup::new(&[
            (ALICE, &["alice.eth"], 500),
            (BOB, &["bob.eth"], 10),
        ]));

        let (slow, fast) = tokio::join!(
            selector.refresh(Some(ALICE), L1Network::Mainnet),
            async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                selector.refresh(Some(BOB), L1Network::Mainnet).await
            }
        );
        assert!(!slow, "superseded fetch must be dropped");
        assert!(fast);
        let names: Vec<_> = selector.domains().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["bob.eth"]);
        assert_eq!(selector.key(), Some((BOB, L1Network::Mainnet)));
    }

    #[tokio::test]
    async fn lookup_errors_degrade_to_empty() {
        let selector = DomainSelector::new(FixedLookup::new(&[]));
        assert!(selector.refresh(Some(BOB), L1Network::Sepolia).await, "refresh applied");
        assert!(selector.domains().is_empty());
        assert!(!selector.is_loading());
        assert_eq!(selector.empty_hint(), "No ENS names found for this address");
    }

    #[tokio::test]
    async fn disconnect_clears_without_fetching() {
        let selector = loaded(&["alice.eth"]).await;
        selector.select("alice.eth");
        assert!(selector.refresh(None, L1Network::Sepolia).await, "refresh applied");
        assert!(selector.domains().is_empty());
        assert_eq!(selector.selected(), None);
        assert_eq!(selector.key(), None);
    }

    #[tokio::test]
    async fn resolver_is_replaced_in_place() {
        let selector = loaded(&["alice.eth"]).await;
        selector.select("alice.eth");
        let resolver = Address::repeat_byte(0x77);
        assert!(selector.replace_resolver("alice.eth", resolver));
        assert_eq!(selector.selected().map(|d| d.resolver), Some(resolver));
        assert!(!selector.replace_resolver("bob.eth", resolver));
    }
}
