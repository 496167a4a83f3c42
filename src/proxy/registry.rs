//! Proxy registry state
//!
//! Plain data: the full candidate list plus the blacklist and whitelist sets.
//! Callers provide the locking (see [`super::ProxyManager`]).

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::models::Proxy;

#[derive(Debug, Default)]
pub struct ProxyRegistry {
    proxy_list: Vec<Proxy>,
    blacklist: HashSet<Proxy>,
    whitelist: HashSet<Proxy>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidate list wholesale; blacklist and whitelist are kept
    pub fn replace(&mut self, proxies: Vec<Proxy>) {
        self.proxy_list = proxies;
    }

    pub fn len(&self) -> usize {
        self.proxy_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxy_list.is_empty()
    }

    pub fn proxies(&self) -> &[Proxy] {
        &self.proxy_list
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }

    pub fn is_blacklisted(&self, proxy: &Proxy) -> bool {
        self.blacklist.contains(proxy)
    }

    pub fn is_whitelisted(&self, proxy: &Proxy) -> bool {
        self.whitelist.contains(proxy)
    }

    /// Mark a proxy unhealthy. Returns `true` if it was not blacklisted before.
    pub fn blacklist(&mut self, proxy: &Proxy) -> bool {
        self.whitelist.remove(proxy);
        self.blacklist.insert(proxy.clone())
    }

    /// Mark a proxy healthy. Returns `true` if it was not whitelisted before.
    pub fn whitelist(&mut self, proxy: &Proxy) -> bool {
        self.blacklist.remove(proxy);
        self.whitelist.insert(proxy.clone())
    }

    /// Forget all health feedback
    pub fn reset(&mut self) {
        self.blacklist.clear();
        self.whitelist.clear();
    }

    /// Proxies eligible for selection: the whitelist when it has entries,
    /// otherwise every listed proxy that is not blacklisted.
    pub fn available(&self) -> Vec<&Proxy> {
        if !self.whitelist.is_empty() {
            return self.whitelist.iter().collect();
        }

        self.proxy_list
            .iter()
            .filter(|p| !self.blacklist.contains(*p))
            .collect()
    }

    /// Pick a proxy uniformly at random among the available ones.
    ///
    /// Once the blacklist covers the whole list, both sets are cleared first so
    /// every proxy gets another chance. Returns `None` only when the list is empty.
    pub fn select<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Proxy> {
        if self.proxy_list.is_empty() {
            return None;
        }

        if self.blacklist.len() >= self.proxy_list.len() {
            warn!(
                blacklisted = self.blacklist.len(),
                total = self.proxy_list.len(),
                "All proxies are blacklisted, clearing blacklist and whitelist"
            );
            self.reset();
        }

        self.available().choose(rng).map(|p| (*p).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyProtocol;

    fn proxy(last_octet: u8) -> Proxy {
        Proxy::new(format!("10.0.0.{}", last_octet), 8080, [ProxyProtocol::Http]).unwrap()
    }

    fn registry_of(n: u8) -> ProxyRegistry {
        let mut registry = ProxyRegistry::new();
        registry.replace((1..=n).map(proxy).collect());
        registry
    }

    fn assert_disjoint(registry: &ProxyRegistry) {
        for p in registry.proxies() {
            assert!(
                !(registry.is_blacklisted(p) && registry.is_whitelisted(p)),
                "{} is in both sets",
                p
            );
        }
    }

    #[test]
    fn test_select_empty_registry() {
        let mut registry = ProxyRegistry::new();
        assert!(registry.select(&mut rand::thread_rng()).is_none());
    }

    #[test]
    fn test_single_available_choice_is_deterministic() {
        let mut registry = registry_of(3);
        registry.blacklist(&proxy(1));
        registry.blacklist(&proxy(2));

        for _ in 0..20 {
            assert_eq!(registry.select(&mut rand::thread_rng()), Some(proxy(3)));
        }
    }

    #[test]
    fn test_lists_are_disjoint_after_every_mutation() {
        let mut registry = registry_of(3);

        registry.whitelist(&proxy(1));
        assert_disjoint(&registry);
        registry.blacklist(&proxy(1));
        assert_disjoint(&registry);
        assert!(registry.is_blacklisted(&proxy(1)));
        assert!(!registry.is_whitelisted(&proxy(1)));

        registry.whitelist(&proxy(1));
        assert_disjoint(&registry);
        assert!(registry.is_whitelisted(&proxy(1)));
        assert!(!registry.is_blacklisted(&proxy(1)));
    }

    #[test]
    fn test_feedback_is_idempotent() {
        let mut registry = registry_of(2);
        assert!(registry.blacklist(&proxy(1)));
        assert!(!registry.blacklist(&proxy(1)));
        assert_eq!(registry.blacklist_len(), 1);

        assert!(registry.whitelist(&proxy(2)));
        assert!(!registry.whitelist(&proxy(2)));
        assert_eq!(registry.whitelist_len(), 1);
    }

    #[test]
    fn test_whitelist_first_selection() {
        let mut registry = registry_of(5);
        registry.whitelist(&proxy(4));

        for _ in 0..20 {
            assert_eq!(registry.select(&mut rand::thread_rng()), Some(proxy(4)));
        }
    }

    #[test]
    fn test_full_blacklist_resets_both_sets() {
        let mut registry = registry_of(3);
        registry.whitelist(&proxy(1));
        registry.blacklist(&proxy(1));
        registry.blacklist(&proxy(2));
        registry.blacklist(&proxy(3));
        assert_eq!(registry.blacklist_len(), 3);

        let selected = registry.select(&mut rand::thread_rng());
        assert!(selected.is_some());
        assert_eq!(registry.blacklist_len(), 0);
        assert_eq!(registry.whitelist_len(), 0);
    }

    #[test]
    fn test_stale_blacklist_entries_count_toward_reset() {
        let mut registry = registry_of(2);
        registry.blacklist(&proxy(1));
        registry.blacklist(&proxy(9));

        // Two blacklisted entries against a list of two triggers the reset
        // even though one of them is no longer listed.
        registry.select(&mut rand::thread_rng());
        assert_eq!(registry.blacklist_len(), 0);
    }

    #[test]
    fn test_replace_keeps_feedback() {
        let mut registry = registry_of(3);
        registry.blacklist(&proxy(1));
        registry.whitelist(&proxy(2));

        registry.replace(vec![proxy(1), proxy(2), proxy(7)]);
        assert_eq!(registry.len(), 3);
        assert!(registry.is_blacklisted(&proxy(1)));
        assert!(registry.is_whitelisted(&proxy(2)));
    }

    #[test]
    fn test_available_excludes_blacklisted() {
        let mut registry = registry_of(4);
        registry.blacklist(&proxy(2));

        let available = registry.available();
        assert_eq!(available.len(), 3);
        assert!(!available.contains(&&proxy(2)));
    }
}
