//! Bookkeeping for one discovery run.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use crate::error::FailureKind;
use crate::model::DeviceAddress;

/// What happened to an address offered to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Queued for probing.
    Queued,
    /// Already queued, attempted, or set aside.
    Known,
    /// Deeper than the depth limit; set aside as pending.
    BeyondDepth,
}

/// Frontier, visited and failed sets of a run.
///
/// Every address moves through `frontier -> visited` exactly once, and a
/// visited address ends either resolved or failed. Addresses that are
/// never attempted because of a limit or a stop end up pending.
#[derive(Debug, Clone)]
pub struct DiscoveryState {
    frontier: VecDeque<(DeviceAddress, usize)>,
    queued: IndexSet<DeviceAddress>,
    visited: IndexSet<DeviceAddress>,
    resolved: IndexSet<DeviceAddress>,
    failed: IndexMap<DeviceAddress, FailureKind>,
    pending: IndexSet<DeviceAddress>,
    depth_limited: bool,
}

impl DiscoveryState {
    /// Start a run at `seed` (depth 0).
    pub fn new(seed: DeviceAddress) -> Self {
        let mut state = Self {
            frontier: VecDeque::new(),
            queued: IndexSet::new(),
            visited: IndexSet::new(),
            resolved: IndexSet::new(),
            failed: IndexMap::new(),
            pending: IndexSet::new(),
            depth_limited: false,
        };
        state.queued.insert(seed.clone());
        state.frontier.push_back((seed, 0));
        state
    }

    /// Take the oldest frontier address and mark it visited.
    pub fn next(&mut self) -> Option<(DeviceAddress, usize)> {
        let (address, depth) = self.frontier.pop_front()?;
        self.queued.shift_remove(&address);
        self.visited.insert(address.clone());
        Some((address, depth))
    }

    /// Offer a newly learned address found at `depth`.
    pub fn offer(&mut self, address: DeviceAddress, depth: usize, max_depth: Option<usize>) -> Offer {
        if address.is_empty()
            || self.visited.contains(&address)
            || self.queued.contains(&address)
            || self.pending.contains(&address)
        {
            return Offer::Known;
        }
        if max_depth.is_some_and(|max| depth > max) {
            self.pending.insert(address);
            self.depth_limited = true;
            return Offer::BeyondDepth;
        }
        self.queued.insert(address.clone());
        self.frontier.push_back((address, depth));
        Offer::Queued
    }

    /// Record a visited address as resolved.
    pub fn resolve(&mut self, address: &DeviceAddress) {
        debug_assert!(self.visited.contains(address));
        self.resolved.insert(address.clone());
    }

    /// Record a visited address as failed.
    pub fn fail(&mut self, address: DeviceAddress, kind: FailureKind) {
        debug_assert!(self.visited.contains(&address));
        self.failed.insert(address, kind);
    }

    /// Move everything still queued to pending.
    pub fn abandon_frontier(&mut self) {
        for (address, _) in self.frontier.drain(..) {
            self.pending.insert(address);
        }
        self.queued.clear();
    }

    pub fn has_frontier(&self) -> bool {
        !self.frontier.is_empty()
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn visited(&self) -> &IndexSet<DeviceAddress> {
        &self.visited
    }

    pub fn resolved(&self) -> &IndexSet<DeviceAddress> {
        &self.resolved
    }

    pub fn failed(&self) -> &IndexMap<DeviceAddress, FailureKind> {
        &self.failed
    }

    pub fn pending(&self) -> &IndexSet<DeviceAddress> {
        &self.pending
    }

    /// Whether any neighbor was set aside for being too deep.
    pub fn depth_limited(&self) -> bool {
        self.depth_limited
    }

    /// Split into the failed map and the pending list.
    pub fn into_outcome(self) -> (IndexMap<DeviceAddress, FailureKind>, Vec<DeviceAddress>) {
        (self.failed, self.pending.into_iter().collect())
    }

    /// Check the bookkeeping invariants. Used by tests.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (address, _) in &self.frontier {
            if self.visited.contains(address) {
                return Err(format!("{address} is both queued and visited"));
            }
        }
        for address in &self.visited {
            let resolved = self.resolved.contains(address);
            let failed = self.failed.contains_key(address);
            if resolved && failed {
                return Err(format!("{address} is both resolved and failed"));
            }
        }
        for address in self.resolved.iter().chain(self.failed.keys()) {
            if !self.visited.contains(address) {
                return Err(format!("{address} finished without being visited"));
            }
            if self.pending.contains(address) {
                return Err(format!("{address} is both finished and pending"));
            }
        }
        Ok(())
    }
}
