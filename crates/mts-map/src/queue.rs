//! `LaneQueue` — the ordered per-lane agent sequence.
//!
//! # Write model
//!
//! During *update*, thousands of agents move concurrently.  None of them may
//! touch the primary sequence (it is being read by their neighbors), so all
//! membership changes go through two buffers, each behind its own mutex that
//! is held for a single append.  During *prepare* the owning lane resolves
//! its buffers without looking at any other lane:
//!
//! 1. apply buffered removes,
//! 2. pop nodes whose order is now inverted (predecessor key > own key) into
//!    an *unsorted* set — keys were rewritten from agent positions just
//!    before,
//! 3. merge the buffered adds and the unsorted set back in ascending key
//!    order.
//!
//! Calling `prepare` with empty buffers and keys already in order is a no-op.
//!
//! # Node identity
//!
//! Nodes are owned by the queue; agents address their own node by
//! `(key, person)` via [`LaneQueue::find`] — keys are bitwise-stable copies
//! of the agent's committed arc position, so the binary search is exact.
//! Cross-lane references use [`NodeRef`] (lane + index), which is only valid
//! between one *prepare* and the next.

use std::sync::Mutex;

use mts_core::{LaneId, PersonId};

// ── Node types ────────────────────────────────────────────────────────────────

/// Reference to a node in some lane's queue.  Valid for one step: indices are
/// reassigned every *prepare*.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct NodeRef {
    pub lane: LaneId,
    pub index: u32,
}

/// Cross-lane neighbor links of a vehicle node, indexed
/// `[Side][LinkDir]` — rebuilt every tick after the primary sequences are
/// resorted.
pub type SideLinks = [[Option<NodeRef>; 2]; 2];

/// One entry of a lane queue, keyed by arc position.
#[derive(Clone, Debug)]
pub struct Node<E> {
    /// Arc position on the owning lane (m).
    pub s: f64,
    /// The person this node stands for.
    pub person: PersonId,
    /// Per-step payload (side links for vehicles, `()` for pedestrians).
    pub extra: E,
}

// ── LaneQueue ─────────────────────────────────────────────────────────────────

/// Ordered agent sequence with buffered membership changes.
#[derive(Default)]
pub struct LaneQueue<E> {
    nodes: Vec<Node<E>>,
    adds: Mutex<Vec<Node<E>>>,
    removes: Mutex<Vec<PersonId>>,
}

impl<E: Default> LaneQueue<E> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            adds: Mutex::new(Vec::new()),
            removes: Mutex::new(Vec::new()),
        }
    }

    // ── Buffered write API (update phase, `&self`) ────────────────────────

    /// Queue the insertion of a fresh node.  Takes effect at the next
    /// *prepare*.
    pub fn add(&self, s: f64, person: PersonId) {
        let mut adds = self.adds.lock().expect("lane add buffer poisoned");
        adds.push(Node { s, person, extra: E::default() });
    }

    /// Queue the removal of `person`'s node.  Takes effect at the next
    /// *prepare*.
    pub fn remove(&self, person: PersonId) {
        let mut removes = self.removes.lock().expect("lane remove buffer poisoned");
        removes.push(person);
    }

    // ── Prepare phase (`&mut self`) ───────────────────────────────────────

    /// Resolve buffered membership changes and restore ascending key order.
    pub fn prepare(&mut self) {
        let removes = std::mem::take(&mut *self.removes.lock().expect("lane remove buffer poisoned"));
        let mut pending = std::mem::take(&mut *self.adds.lock().expect("lane add buffer poisoned"));

        if !removes.is_empty() {
            self.nodes.retain(|n| !removes.contains(&n.person));
        }

        // Pop nodes whose predecessor now has a larger key.  The predecessor
        // stays; the popped node is re-inserted in the merge below.
        let mut kept: Vec<Node<E>> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.drain(..) {
            match kept.last() {
                Some(prev) if prev.s > node.s => pending.push(node),
                _ => kept.push(node),
            }
        }
        self.nodes = kept;

        if pending.is_empty() {
            return;
        }
        // Person id breaks key ties so the merge result does not depend on
        // the order parallel writers appended to the buffer.
        pending.sort_by(|a, b| a.s.total_cmp(&b.s).then(a.person.cmp(&b.person)));

        let old = std::mem::take(&mut self.nodes);
        self.nodes = Vec::with_capacity(old.len() + pending.len());
        let mut old = old.into_iter().peekable();
        let mut new = pending.into_iter().peekable();
        loop {
            match (old.peek(), new.peek()) {
                (Some(o), Some(n)) => {
                    // A fresh node with an equal key goes in front of the
                    // resident one.
                    if o.s < n.s {
                        self.nodes.push(old.next().expect("peeked"));
                    } else {
                        self.nodes.push(new.next().expect("peeked"));
                    }
                }
                (Some(_), None) => self.nodes.push(old.next().expect("peeked")),
                (None, Some(_)) => self.nodes.push(new.next().expect("peeked")),
                (None, None) => break,
            }
        }
    }

    /// Rewrite the key of `person`'s node from `old_s` to `new_s`.
    ///
    /// Called during the node-refresh pass at the start of *prepare*, before
    /// [`prepare`](Self::prepare) restores the ordering.  Earlier rewrites in
    /// the same pass may already have disturbed the order, so the lookup is a
    /// linear scan, not the binary search of [`position`](Self::position).
    /// A missing node is logged and ignored (it may legitimately live in a
    /// buffer).
    pub fn update_key(&mut self, person: PersonId, old_s: f64, new_s: f64) {
        match self
            .nodes
            .iter_mut()
            .find(|n| n.person == person && n.s == old_s)
        {
            Some(node) => node.s = new_s,
            None => tracing::debug!("no node for person {person} at key {old_s}"),
        }
    }

    /// Remove every trace of `person` immediately: the resident node, any
    /// pending add, and any pending remove.  Only callable from the
    /// sequential part of *prepare* (requires `&mut`).
    pub fn discard(&mut self, person: PersonId) {
        self.nodes.retain(|n| n.person != person);
        self.adds
            .lock()
            .expect("lane add buffer poisoned")
            .retain(|n| n.person != person);
        self.removes
            .lock()
            .expect("lane remove buffer poisoned")
            .retain(|p| *p != person);
    }

    /// Reset every node's payload to its default (links are per-step).
    pub fn clear_extras(&mut self) {
        for node in &mut self.nodes {
            node.extra = E::default();
        }
    }

    // ── Read API (update phase, `&self`) ──────────────────────────────────

    /// Index of `person`'s node, located by its exact key.
    pub fn position(&self, s: f64, person: PersonId) -> Option<usize> {
        let mut i = self.nodes.partition_point(|n| n.s < s);
        while i < self.nodes.len() && self.nodes[i].s == s {
            if self.nodes[i].person == person {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// `person`'s node, located by its exact key.
    pub fn find(&self, s: f64, person: PersonId) -> Option<&Node<E>> {
        self.position(s, person).map(|i| &self.nodes[i])
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Node<E>> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn first(&self) -> Option<&Node<E>> {
        self.nodes.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&Node<E>> {
        self.nodes.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node<E>> {
        self.nodes.iter()
    }

    /// Keys in list order (test helper).
    pub fn keys(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.s).collect()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node<E>] {
        &mut self.nodes
    }
}
