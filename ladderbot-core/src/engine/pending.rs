//! Ledger of submitted but unresolved intents.
//!
//! An intent is identified by `(symbol, side, reason, rung)`. While one is
//! pending, re-deriving it emits nothing new, which keeps repeated cycles over
//! unchanged inputs idempotent. Ids are assigned monotonically and never reused.

use std::collections::BTreeMap;

use super::rung_machine::IntentDraft;
use crate::domain::{IntentId, IntentKey, IntentReason, OrderIntent};

/// Result of offering a draft to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// New intent, now pending.
    Issued(OrderIntent),
    /// Same identity already pending; nothing new to submit.
    AlreadyPending(IntentId),
    /// Another pending intent for the symbol blocks this one.
    Suppressed { blocking: IntentId },
}

#[derive(Debug, Clone, Default)]
pub struct PendingLedger {
    next_id: u64,
    by_key: BTreeMap<IntentKey, OrderIntent>,
    keys: BTreeMap<IntentId, IntentKey>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, id: IntentId) -> Option<&OrderIntent> {
        self.keys.get(&id).and_then(|key| self.by_key.get(key))
    }

    /// Pending intents in id order.
    pub fn intents(&self) -> Vec<OrderIntent> {
        self.keys
            .keys()
            .filter_map(|id| self.get(*id).cloned())
            .collect()
    }

    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a OrderIntent> + 'a {
        self.by_key.values().filter(move |i| i.symbol == symbol)
    }

    /// Admit a draft for `symbol`.
    ///
    /// A pending protective or short-cover intent blocks everything else for
    /// the symbol. Any other pending intent blocks new non-protective drafts.
    pub fn admit(&mut self, symbol: &str, draft: IntentDraft) -> Admission {
        let key = IntentKey {
            symbol: symbol.to_string(),
            side: draft.side,
            reason: draft.reason,
            rung: draft.rung,
        };
        if let Some(existing) = self.by_key.get(&key) {
            return Admission::AlreadyPending(existing.id);
        }
        if let Some(blocking) = self.blocker(symbol, draft.reason) {
            return Admission::Suppressed { blocking };
        }

        self.next_id += 1;
        let id = IntentId(self.next_id);
        let intent = draft.into_intent(id, symbol);
        self.keys.insert(id, key.clone());
        self.by_key.insert(key, intent.clone());
        Admission::Issued(intent)
    }

    fn blocker(&self, symbol: &str, reason: IntentReason) -> Option<IntentId> {
        let mut pending = self.for_symbol(symbol);
        if reason.is_protective() {
            pending.find(|i| i.reason.is_protective()).map(|i| i.id)
        } else {
            pending.next().map(|i| i.id)
        }
    }

    /// Remove a resolved intent (filled or rejected).
    pub fn resolve(&mut self, id: IntentId) -> Option<OrderIntent> {
        let key = self.keys.remove(&id)?;
        self.by_key.remove(&key)
    }
}
