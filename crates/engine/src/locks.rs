//! Per-conversation mutual exclusion.
//!
//! Two near-simultaneous inbound messages on one conversation would race on
//! the history read and on contact linking. The engine serializes turns per
//! conversation; different conversations stay fully independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use konsul_core::conversation::ConversationId;

/// A registry of per-conversation async locks.
#[derive(Default)]
pub struct ConversationLocks {
    locks: StdMutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a conversation.
    pub fn for_conversation(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(id.clone()).or_default().clone()
    }

    /// Number of conversations with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_conversation_shares_one_lock() {
        let locks = ConversationLocks::new();
        let id = ConversationId::from("conv_1");

        let a = locks.for_conversation(&id);
        let b = locks.for_conversation(&id);

        let guard = a.lock().await;
        assert!(b.try_lock().is_err(), "second handle must see the held lock");
        drop(guard);
        assert!(b.try_lock().is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn different_conversations_are_independent() {
        let locks = ConversationLocks::new();
        let a = locks.for_conversation(&ConversationId::from("conv_a"));
        let b = locks.for_conversation(&ConversationId::from("conv_b"));

        let _guard = a.lock().await;
        assert!(b.try_lock().is_ok());
        assert_eq!(locks.len(), 2);
    }
}
