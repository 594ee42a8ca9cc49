//! Admission control before spend and deduction after it.

use std::sync::Arc;

use rcommon::UserId;

use crate::{ChatError, QuotaKind, QuotaStore};

/// When a use is taken from the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaPolicy {
    /// Check before the upstream call, decrement after a successful response. Two
    /// concurrent requests can both pass the check while one use remains; the later
    /// decrement then fails and that request is denied.
    #[default]
    CheckThenDecrement,
    /// Decrement before the upstream call and refund when the turn fails. Never admits
    /// more requests than there are uses.
    ReserveThenRefund,
}

/// Proof of admission, settled exactly once with [`QuotaGate::settle`].
#[derive(Debug)]
#[must_use]
pub struct QuotaTicket {
    user_id: UserId,
    kind: QuotaKind,
    reserved: bool,
}

impl QuotaTicket {
    pub fn kind(&self) -> QuotaKind {
        self.kind
    }
}

#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn QuotaStore>,
    policy: QuotaPolicy,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self {
            store,
            policy: QuotaPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    pub fn store(&self) -> Arc<dyn QuotaStore> {
        Arc::clone(&self.store)
    }

    pub async fn has_remaining(&self, user_id: &UserId, kind: QuotaKind) -> Result<bool, ChatError> {
        Ok(self.store.remaining(user_id, kind).await? > 0)
    }

    /// Conditional decrement; zero remaining is `InsufficientQuota`.
    pub async fn decrement(&self, user_id: &UserId, kind: QuotaKind) -> Result<(), ChatError> {
        if self.store.decrement(user_id, kind).await? {
            Ok(())
        } else {
            Err(insufficient(kind))
        }
    }

    pub async fn admit(&self, user_id: &UserId, kind: QuotaKind) -> Result<QuotaTicket, ChatError> {
        let reserved = match self.policy {
            QuotaPolicy::CheckThenDecrement => {
                if !self.has_remaining(user_id, kind).await? {
                    return Err(insufficient(kind));
                }
                false
            }
            QuotaPolicy::ReserveThenRefund => {
                self.decrement(user_id, kind).await?;
                true
            }
        };

        Ok(QuotaTicket {
            user_id: user_id.clone(),
            kind,
            reserved,
        })
    }

    /// Charges a successful turn, or returns a reserved use after a failed one.
    pub async fn settle(&self, ticket: QuotaTicket, succeeded: bool) -> Result<(), ChatError> {
        match (ticket.reserved, succeeded) {
            (false, true) => self.decrement(&ticket.user_id, ticket.kind).await,
            (true, false) => self.store.refund(&ticket.user_id, ticket.kind).await,
            _ => Ok(()),
        }
    }
}

fn insufficient(kind: QuotaKind) -> ChatError {
    ChatError::insufficient_quota(format!("no {} quota remaining", kind.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatErrorKind, InMemoryQuotaStore};

    async fn gate(policy: QuotaPolicy, chat: u32) -> (QuotaGate, UserId) {
        let store = Arc::new(InMemoryQuotaStore::new());
        let user = UserId::from("u1");
        store.provision(&user, chat, 0).await.expect("provision");
        (QuotaGate::new(store).with_policy(policy), user)
    }

    #[tokio::test]
    async fn check_then_decrement_charges_only_on_success() {
        let (gate, user) = gate(QuotaPolicy::CheckThenDecrement, 2).await;

        let ticket = gate.admit(&user, QuotaKind::Chat).await.expect("admitted");
        gate.settle(ticket, false).await.expect("settled");
        assert_eq!(gate.store().remaining(&user, QuotaKind::Chat).await.expect("read"), 2);

        let ticket = gate.admit(&user, QuotaKind::Chat).await.expect("admitted");
        gate.settle(ticket, true).await.expect("settled");
        assert_eq!(gate.store().remaining(&user, QuotaKind::Chat).await.expect("read"), 1);
    }

    #[tokio::test]
    async fn check_then_decrement_can_admit_past_the_limit_but_denies_at_settlement() {
        let (gate, user) = gate(QuotaPolicy::CheckThenDecrement, 1).await;

        let first = gate.admit(&user, QuotaKind::Chat).await.expect("admitted");
        let second = gate.admit(&user, QuotaKind::Chat).await.expect("also admitted");

        gate.settle(first, true).await.expect("first charged");
        let error = gate.settle(second, true).await.expect_err("second denied");
        assert_eq!(error.kind, ChatErrorKind::InsufficientQuota);
    }

    #[tokio::test]
    async fn reserve_then_refund_blocks_concurrent_overdraft() {
        let (gate, user) = gate(QuotaPolicy::ReserveThenRefund, 1).await;

        let first = gate.admit(&user, QuotaKind::Chat).await.expect("admitted");
        let error = gate
            .admit(&user, QuotaKind::Chat)
            .await
            .expect_err("no uses left");
        assert_eq!(error.kind, ChatErrorKind::InsufficientQuota);

        gate.settle(first, false).await.expect("refunded");
        assert!(gate.has_remaining(&user, QuotaKind::Chat).await.expect("read"));
    }

    #[tokio::test]
    async fn empty_counter_is_rejected_at_admission() {
        let (gate, user) = gate(QuotaPolicy::CheckThenDecrement, 0).await;

        let error = gate
            .admit(&user, QuotaKind::Chat)
            .await
            .expect_err("rejected");
        assert_eq!(error.kind, ChatErrorKind::InsufficientQuota);
        assert_eq!(error.message, "no chat quota remaining");
    }
}
