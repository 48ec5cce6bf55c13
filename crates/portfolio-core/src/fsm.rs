//! Inscription lifecycle state machine.
//!
//! One `InscriptionFsm` tracks one submission at a time. It is constructed
//! by the host and shared as `Arc<InscriptionFsm>` with the wallets that
//! drive it and the observers that render it.
//!
//! ```text
//! idle                 --START-->            preparing_message
//! preparing_message    --MESSAGE_PREPARED--> awaiting_signature
//! awaiting_signature   --SIGNED-->           sending_transaction
//! sending_transaction  --SENT-->             waiting_confirmation
//! waiting_confirmation --CONFIRMED-->        completed
//! any in-flight state  --ERROR-->            failed
//! signature onward     --REJECTED-->         rejected
//! completed | failed | rejected --START-->   preparing_message
//! ```
//!
//! Events without a transition are ignored. Submission is not reentrant:
//! callers must not start a second submission while `is_submitting()`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InscriptionState {
    #[default]
    Idle,
    PreparingMessage,
    AwaitingSignature,
    SendingTransaction,
    WaitingConfirmation,
    Completed,
    Failed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InscriptionEvent {
    Start,
    MessagePrepared,
    Signed,
    Sent,
    Confirmed,
    Error,
    Rejected,
}

impl InscriptionState {
    pub const ALL: [InscriptionState; 8] = [
        InscriptionState::Idle,
        InscriptionState::PreparingMessage,
        InscriptionState::AwaitingSignature,
        InscriptionState::SendingTransaction,
        InscriptionState::WaitingConfirmation,
        InscriptionState::Completed,
        InscriptionState::Failed,
        InscriptionState::Rejected,
    ];

    /// The state `event` leads to, or `None` if it is ignored here.
    pub fn next(self, event: InscriptionEvent) -> Option<InscriptionState> {
        use InscriptionEvent as E;
        use InscriptionState as S;

        match (self, event) {
            (S::Idle | S::Completed | S::Failed | S::Rejected, E::Start) => {
                Some(S::PreparingMessage)
            }
            (S::PreparingMessage, E::MessagePrepared) => Some(S::AwaitingSignature),
            (S::AwaitingSignature, E::Signed) => Some(S::SendingTransaction),
            (S::SendingTransaction, E::Sent) => Some(S::WaitingConfirmation),
            (S::WaitingConfirmation, E::Confirmed) => Some(S::Completed),
            (
                S::PreparingMessage
                | S::AwaitingSignature
                | S::SendingTransaction
                | S::WaitingConfirmation,
                E::Error,
            ) => Some(S::Failed),
            (
                S::AwaitingSignature | S::SendingTransaction | S::WaitingConfirmation,
                E::Rejected,
            ) => Some(S::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InscriptionState::Completed | InscriptionState::Failed | InscriptionState::Rejected
        )
    }

    /// A submission is in flight; the submit affordance should be disabled.
    pub fn is_submitting(&self) -> bool {
        !self.is_terminal() && *self != InscriptionState::Idle
    }

    /// User-facing status line for this state.
    pub fn notification(&self) -> Option<&'static str> {
        match self {
            InscriptionState::Idle => None,
            InscriptionState::PreparingMessage => Some("Preparing inscription message"),
            InscriptionState::AwaitingSignature => Some("Please sign the transaction"),
            InscriptionState::SendingTransaction => Some("Sending transaction"),
            InscriptionState::WaitingConfirmation => Some("Waiting for confirmation"),
            InscriptionState::Completed => Some("Inscription complete!"),
            InscriptionState::Failed => Some("Transaction failed"),
            InscriptionState::Rejected => Some("Transaction rejected"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InscriptionState::Idle => "idle",
            InscriptionState::PreparingMessage => "preparing_message",
            InscriptionState::AwaitingSignature => "awaiting_signature",
            InscriptionState::SendingTransaction => "sending_transaction",
            InscriptionState::WaitingConfirmation => "waiting_confirmation",
            InscriptionState::Completed => "completed",
            InscriptionState::Failed => "failed",
            InscriptionState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked with the new state after every transition.
pub type Listener = Arc<dyn Fn(InscriptionState) + Send + Sync>;

/// Handle returned by [`InscriptionFsm::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct InscriptionFsm {
    state: Mutex<InscriptionState>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InscriptionFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InscriptionState {
        *lock(&self.state)
    }

    /// Registers `listener`; it sees every transition from now on, in
    /// subscription order.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(InscriptionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.listeners).retain(|(existing, _)| *existing != id);
    }

    /// Applies `event`. Returns `false` (and notifies nobody) when the
    /// current state has no transition for it.
    pub fn fire(&self, event: InscriptionEvent) -> bool {
        let next = {
            let mut state = lock(&self.state);
            match state.next(event) {
                Some(next) => {
                    log::debug!("inscription {} --{:?}--> {}", *state, event, next);
                    *state = next;
                    next
                }
                None => {
                    log::debug!("inscription ignored {:?} in {}", event, *state);
                    return false;
                }
            }
        };

        // Listeners run unlocked so they may (un)subscribe from inside the
        // callback; one removed mid-round is skipped.
        let snapshot: Vec<(SubscriptionId, Listener)> = lock(&self.listeners).clone();
        for (id, listener) in snapshot {
            let registered = lock(&self.listeners).iter().any(|(l, _)| *l == id);
            if registered {
                listener(next);
            }
        }
        true
    }

    pub fn start(&self) -> bool {
        self.fire(InscriptionEvent::Start)
    }

    pub fn message_prepared(&self) -> bool {
        self.fire(InscriptionEvent::MessagePrepared)
    }

    pub fn signed(&self) -> bool {
        self.fire(InscriptionEvent::Signed)
    }

    pub fn sent(&self) -> bool {
        self.fire(InscriptionEvent::Sent)
    }

    pub fn confirmed(&self) -> bool {
        self.fire(InscriptionEvent::Confirmed)
    }

    pub fn error(&self) -> bool {
        self.fire(InscriptionEvent::Error)
    }

    pub fn rejected(&self) -> bool {
        self.fire(InscriptionEvent::Rejected)
    }
}

impl fmt::Debug for InscriptionFsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InscriptionFsm")
            .field("state", &self.state())
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [InscriptionEvent; 7] = [
        InscriptionEvent::Start,
        InscriptionEvent::MessagePrepared,
        InscriptionEvent::Signed,
        InscriptionEvent::Sent,
        InscriptionEvent::Confirmed,
        InscriptionEvent::Error,
        InscriptionEvent::Rejected,
    ];

    fn recorder(fsm: &InscriptionFsm) -> (SubscriptionId, Arc<Mutex<Vec<InscriptionState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = fsm.subscribe(move |state| sink.lock().unwrap().push(state));
        (id, seen)
    }

    /// Drives a fresh machine into `target` along legal transitions.
    fn machine_in(target: InscriptionState) -> InscriptionFsm {
        use InscriptionEvent as E;
        use InscriptionState as S;

        let path: &[E] = match target {
            S::Idle => &[],
            S::PreparingMessage => &[E::Start],
            S::AwaitingSignature => &[E::Start, E::MessagePrepared],
            S::SendingTransaction => &[E::Start, E::MessagePrepared, E::Signed],
            S::WaitingConfirmation => &[E::Start, E::MessagePrepared, E::Signed, E::Sent],
            S::Completed => &[E::Start, E::MessagePrepared, E::Signed, E::Sent, E::Confirmed],
            S::Failed => &[E::Start, E::Error],
            S::Rejected => &[E::Start, E::MessagePrepared, E::Rejected],
        };

        let fsm = InscriptionFsm::new();
        for event in path {
            assert!(fsm.fire(*event));
        }
        assert_eq!(fsm.state(), target);
        fsm
    }

    #[test]
    fn starts_idle() {
        assert_eq!(InscriptionFsm::new().state(), InscriptionState::Idle);
    }

    #[test]
    fn happy_path_notifies_five_times() {
        let fsm = InscriptionFsm::new();
        let (_, seen) = recorder(&fsm);

        fsm.start();
        fsm.message_prepared();
        fsm.signed();
        fsm.sent();
        fsm.confirmed();

        assert_eq!(fsm.state(), InscriptionState::Completed);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&InscriptionState::Completed));
    }

    #[test]
    fn rejection_then_restart() {
        let fsm = InscriptionFsm::new();
        fsm.start();
        fsm.message_prepared();
        fsm.rejected();
        assert_eq!(fsm.state(), InscriptionState::Rejected);

        fsm.start();
        assert_eq!(fsm.state(), InscriptionState::PreparingMessage);
    }

    #[test]
    fn undefined_events_are_silent_noops() {
        for state in InscriptionState::ALL {
            for event in EVENTS {
                if state.next(event).is_some() {
                    continue;
                }
                let fsm = machine_in(state);
                let (_, seen) = recorder(&fsm);

                assert!(!fsm.fire(event), "{state} accepted {event:?}");
                assert_eq!(fsm.state(), state);
                assert!(seen.lock().unwrap().is_empty());
            }
        }
    }

    #[test]
    fn start_rearms_every_terminal_state() {
        for state in InscriptionState::ALL.into_iter().filter(InscriptionState::is_terminal) {
            let fsm = machine_in(state);
            assert!(fsm.start());
            assert_eq!(fsm.state(), InscriptionState::PreparingMessage);
        }
    }

    #[test]
    fn terminal_states_absorb_everything_but_start() {
        for state in InscriptionState::ALL.into_iter().filter(InscriptionState::is_terminal) {
            for event in EVENTS {
                let expected = (event == InscriptionEvent::Start)
                    .then_some(InscriptionState::PreparingMessage);
                assert_eq!(state.next(event), expected);
            }
        }
    }

    #[test]
    fn rejection_not_defined_before_signature() {
        assert_eq!(
            InscriptionState::PreparingMessage.next(InscriptionEvent::Rejected),
            None
        );
        assert_eq!(InscriptionState::Idle.next(InscriptionEvent::Error), None);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let fsm = InscriptionFsm::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            fsm.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        fsm.start();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_twice_is_safe() {
        let fsm = InscriptionFsm::new();
        let (id, seen) = recorder(&fsm);

        fsm.start();
        fsm.unsubscribe(id);
        fsm.unsubscribe(id);
        fsm.message_prepared();

        assert_eq!(*seen.lock().unwrap(), vec![InscriptionState::PreparingMessage]);
    }

    #[test]
    fn listener_can_unsubscribe_itself_mid_notification() {
        let fsm = Arc::new(InscriptionFsm::new());
        let calls = Arc::new(AtomicU64::new(0));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let id = {
            let fsm_ref = Arc::downgrade(&fsm);
            let calls = Arc::clone(&calls);
            let own_id = Arc::clone(&own_id);
            fsm.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let (Some(fsm), Some(id)) = (fsm_ref.upgrade(), *own_id.lock().unwrap()) {
                    fsm.unsubscribe(id);
                }
            })
        };
        *own_id.lock().unwrap() = Some(id);
        let (_, later) = recorder(&fsm);

        fsm.start();
        fsm.message_prepared();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(later.lock().unwrap().len(), 2);
    }

    #[test]
    fn listener_removed_by_earlier_listener_is_skipped() {
        let fsm = Arc::new(InscriptionFsm::new());
        let victim: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        {
            let fsm_ref = Arc::downgrade(&fsm);
            let victim = Arc::clone(&victim);
            fsm.subscribe(move |_| {
                if let (Some(fsm), Some(id)) = (fsm_ref.upgrade(), *victim.lock().unwrap()) {
                    fsm.unsubscribe(id);
                }
            });
        }
        let (id, seen) = recorder(&fsm);
        *victim.lock().unwrap() = Some(id);

        fsm.start();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn subscriber_added_late_sees_only_future_states() {
        let fsm = InscriptionFsm::new();
        fsm.start();
        let (_, seen) = recorder(&fsm);
        fsm.message_prepared();

        assert_eq!(*seen.lock().unwrap(), vec![InscriptionState::AwaitingSignature]);
    }

    #[test]
    fn notifications_distinguish_rejection_from_failure() {
        assert_eq!(InscriptionState::Idle.notification(), None);
        assert_eq!(
            InscriptionState::Completed.notification(),
            Some("Inscription complete!")
        );
        assert_ne!(
            InscriptionState::Rejected.notification(),
            InscriptionState::Failed.notification()
        );
    }

    #[test]
    fn submitting_flag() {
        assert!(!InscriptionState::Idle.is_submitting());
        assert!(InscriptionState::AwaitingSignature.is_submitting());
        assert!(!InscriptionState::Rejected.is_submitting());
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&InscriptionState::WaitingConfirmation).unwrap(),
            "\"waiting_confirmation\""
        );
    }
}
