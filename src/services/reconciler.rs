use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::models::Conversation;

/// What the owner of local state should do with an incoming remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Replace local messages with the snapshot's.
    ApplyRemote,
    /// Leave local state untouched.
    Ignore,
}

/// Cloneable liveness flag tied to an owning session. Background work holds
/// a clone and checks it before applying any late-arriving result; teardown
/// revokes it so stale results are discarded instead of applied.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    revoked: Arc<AtomicBool>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        !self.revoked.load(Ordering::SeqCst)
    }
}

/// Arbiter between local optimistic state and the remote snapshot stream.
///
/// The two producers of truth (an in-flight exchange and the remote
/// listener) are resolved purely by the `updated_at` comparison: a snapshot
/// wins only when it targets the active conversation, nothing is in flight,
/// and it is strictly newer than the last locally-acknowledged write.
#[derive(Debug)]
pub struct ConversationStateReconciler {
    active_id: Option<String>,
    last_acked: DateTime<Utc>,
    exchange_in_flight: bool,
    incognito: bool,
}

fn sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Default for ConversationStateReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStateReconciler {
    pub fn new() -> Self {
        Self {
            active_id: None,
            last_acked: sentinel(),
            exchange_in_flight: false,
            incognito: false,
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn is_incognito(&self) -> bool {
        self.incognito
    }

    /// Switch the active conversation (or to none for a new chat). There is
    /// no continuity guarantee across a switch, so the acknowledgement
    /// marker resets to the sentinel.
    pub fn set_active(&mut self, id: Option<&str>) {
        self.active_id = id.map(str::to_string);
        self.last_acked = sentinel();
    }

    /// Toggle incognito. Incognito sessions never persist and are exempt
    /// from reconciliation; leaving the mode discards in-memory state, so
    /// the marker resets either way.
    pub fn set_incognito(&mut self, incognito: bool) {
        self.incognito = incognito;
        self.active_id = None;
        self.last_acked = sentinel();
    }

    pub fn begin_exchange(&mut self) {
        self.exchange_in_flight = true;
    }

    pub fn finish_exchange(&mut self) {
        self.exchange_in_flight = false;
    }

    /// Record a local write's `updated_at` before (or atomically with) the
    /// persistence call, so the listener's echo of that write is never
    /// mistaken for a newer external change.
    pub fn acknowledge_write(&mut self, updated_at: DateTime<Utc>) {
        if updated_at > self.last_acked {
            self.last_acked = updated_at;
        }
    }

    /// Decide whether a remote snapshot overwrites local state.
    pub fn observe_remote(&mut self, snapshot: &Conversation) -> ReconcileAction {
        if self.incognito {
            return ReconcileAction::Ignore;
        }
        if self.active_id.as_deref() != Some(snapshot.id.as_str()) {
            return ReconcileAction::Ignore;
        }
        if self.exchange_in_flight {
            debug!(conversation = %snapshot.id, "snapshot deferred: exchange in flight");
            return ReconcileAction::Ignore;
        }
        if snapshot.updated_at <= self.last_acked {
            return ReconcileAction::Ignore;
        }

        self.last_acked = snapshot.updated_at;
        ReconcileAction::ApplyRemote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(id: &str, offset_secs: i64) -> Conversation {
        let mut conversation = Conversation::new("t");
        conversation.id = id.to_string();
        conversation.updated_at = Utc::now() + Duration::seconds(offset_secs);
        conversation
    }

    #[test]
    fn newer_remote_snapshot_is_applied() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_active(Some("c1"));

        let remote = snapshot("c1", 5);
        assert_eq!(reconciler.observe_remote(&remote), ReconcileAction::ApplyRemote);
        // The same snapshot echoed again is no longer newer.
        assert_eq!(reconciler.observe_remote(&remote), ReconcileAction::Ignore);
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_active(Some("c1"));

        let local_write = Utc::now();
        reconciler.acknowledge_write(local_write);

        let mut remote = snapshot("c1", 0);
        remote.updated_at = local_write;
        assert_eq!(reconciler.observe_remote(&remote), ReconcileAction::Ignore);

        remote.updated_at = local_write - Duration::seconds(30);
        assert_eq!(reconciler.observe_remote(&remote), ReconcileAction::Ignore);
    }

    #[test]
    fn own_echo_does_not_clobber_optimistic_edits() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_active(Some("c1"));

        // Local send: acknowledged before the persistence write goes out.
        let write_time = Utc::now();
        reconciler.acknowledge_write(write_time);

        // The listener echoes our own write back.
        let mut echo = snapshot("c1", 0);
        echo.updated_at = write_time;
        assert_eq!(reconciler.observe_remote(&echo), ReconcileAction::Ignore);
    }

    #[test]
    fn mismatched_or_in_flight_snapshots_are_ignored() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_active(Some("c1"));

        assert_eq!(reconciler.observe_remote(&snapshot("c2", 5)), ReconcileAction::Ignore);

        reconciler.begin_exchange();
        assert_eq!(reconciler.observe_remote(&snapshot("c1", 5)), ReconcileAction::Ignore);

        reconciler.finish_exchange();
        assert_eq!(reconciler.observe_remote(&snapshot("c1", 5)), ReconcileAction::ApplyRemote);
    }

    #[test]
    fn switching_conversations_resets_the_marker() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_active(Some("c1"));
        reconciler.acknowledge_write(Utc::now() + Duration::hours(1));

        reconciler.set_active(Some("c2"));
        assert_eq!(reconciler.observe_remote(&snapshot("c2", 0)), ReconcileAction::ApplyRemote);
    }

    #[test]
    fn incognito_is_exempt_from_reconciliation() {
        let mut reconciler = ConversationStateReconciler::new();
        reconciler.set_incognito(true);
        reconciler.set_active(Some("c1"));

        assert_eq!(reconciler.observe_remote(&snapshot("c1", 5)), ReconcileAction::Ignore);

        reconciler.set_incognito(false);
        reconciler.set_active(Some("c1"));
        assert_eq!(reconciler.observe_remote(&snapshot("c1", 5)), ReconcileAction::ApplyRemote);
    }

    #[test]
    fn session_token_revocation() {
        let token = SessionToken::new();
        let held_by_background_task = token.clone();
        assert!(held_by_background_task.is_live());

        token.revoke();
        assert!(!held_by_background_task.is_live());
    }
}
