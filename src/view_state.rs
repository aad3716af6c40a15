use crate::model::{
    ClaimHistoryEntry,
    ClaimResult,
    User,
};
use tracing::debug;

/// Read-backed fields of the view, one per read endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Users,
    Leaderboard,
    History,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Users, Field::Leaderboard, Field::History];

    pub fn label(self) -> &'static str {
        match self {
            Field::Users => "users",
            Field::Leaderboard => "leaderboard",
            Field::History => "history",
        }
    }
}

/// What to do with a read response that was issued before the one already
/// applied to the same field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Apply responses in arrival order, whatever their request order.
    #[default]
    LastWriteWins,
    /// Drop responses older than the last applied one.
    DiscardStale,
}

#[derive(Clone, Copy, Debug, Default)]
struct FieldSync {
    issued: u64,
    applied: Option<u64>,
}

#[derive(Clone, Debug, Default)]
struct SyncCounters {
    users: FieldSync,
    leaderboard: FieldSync,
    history: FieldSync,
}

impl SyncCounters {
    fn get_mut(&mut self, field: Field) -> &mut FieldSync {
        match field {
            Field::Users => &mut self.users,
            Field::Leaderboard => &mut self.leaderboard,
            Field::History => &mut self.history,
        }
    }
}

/// In-memory data the view renders from. Reads are public; writes go through
/// the store.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    users: Vec<User>,
    leaderboard: Vec<User>,
    history: Vec<ClaimHistoryEntry>,
    selected_user_id: Option<String>,
    claim_result: Option<ClaimResult>,
    new_user_name: String,
    new_user_avatar: Option<String>,
    stale_policy: StalePolicy,
    sync: SyncCounters,
}

impl ViewState {
    pub fn new(stale_policy: StalePolicy) -> Self {
        Self {
            stale_policy,
            ..Self::default()
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn leaderboard(&self) -> &[User] {
        &self.leaderboard
    }

    pub fn history(&self) -> &[ClaimHistoryEntry] {
        &self.history
    }

    pub fn selected_user_id(&self) -> Option<&str> {
        self.selected_user_id.as_deref()
    }

    pub fn selected_user(&self) -> Option<&User> {
        let id = self.selected_user_id()?;
        self.users.iter().find(|user| user.id == id)
    }

    pub fn claim_result(&self) -> Option<&ClaimResult> {
        self.claim_result.as_ref()
    }

    pub fn new_user_name(&self) -> &str {
        &self.new_user_name
    }

    pub fn new_user_avatar(&self) -> Option<&str> {
        self.new_user_avatar.as_deref()
    }

    pub fn stale_policy(&self) -> StalePolicy {
        self.stale_policy
    }

    pub(crate) fn set_selected_user_id(&mut self, id: Option<String>) {
        self.selected_user_id = id.filter(|id| !id.is_empty());
    }

    pub(crate) fn set_claim_result(&mut self, result: ClaimResult) {
        self.claim_result = Some(result);
    }

    pub(crate) fn set_new_user_name(&mut self, name: String) {
        self.new_user_name = name;
    }

    pub(crate) fn set_new_user_avatar(&mut self, avatar: Option<String>) {
        self.new_user_avatar = avatar;
    }

    /// Hands out the sequence number for a new read of `field`.
    pub(crate) fn issue_read(&mut self, field: Field) -> u64 {
        let sync = self.sync.get_mut(field);
        sync.issued += 1;
        sync.issued
    }

    pub(crate) fn replace_users(&mut self, seq: u64, users: Vec<User>) -> bool {
        if !self.accept(Field::Users, seq) {
            return false;
        }
        self.users = users;
        true
    }

    pub(crate) fn replace_leaderboard(&mut self, seq: u64, leaderboard: Vec<User>) -> bool {
        if !self.accept(Field::Leaderboard, seq) {
            return false;
        }
        self.leaderboard = leaderboard;
        true
    }

    pub(crate) fn replace_history(
        &mut self,
        seq: u64,
        history: Vec<ClaimHistoryEntry>,
    ) -> bool {
        if !self.accept(Field::History, seq) {
            return false;
        }
        self.history = history;
        true
    }

    fn accept(&mut self, field: Field, seq: u64) -> bool {
        let policy = self.stale_policy;
        let sync = self.sync.get_mut(field);
        if policy == StalePolicy::DiscardStale
            && let Some(applied) = sync.applied
            && seq < applied
        {
            debug!(
                field = field.label(),
                seq, applied, "discarding stale read response"
            );
            return false;
        }
        sync.applied = Some(seq);
        true
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, points: u64) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            avatar: format!("{id}.png"),
            total_points: points,
        }
    }

    #[test]
    fn replace_leaderboard__last_write_wins_applies_older_response() {
        // given
        let mut state = ViewState::new(StalePolicy::LastWriteWins);
        let older = state.issue_read(Field::Leaderboard);
        let newer = state.issue_read(Field::Leaderboard);
        state.replace_leaderboard(newer, vec![user("a", 20)]);

        // when
        let applied = state.replace_leaderboard(older, vec![user("a", 10)]);

        // then
        assert!(applied);
        assert_eq!(state.leaderboard()[0].total_points, 10);
    }

    #[test]
    fn replace_leaderboard__discard_stale_drops_older_response() {
        // given
        let mut state = ViewState::new(StalePolicy::DiscardStale);
        let older = state.issue_read(Field::Leaderboard);
        let newer = state.issue_read(Field::Leaderboard);
        state.replace_leaderboard(newer, vec![user("a", 20)]);

        // when
        let applied = state.replace_leaderboard(older, vec![user("a", 10)]);

        // then
        assert!(!applied);
        assert_eq!(state.leaderboard()[0].total_points, 20);
    }

    #[test]
    fn issue_read__counts_each_field_separately() {
        let mut state = ViewState::default();
        assert_eq!(state.issue_read(Field::Users), 1);
        assert_eq!(state.issue_read(Field::Users), 2);
        assert_eq!(state.issue_read(Field::History), 1);
    }

    #[test]
    fn set_selected_user_id__empty_id_clears_selection() {
        let mut state = ViewState::default();
        state.set_selected_user_id(Some(String::new()));
        assert_eq!(state.selected_user_id(), None);
    }
}
