use crate::{
    api::{
        LeaderboardApi,
        NewUserDto,
    },
    avatar::placeholder_avatar,
    sync::{
        self,
        Mutation,
        SyncEvent,
    },
    view_state::{
        Field,
        StalePolicy,
        ViewState,
    },
};
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};


pub type SyncEvents = mpsc::UnboundedReceiver<SyncEvent>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a user first!")]
    NoUserSelected,
}

/// Messages the view must show the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Rejected(ValidationError),
    UserAdded { name: String },
    CreateUserFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Rejected(reason) => write!(f, "{reason}"),
            Notice::UserAdded { name } => write!(f, "✅ User \"{name}\" added!"),
            Notice::CreateUserFailed => write!(f, "Something went wrong!"),
        }
    }
}

/// Owns the view state and is the only writer to it. Network operations are
/// spawned and report back through the [`SyncEvents`] receiver handed out by
/// [`Store::new`]; nothing is queued or cancelled, so responses land in
/// arrival order.
pub struct Store<A> {
    api: Arc<A>,
    state: ViewState,
    events: mpsc::UnboundedSender<SyncEvent>,
    in_flight: usize,
}

impl<A: LeaderboardApi> Store<A> {
    pub fn new(api: A, stale_policy: StalePolicy) -> (Self, SyncEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let store = Self {
            api: Arc::new(api),
            state: ViewState::new(stale_policy),
            events,
            in_flight: 0,
        };
        (store, receiver)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Operations spawned whose events have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Initial population of every read-backed field.
    pub fn load(&mut self) {
        for field in Field::ALL {
            self.refresh(field);
        }
    }

    pub fn fetch_users(&mut self) {
        self.refresh(Field::Users);
    }

    pub fn fetch_leaderboard(&mut self) {
        self.refresh(Field::Leaderboard);
    }

    pub fn fetch_history(&mut self) {
        self.refresh(Field::History);
    }

    pub fn refresh(&mut self, field: Field) {
        let seq = self.state.issue_read(field);
        let api = Arc::clone(&self.api);
        self.spawn(async move { sync::fetch(api.as_ref(), field, seq).await });
    }

    /// Claims points for the selected user. Rejected without touching the
    /// network when nothing is selected.
    pub fn claim(&mut self) -> Result<(), ValidationError> {
        let user_id = self
            .state
            .selected_user_id()
            .ok_or(ValidationError::NoUserSelected)?
            .to_string();
        info!(%user_id, "claiming points");
        let api = Arc::clone(&self.api);
        self.spawn(async move { sync::claim(api.as_ref(), user_id).await });
        Ok(())
    }

    /// Submits the add-user form. Returns `false`, without a request, when
    /// the name is blank.
    pub fn create_user(&mut self) -> bool {
        let name = self.state.new_user_name().to_string();
        if name.trim().is_empty() {
            return false;
        }
        let avatar = self
            .state
            .new_user_avatar()
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_avatar(&name));
        let user = NewUserDto { name, avatar };
        info!(name = %user.name, avatar = %user.avatar, "creating user");
        let api = Arc::clone(&self.api);
        self.spawn(async move { sync::create_user(api.as_ref(), user).await });
        true
    }

    pub fn select_user(&mut self, user_id: Option<String>) {
        self.state.set_selected_user_id(user_id);
    }

    pub fn set_new_user_name(&mut self, name: impl Into<String>) {
        self.state.set_new_user_name(name.into());
    }

    pub fn choose_avatar(&mut self, avatar: Option<String>) {
        self.state.set_new_user_avatar(avatar);
    }

    /// Applies a finished operation. Failed reads leave their field as it was;
    /// successful mutations trigger the reads listed in [`Mutation::refreshes`].
    pub fn apply(&mut self, event: SyncEvent) -> Option<Notice> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            SyncEvent::Users { seq, result } => {
                match result {
                    Ok(users) => {
                        self.state.replace_users(seq, users);
                    }
                    Err(err) => error!(?err, "failed to load users"),
                }
                None
            }
            SyncEvent::Leaderboard { seq, result } => {
                match result {
                    Ok(leaderboard) => {
                        self.state.replace_leaderboard(seq, leaderboard);
                    }
                    Err(err) => error!(?err, "failed to load leaderboard"),
                }
                None
            }
            SyncEvent::History { seq, result } => {
                match result {
                    Ok(history) => {
                        self.state.replace_history(seq, history);
                    }
                    Err(err) => error!(?err, "failed to load history"),
                }
                None
            }
            SyncEvent::Claimed(Ok(result)) => {
                info!(
                    user_id = %result.user.id,
                    points = result.points,
                    "claim succeeded"
                );
                self.state.set_claim_result(result);
                self.after_mutation(Mutation::Claim);
                None
            }
            SyncEvent::Claimed(Err(err)) => {
                error!(?err, "claim failed");
                None
            }
            SyncEvent::UserCreated(Ok(user)) => {
                info!(user_id = %user.id, name = %user.name, "user created");
                self.state.set_new_user_name(String::new());
                self.after_mutation(Mutation::CreateUser);
                Some(Notice::UserAdded { name: user.name })
            }
            SyncEvent::UserCreated(Err(err)) => {
                error!(?err, "failed to add user");
                Some(Notice::CreateUserFailed)
            }
        }
    }

    /// Applies events until every spawned operation, including the refreshes
    /// they trigger, has reported back.
    pub async fn settle(&mut self, events: &mut SyncEvents) -> Vec<Notice> {
        let mut notices = Vec::new();
        while self.in_flight > 0 {
            let Some(event) = events.recv().await else {
                warn!("sync event channel closed with operations in flight");
                break;
            };
            notices.extend(self.apply(event));
        }
        notices
    }

    fn after_mutation(&mut self, mutation: Mutation) {
        for &field in mutation.refreshes() {
            self.refresh(field);
        }
    }

    fn spawn(&mut self, task: impl Future<Output = SyncEvent> + Send + 'static) {
        let events = self.events.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let event = task.await;
            if events.send(event).is_err() {
                warn!("sync event receiver dropped");
            }
        });
    }
}
