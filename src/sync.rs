//! Network side of the view: one function per API operation, each turning
//! the response into a [`SyncEvent`] for the store to apply.

use crate::{
    api::{
        LeaderboardApi,
        NewUserDto,
    },
    model::{
        ClaimHistoryEntry,
        ClaimResult,
        User,
        history_from_wire,
        users_from_wire,
    },
    view_state::Field,
};
use color_eyre::eyre::Result;

/// Server-side writes the view can trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Claim,
    CreateUser,
}

impl Mutation {
    /// Reads that must be repeated after the mutation succeeds. A claim never
    /// reloads the users list.
    pub fn refreshes(self) -> &'static [Field] {
        match self {
            Mutation::Claim => &[Field::Leaderboard, Field::History],
            Mutation::CreateUser => &[Field::Users],
        }
    }
}

#[derive(Debug)]
pub enum SyncEvent {
    Users {
        seq: u64,
        result: Result<Vec<User>>,
    },
    Leaderboard {
        seq: u64,
        result: Result<Vec<User>>,
    },
    History {
        seq: u64,
        result: Result<Vec<ClaimHistoryEntry>>,
    },
    Claimed(Result<ClaimResult>),
    UserCreated(Result<User>),
}

pub async fn fetch<A: LeaderboardApi>(api: &A, field: Field, seq: u64) -> SyncEvent {
    match field {
        Field::Users => SyncEvent::Users {
            seq,
            result: api.users().await.map(users_from_wire),
        },
        Field::Leaderboard => SyncEvent::Leaderboard {
            seq,
            result: api.leaderboard().await.map(users_from_wire),
        },
        Field::History => SyncEvent::History {
            seq,
            result: api.history().await.map(history_from_wire),
        },
    }
}

pub async fn claim<A: LeaderboardApi>(api: &A, user_id: String) -> SyncEvent {
    SyncEvent::Claimed(api.claim(&user_id).await.map(ClaimResult::from_wire))
}

pub async fn create_user<A: LeaderboardApi>(api: &A, user: NewUserDto) -> SyncEvent {
    SyncEvent::UserCreated(api.add_user(&user).await.map(|dto| User::from_wire(dto, 0)))
}
