use crate::{
    api::{
        ClaimResponseDto,
        HistoryEntryDto,
        UserDto,
    },
    avatar::resolve_avatar,
};
use chrono::{
    DateTime,
    Utc,
};

/// Number of leaderboard places shown on the podium instead of a number.
pub const PODIUM_SIZE: usize = 3;

const UNKNOWN_USER: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub total_points: u64,
}

impl User {
    pub fn from_wire(dto: UserDto, position: usize) -> Self {
        let avatar = resolve_avatar(dto.avatar.as_deref(), position);
        User {
            id: dto.id,
            name: dto.name,
            avatar,
            total_points: dto.total_points,
        }
    }
}

/// User projection embedded in a history entry. The server may omit it or
/// send only some of its fields; the avatar is always filled in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub avatar: String,
}

impl HistoryUser {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_USER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimHistoryEntry {
    pub user: HistoryUser,
    pub points_claimed: u32,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl ClaimHistoryEntry {
    pub fn from_wire(dto: HistoryEntryDto, position: usize) -> Self {
        let (id, name, avatar) = match dto.user {
            Some(user) => (user.id, user.name, user.avatar),
            None => (None, None, None),
        };
        ClaimHistoryEntry {
            user: HistoryUser {
                id,
                name,
                avatar: resolve_avatar(avatar.as_deref(), position),
            },
            points_claimed: dto.points_claimed,
            claimed_at: dto.claimed_at,
        }
    }
}

/// Outcome of the most recent successful claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimResult {
    pub user: User,
    pub points: u32,
}

impl ClaimResult {
    pub fn from_wire(dto: ClaimResponseDto) -> Self {
        ClaimResult {
            // a lone record sits at position 0
            user: User::from_wire(dto.user, 0),
            points: dto.points,
        }
    }

    pub fn headline(&self) -> String {
        format!("{} just earned +{} Points!", self.user.name, self.points)
    }
}

pub fn users_from_wire(dtos: Vec<UserDto>) -> Vec<User> {
    dtos.into_iter()
        .enumerate()
        .map(|(position, dto)| User::from_wire(dto, position))
        .collect()
}

pub fn history_from_wire(dtos: Vec<HistoryEntryDto>) -> Vec<ClaimHistoryEntry> {
    dtos.into_iter()
        .enumerate()
        .map(|(position, dto)| ClaimHistoryEntry::from_wire(dto, position))
        .collect()
}

/// Podium medal for the first three places, `#n` below them.
pub fn rank_badge(index: usize) -> String {
    match index {
        0 => String::from("👑"),
        1 => String::from("🥈"),
        2 => String::from("🥉"),
        n => format!("#{}", n + 1),
    }
}
