//! Fallback avatars for records the API returns without one.

/// Fixed avatar palette. Fallbacks index into it by list position and the
/// add-user form offers the same entries.
pub const AVATAR_PALETTE: [&str; 8] = [
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Coffee",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Bear",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Star",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Moon",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Cupcake",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Alien",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Sunflower",
    "https://api.dicebear.com/7.x/fun-emoji/png?seed=Sparkle",
];

const PLACEHOLDER_BASE: &str = "https://i.pravatar.cc/150?u=";

pub fn fallback_avatar(position: usize) -> &'static str {
    AVATAR_PALETTE[position % AVATAR_PALETTE.len()]
}

/// Keeps a present, non-empty avatar; otherwise picks the palette entry for
/// the record's position in the list being processed.
pub fn resolve_avatar(avatar: Option<&str>, position: usize) -> String {
    match avatar {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => fallback_avatar(position).to_string(),
    }
}

/// Per-name placeholder used when a new user is created without picking from
/// the palette. Two submissions with the same name share it.
pub fn placeholder_avatar(name: &str) -> String {
    format!("{PLACEHOLDER_BASE}{name}")
}
