use serde::{Deserialize, Serialize};

/// The user profile payload returned alongside freshly issued credentials
///
/// A snapshot of this profile is cached in the token store so the
/// application can render user state across restarts without waiting on the
/// network. The backend remains the source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The backend's identifier for this user
    pub id: u64,

    /// The platform identifier this account is bound to
    pub telegram_id: i64,

    /// The user's handle, if one is set
    #[serde(default)]
    pub username: Option<String>,

    /// The user's first name
    pub first_name: String,

    /// The user's last name, if provided by the platform
    #[serde(default)]
    pub last_name: Option<String>,

    /// The user's spendable coin balance
    pub coins: u64,

    /// Coins earned over the account's lifetime
    pub total_coins: u64,

    /// The user's best recorded score
    pub max_score: u64,

    /// Whether the user is currently allowed to start a session
    pub can_play: bool,
}
