use std::fmt;

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    de::DeserializeOwned,
};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

const USERS_PATH: &str = "/api/users";
const ADD_USER_PATH: &str = "/api/users/add";
const LEADERBOARD_PATH: &str = "/api/claim/leaderboard";
const CLAIM_PATH: &str = "/api/claim/claim";
const HISTORY_PATH: &str = "/api/claim/history";

/// Remote points API. Every call is independent; implementations must not
/// retry or cache.
pub trait LeaderboardApi: Send + Sync + 'static {
    fn users(&self) -> impl Future<Output = Result<Vec<UserDto>>> + Send;

    /// Users sorted by total points, highest first.
    fn leaderboard(&self) -> impl Future<Output = Result<Vec<UserDto>>> + Send;

    fn history(&self) -> impl Future<Output = Result<Vec<HistoryEntryDto>>> + Send;

    /// Awards a server-chosen number of points to `user_id`.
    fn claim(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<ClaimResponseDto>> + Send;

    fn add_user(
        &self,
        user: &NewUserDto,
    ) -> impl Future<Output = Result<UserDto>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "totalPoints")]
    pub total_points: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialUserDto {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntryDto {
    #[serde(rename = "userId", default)]
    pub user: Option<PartialUserDto>,
    #[serde(rename = "pointsClaimed")]
    pub points_claimed: u32,
    /// `None` when the server omits the timestamp or sends one that is not
    /// RFC 3339.
    #[serde(
        rename = "claimedAt",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub claimed_at: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|at| at.with_timezone(&Utc)))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimRequestDto {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimResponseDto {
    pub user: UserDto,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUserDto {
    pub name: String,
    pub avatar: String,
}

#[derive(Clone)]
pub struct HttpApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for points API")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("GET {path} failed"))?;
        Self::decode(res, path).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .wrap_err_with(|| format!("POST {path} failed"))?;
        Self::decode(res, path).await
    }

    async fn decode<T: DeserializeOwned>(res: reqwest::Response, path: &str) -> Result<T> {
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read points API response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!("points API responded with {status} for {path}: {body}"));
        }
        serde_json::from_slice(&bytes)
            .wrap_err_with(|| format!("invalid points API payload for {path}"))
    }
}

impl LeaderboardApi for HttpApi {
    async fn users(&self) -> Result<Vec<UserDto>> {
        self.get_json(USERS_PATH).await
    }

    async fn leaderboard(&self) -> Result<Vec<UserDto>> {
        self.get_json(LEADERBOARD_PATH).await
    }

    async fn history(&self) -> Result<Vec<HistoryEntryDto>> {
        self.get_json(HISTORY_PATH).await
    }

    async fn claim(&self, user_id: &str) -> Result<ClaimResponseDto> {
        let body = ClaimRequestDto {
            user_id: user_id.to_string(),
        };
        self.post_json(CLAIM_PATH, &body).await
    }

    async fn add_user(&self, user: &NewUserDto) -> Result<UserDto> {
        self.post_json(ADD_USER_PATH, user).await
    }
}

impl fmt::Display for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
