use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Debug, ToSchema)]
pub struct NewPoll {
    pub question_text: String,
    /// Defaults to the creation time.
    pub pub_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    /// Comma-separated choice texts, each entry trimmed.
    #[serde(default)]
    pub choices: String,
    #[serde(default)]
    pub tag_ids: Vec<i32>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct VoteSubmission {
    pub choice_id: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SentimentDirection {
    Up,
    Down,
}

impl SentimentDirection {
    pub fn as_vote_types(self) -> bool {
        matches!(self, SentimentDirection::Up)
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SentimentSubmission {
    pub direction: SentimentDirection,
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub username: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuestionSummary {
    pub id: i32,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub short_description: String,
    pub trend_score: f64,
    pub was_published_recently: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PollIndexResponse {
    pub all_poll: Vec<QuestionSummary>,
    pub trending: Vec<QuestionSummary>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ChoiceResponse {
    pub id: i32,
    pub choice_text: String,
    pub votes: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TagResponse {
    pub id: i32,
    pub tag_text: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuestionDetailResponse {
    pub id: i32,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub short_description: String,
    pub long_description: String,
    pub trend_score: f64,
    pub tags: Vec<TagResponse>,
    pub choices: Vec<ChoiceResponse>,
    pub up_vote_count: i64,
    pub down_vote_count: i64,
    pub up_vote_percentage: i64,
    pub down_vote_percentage: i64,
    /// Distinct users who have choice-voted on this question.
    pub participants: i64,
    pub time_left: String,
    pub can_vote: bool,
    pub your_choice_id: Option<i32>,
    pub your_sentiment: Option<SentimentDirection>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct VoteOutcome {
    /// "created" on a first vote, "updated" on a revote.
    pub outcome: String,
    pub choice_id: i32,
    pub votes: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SentimentOutcome {
    /// "created", "changed", or "unchanged" when the same direction is
    /// repeated.
    pub outcome: String,
    pub up_vote_count: i64,
    pub down_vote_count: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CreatedPoll {
    pub id: i32,
    pub trend_score: f64,
}
