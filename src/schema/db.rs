use serde::Serialize;
use sqlx::FromRow;

#[derive(FromRow)]
pub struct ID {
    pub id: i32, // SERIAL value
}

#[derive(Serialize, Debug, FromRow)]
pub struct QuestionRow {
    pub id: i32,
    pub question_text: String,
    pub pub_date: chrono::DateTime<chrono::Utc>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub short_description: String,
    pub long_description: String,
    pub trend_score: f64,
}

/// A choice joined against its derived vote count. `votes` is always a
/// COUNT over the votes ledger, never a stored column.
#[derive(Serialize, Debug, FromRow)]
pub struct ChoiceTally {
    pub id: i32,
    pub choice_text: String,
    pub votes: i64,
}

#[derive(Debug, FromRow)]
pub struct SentimentTally {
    pub up_votes: i64,
    pub down_votes: i64,
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
}

#[derive(Serialize, Debug, FromRow)]
pub struct TagRow {
    pub id: i32,
    pub tag_text: String,
}
