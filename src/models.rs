use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub type Id = Uuid;

/// Text a reply carries once its author deleted it.
pub const DELETED_TEXT: &str = "[deleted]";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
#[derive(Debug, Clone)]
pub struct NewBoard {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: Id,
    pub board_id: Id,
    pub text: String,
    pub replycount: i64,
    pub reported: bool,
    pub password: String, // argon2 PHC string
    pub created_at: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewThread {
    pub board_id: Id,
    pub text: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reply {
    pub id: Id,
    pub thread_id: Id,
    pub text: String,
    pub reported: bool,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>, // soft delete marker
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub thread_id: Id,
    pub text: String,
    pub password: String,
}

// ---------------- wire shapes -----------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ReplyView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
}

impl From<&Reply> for ReplyView {
    fn from(r: &Reply) -> Self {
        Self { id: r.id, text: r.text.clone(), created_on: r.created_at }
    }
}

/// Thread as clients see it: no password, no reported flag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ThreadView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub replycount: i64,
    pub replies: Vec<ReplyView>,
}

impl ThreadView {
    pub fn new(thread: &Thread, replies: &[Reply]) -> Self {
        Self {
            id: thread.id,
            text: thread.text.clone(),
            created_on: thread.created_at,
            bumped_on: thread.bumped_on,
            replycount: thread.replycount,
            replies: replies.iter().map(ReplyView::from).collect(),
        }
    }
}

// Request bodies. Every field is optional so absent values surface as
// "Missing required field(s)" instead of a deserialisation failure.

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewThreadForm {
    pub text: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReportThreadForm {
    pub report_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DeleteThreadForm {
    pub thread_id: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewReplyForm {
    pub text: Option<String>,
    pub delete_password: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReportReplyForm {
    pub thread_id: Option<String>,
    pub reply_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DeleteReplyForm {
    pub thread_id: Option<String>,
    pub reply_id: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ThreadQuery {
    pub thread_id: Option<String>,
}
