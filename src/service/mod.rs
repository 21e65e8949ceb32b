//! Request-scoped board logic on top of the store traits.
//!
//! Nothing here keeps state between calls; every operation reads and writes
//! through the shared [`Repo`].

mod board;
mod reply;
mod thread;

pub use board::{find_board, resolve_board};
pub use reply::ReplyService;
pub use thread::ThreadService;

use crate::models::{Id, Thread};
use crate::password::PasswordError;
use crate::repo::{Repo, RepoError, ThreadRepo};

/// Threads returned by a board listing.
pub const THREAD_PAGE_SIZE: usize = 10;
/// Replies previewed under each listed thread.
pub const REPLY_PREVIEW_SIZE: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("missing required field(s)")] MissingFields,
    #[error("thread not found")] ThreadNotFound,
    #[error("reply not found")] ReplyNotFound,
    #[error("incorrect password")] IncorrectPassword,
    #[error(transparent)] Store(#[from] RepoError),
    #[error(transparent)] Password(PasswordError),
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::VerificationFailed => ServiceError::IncorrectPassword,
            other => ServiceError::Password(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fixed acknowledgement for mutations that do not echo a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Reported,
    Success,
}

impl Ack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ack::Reported => "reported",
            Ack::Success => "success",
        }
    }
}

/// Empty strings count as absent.
pub(crate) fn required(v: Option<&str>) -> ServiceResult<&str> {
    v.filter(|s| !s.is_empty()).ok_or(ServiceError::MissingFields)
}

pub(crate) fn parse_id(raw: &str) -> Option<Id> {
    Id::parse_str(raw.trim()).ok()
}

/// Store `NotFound` on a thread that was loaded earlier in the same request
/// means it was deleted in between.
pub(crate) fn thread_gone(e: RepoError) -> ServiceError {
    match e {
        RepoError::NotFound => ServiceError::ThreadNotFound,
        other => other.into(),
    }
}

/// Unknown and malformed ids are indistinguishable to callers.
pub(crate) async fn load_thread(repo: &dyn Repo, raw_id: &str) -> ServiceResult<Thread> {
    let id = parse_id(raw_id).ok_or(ServiceError::ThreadNotFound)?;
    match repo.get_thread(id).await {
        Ok(t) => Ok(t),
        Err(RepoError::NotFound) => Err(ServiceError::ThreadNotFound),
        Err(e) => Err(e.into()),
    }
}
