use std::sync::Arc;

use crate::models::{NewThread, ThreadView};
use crate::password::{hash_password_async, verify_password_async};
use crate::repo::{Repo, ReplyRepo, ThreadRepo};

use super::{
    find_board, load_thread, required, resolve_board, thread_gone, Ack, ServiceResult,
    REPLY_PREVIEW_SIZE, THREAD_PAGE_SIZE,
};

#[derive(Clone)]
pub struct ThreadService {
    repo: Arc<dyn Repo>,
}

impl ThreadService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Post a new thread, creating the board on first use.
    pub async fn create(
        &self,
        board: &str,
        text: Option<&str>,
        delete_password: Option<&str>,
    ) -> ServiceResult<ThreadView> {
        let text = required(text)?;
        let password = required(delete_password)?;
        let board = resolve_board(self.repo.as_ref(), board).await?;
        let hash = hash_password_async(password.to_string()).await?;
        let thread = self
            .repo
            .create_thread(NewThread { board_id: board.id, text: text.to_string(), password: hash })
            .await?;
        tracing::info!(board = %board.name, thread_id = %thread.id, "thread created");
        Ok(ThreadView::new(&thread, &[]))
    }

    /// The ten most recently bumped threads, each with its three newest replies.
    pub async fn list(&self, board: &str) -> ServiceResult<Vec<ThreadView>> {
        let Some(board) = find_board(self.repo.as_ref(), board).await? else {
            return Ok(Vec::new());
        };
        let threads = self.repo.list_threads(board.id, THREAD_PAGE_SIZE).await?;
        let mut views = Vec::with_capacity(threads.len());
        for thread in &threads {
            let replies = self.repo.recent_replies(thread.id, REPLY_PREVIEW_SIZE).await?;
            views.push(ThreadView::new(thread, &replies));
        }
        Ok(views)
    }

    /// Flag for moderation; bump time is left alone.
    pub async fn report(&self, thread_id: Option<&str>) -> ServiceResult<Ack> {
        let thread = load_thread(self.repo.as_ref(), required(thread_id)?).await?;
        self.repo.report_thread(thread.id).await?;
        tracing::info!(thread_id = %thread.id, "thread reported");
        Ok(Ack::Reported)
    }

    /// Delete a thread and every reply under it.
    pub async fn delete(
        &self,
        thread_id: Option<&str>,
        delete_password: Option<&str>,
    ) -> ServiceResult<Ack> {
        let raw_id = required(thread_id)?;
        let password = required(delete_password)?;
        let thread = load_thread(self.repo.as_ref(), raw_id).await?;
        if let Err(e) = verify_password_async(password.to_string(), thread.password.clone()).await {
            tracing::warn!(thread_id = %thread.id, "thread delete rejected: {e}");
            return Err(e.into());
        }
        let removed = self.repo.delete_replies(thread.id).await?;
        self.repo.delete_thread(thread.id).await.map_err(thread_gone)?;
        tracing::info!(thread_id = %thread.id, replies = removed, "thread deleted");
        Ok(Ack::Success)
    }
}
