use std::sync::Arc;

use crate::models::{NewReply, Reply, ReplyView, Thread, ThreadView};
use crate::password::{hash_password_async, verify_password_async};
use crate::repo::{Repo, RepoError, ReplyRepo, ThreadRepo};

use super::{load_thread, parse_id, required, thread_gone, Ack, ServiceError, ServiceResult};

#[derive(Clone)]
pub struct ReplyService {
    repo: Arc<dyn Repo>,
}

impl ReplyService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Add a reply; the parent's replycount and bump time move with it.
    pub async fn create(
        &self,
        thread_id: Option<&str>,
        text: Option<&str>,
        delete_password: Option<&str>,
    ) -> ServiceResult<ReplyView> {
        let text = required(text)?;
        let password = required(delete_password)?;
        let raw_id = required(thread_id)?;
        let thread = load_thread(self.repo.as_ref(), raw_id).await?;
        let hash = hash_password_async(password.to_string()).await?;
        let reply = self
            .repo
            .create_reply(NewReply { thread_id: thread.id, text: text.to_string(), password: hash })
            .await
            .map_err(thread_gone)?;
        tracing::info!(thread_id = %thread.id, reply_id = %reply.id, "reply created");
        Ok(ReplyView::from(&reply))
    }

    /// A thread with every reply, oldest first.
    pub async fn view(&self, thread_id: Option<&str>) -> ServiceResult<ThreadView> {
        let thread = load_thread(self.repo.as_ref(), required(thread_id)?).await?;
        let replies = self.repo.list_replies(thread.id).await?;
        Ok(ThreadView::new(&thread, &replies))
    }

    /// Flag a reply and bump its thread to the report time.
    pub async fn report(&self, thread_id: Option<&str>, reply_id: Option<&str>) -> ServiceResult<Ack> {
        let raw_thread = required(thread_id)?;
        let raw_reply = required(reply_id)?;
        let (thread, reply) = self.load_pair(raw_thread, raw_reply).await?;
        let reply = self.repo.report_reply(reply.id).await?;
        self.repo.bump_thread(thread.id, reply.updated_at).await.map_err(thread_gone)?;
        tracing::info!(thread_id = %thread.id, reply_id = %reply.id, "reply reported");
        Ok(Ack::Reported)
    }

    /// Replace the reply's text with the deleted marker. The record and the
    /// thread's replycount stay.
    pub async fn delete(
        &self,
        thread_id: Option<&str>,
        reply_id: Option<&str>,
        delete_password: Option<&str>,
    ) -> ServiceResult<Ack> {
        let raw_thread = required(thread_id)?;
        let raw_reply = required(reply_id)?;
        let password = required(delete_password)?;
        let (thread, reply) = self.load_pair(raw_thread, raw_reply).await?;
        if let Err(e) = verify_password_async(password.to_string(), reply.password.clone()).await {
            tracing::warn!(reply_id = %reply.id, "reply delete rejected: {e}");
            return Err(e.into());
        }
        let reply = self.repo.soft_delete_reply(reply.id).await?;
        self.repo.bump_thread(thread.id, reply.updated_at).await.map_err(thread_gone)?;
        tracing::info!(thread_id = %thread.id, reply_id = %reply.id, "reply deleted");
        Ok(Ack::Success)
    }

    /// Thread first, then a reply that must belong to it.
    async fn load_pair(&self, raw_thread: &str, raw_reply: &str) -> ServiceResult<(Thread, Reply)> {
        let thread = load_thread(self.repo.as_ref(), raw_thread).await?;
        let reply_id = parse_id(raw_reply).ok_or(ServiceError::ReplyNotFound)?;
        let reply = match self.repo.get_reply(reply_id).await {
            Ok(r) if r.thread_id == thread.id => r,
            Ok(_) | Err(RepoError::NotFound) => return Err(ServiceError::ReplyNotFound),
            Err(e) => return Err(e.into()),
        };
        Ok((thread, reply))
    }
}

#[cfg(all(test, feature = "inmem-store"))]
mod tests {
    use super::*;
    use crate::models::{Board, Id, NewBoard, NewThread, DELETED_TEXT};
    use crate::repo::inmem::InMemRepo;
    use crate::repo::{BoardRepo, RepoResult};
    use chrono::{DateTime, Utc};
    use crate::service::ThreadService;

    async fn setup() -> (ThreadService, ReplyService, Arc<InMemRepo>, String) {
        let repo = Arc::new(InMemRepo::ephemeral());
        let threads = ThreadService::new(repo.clone());
        let replies = ReplyService::new(repo.clone());
        let view = threads.create("general", Some("op"), Some("tpw")).await.unwrap();
        (threads, replies, repo, view.id.to_string())
    }

    #[tokio::test]
    async fn replies_count_and_bump() {
        let (_, replies, _, tid) = setup().await;
        let mut last = None;
        for i in 0..4 {
            last = Some(replies.create(Some(tid.as_str()), Some(format!("r{i}").as_str()), Some("pw")).await.unwrap());
        }
        let view = replies.view(Some(tid.as_str())).await.unwrap();
        assert_eq!(view.replycount, 4);
        assert_eq!(view.bumped_on, last.unwrap().created_on);
        let texts: Vec<_> = view.replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["r0", "r1", "r2", "r3"]);
        assert!(view.bumped_on > view.created_on);
    }

    #[tokio::test]
    async fn create_validates_inputs() {
        let (_, replies, _, tid) = setup().await;
        let err = replies.create(None, Some("t"), Some("pw")).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingFields));
        let err = replies.create(Some(tid.as_str()), None, Some("pw")).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingFields));
        let err = replies
            .create(Some(crate::models::Id::new_v4().to_string().as_str()), Some("t"), Some("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ThreadNotFound));
    }

    #[tokio::test]
    async fn report_flags_reply_and_bumps_thread() {
        let (_, replies, repo, tid) = setup().await;
        let r = replies.create(Some(tid.as_str()), Some("hi"), Some("pw")).await.unwrap();
        let before = replies.view(Some(tid.as_str())).await.unwrap();

        let ack = replies.report(Some(tid.as_str()), Some(r.id.to_string().as_str())).await.unwrap();
        assert_eq!(ack, Ack::Reported);
        let stored = repo.get_reply(r.id).await.unwrap();
        assert!(stored.reported);
        assert_eq!(stored.text, "hi");

        let after = replies.view(Some(tid.as_str())).await.unwrap();
        assert_eq!(after.replycount, before.replycount);
        assert_eq!(after.bumped_on, stored.updated_at);
        assert!(after.bumped_on > before.bumped_on);
    }

    #[tokio::test]
    async fn report_distinguishes_missing_thread_and_reply() {
        let (threads, replies, _, tid) = setup().await;
        let r = replies.create(Some(tid.as_str()), Some("hi"), Some("pw")).await.unwrap();
        let rid = r.id.to_string();

        let err = replies.report(Some("bogus"), Some(rid.as_str())).await.unwrap_err();
        assert!(matches!(err, ServiceError::ThreadNotFound));
        let err = replies.report(Some(tid.as_str()), Some("bogus")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReplyNotFound));

        // a reply from another thread does not resolve
        let other = threads.create("general", Some("other"), Some("pw")).await.unwrap();
        let err = replies.report(Some(other.id.to_string().as_str()), Some(rid.as_str())).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReplyNotFound));
    }

    #[tokio::test]
    async fn delete_is_soft_and_password_gated() {
        let (_, replies, _, tid) = setup().await;
        let r = replies.create(Some(tid.as_str()), Some("hi"), Some("rpw")).await.unwrap();
        let rid = r.id.to_string();

        // thread password does not unlock the reply
        let err = replies.delete(Some(tid.as_str()), Some(rid.as_str()), Some("tpw")).await.unwrap_err();
        assert!(matches!(err, ServiceError::IncorrectPassword));
        assert_eq!(replies.view(Some(tid.as_str())).await.unwrap().replies[0].text, "hi");

        let ack = replies.delete(Some(tid.as_str()), Some(rid.as_str()), Some("rpw")).await.unwrap();
        assert_eq!(ack, Ack::Success);
        let view = replies.view(Some(tid.as_str())).await.unwrap();
        assert_eq!(view.replycount, 1);
        assert_eq!(view.replies.len(), 1);
        assert_eq!(view.replies[0].id, r.id);
        assert_eq!(view.replies[0].text, DELETED_TEXT);
    }

    /// Deletes the thread right before its bump lands, as a concurrent
    /// thread delete would.
    struct DeletedBeforeBump(InMemRepo);

    #[async_trait::async_trait]
    impl BoardRepo for DeletedBeforeBump {
        async fn find_board(&self, name: &str) -> RepoResult<Option<Board>> {
            self.0.find_board(name).await
        }
        async fn get_or_create_board(&self, new: NewBoard) -> RepoResult<Board> {
            self.0.get_or_create_board(new).await
        }
    }

    #[async_trait::async_trait]
    impl ThreadRepo for DeletedBeforeBump {
        async fn list_threads(&self, board_id: Id, limit: usize) -> RepoResult<Vec<Thread>> {
            self.0.list_threads(board_id, limit).await
        }
        async fn create_thread(&self, new: NewThread) -> RepoResult<Thread> {
            self.0.create_thread(new).await
        }
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            self.0.get_thread(id).await
        }
        async fn report_thread(&self, id: Id) -> RepoResult<Thread> {
            self.0.report_thread(id).await
        }
        async fn bump_thread(&self, id: Id, at: DateTime<Utc>) -> RepoResult<Thread> {
            self.0.delete_thread(id).await?;
            self.0.bump_thread(id, at).await
        }
        async fn delete_thread(&self, id: Id) -> RepoResult<()> {
            self.0.delete_thread(id).await
        }
    }

    #[async_trait::async_trait]
    impl ReplyRepo for DeletedBeforeBump {
        async fn list_replies(&self, thread_id: Id) -> RepoResult<Vec<Reply>> {
            self.0.list_replies(thread_id).await
        }
        async fn recent_replies(&self, thread_id: Id, limit: usize) -> RepoResult<Vec<Reply>> {
            self.0.recent_replies(thread_id, limit).await
        }
        async fn create_reply(&self, new: NewReply) -> RepoResult<Reply> {
            self.0.create_reply(new).await
        }
        async fn get_reply(&self, id: Id) -> RepoResult<Reply> {
            self.0.get_reply(id).await
        }
        async fn report_reply(&self, id: Id) -> RepoResult<Reply> {
            self.0.report_reply(id).await
        }
        async fn soft_delete_reply(&self, id: Id) -> RepoResult<Reply> {
            self.0.soft_delete_reply(id).await
        }
        async fn delete_replies(&self, thread_id: Id) -> RepoResult<u64> {
            self.0.delete_replies(thread_id).await
        }
    }

    #[tokio::test]
    async fn thread_deleted_mid_request_reads_as_invalid_thread() {
        let repo = Arc::new(DeletedBeforeBump(InMemRepo::ephemeral()));
        let threads = ThreadService::new(repo.clone());
        let replies = ReplyService::new(repo.clone());

        let view = threads.create("general", Some("op"), Some("pw")).await.unwrap();
        let tid = view.id.to_string();
        let r = replies.create(Some(tid.as_str()), Some("hi"), Some("rpw")).await.unwrap();

        let err = replies.report(Some(tid.as_str()), Some(r.id.to_string().as_str())).await.unwrap_err();
        assert!(matches!(err, ServiceError::ThreadNotFound));
    }
}
