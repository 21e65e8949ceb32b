use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("store failure: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn find_board(&self, name: &str) -> RepoResult<Option<Board>>;
    /// Single conditional insert keyed by name; concurrent first posts
    /// to the same name converge on one board.
    async fn get_or_create_board(&self, new: NewBoard) -> RepoResult<Board>;
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// Threads of a board, most recently bumped first.
    async fn list_threads(&self, board_id: Id, limit: usize) -> RepoResult<Vec<Thread>>;
    async fn create_thread(&self, new: NewThread) -> RepoResult<Thread>;
    async fn get_thread(&self, id: Id) -> RepoResult<Thread>;
    async fn report_thread(&self, id: Id) -> RepoResult<Thread>;
    async fn bump_thread(&self, id: Id, at: DateTime<Utc>) -> RepoResult<Thread>;
    /// Removes the thread together with any replies still attached to it.
    async fn delete_thread(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// All replies of a thread in creation order.
    async fn list_replies(&self, thread_id: Id) -> RepoResult<Vec<Reply>>;
    /// Newest replies first, at most `limit`.
    async fn recent_replies(&self, thread_id: Id, limit: usize) -> RepoResult<Vec<Reply>>;
    /// Inserts the reply, increments the parent's replycount and bumps it to
    /// the reply's creation time as one unit.
    async fn create_reply(&self, new: NewReply) -> RepoResult<Reply>;
    async fn get_reply(&self, id: Id) -> RepoResult<Reply>;
    async fn report_reply(&self, id: Id) -> RepoResult<Reply>;
    async fn soft_delete_reply(&self, id: Id) -> RepoResult<Reply>;
    /// Hard delete; returns the number of removed replies.
    async fn delete_replies(&self, thread_id: Id) -> RepoResult<u64>;
}

pub trait Repo: BoardRepo + ThreadRepo + ReplyRepo {}

impl<T> Repo for T where T: BoardRepo + ThreadRepo + ReplyRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Serialize, Deserialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        boards:  HashMap<Id, Board>,
        threads: HashMap<Id, Thread>,
        replies: HashMap<Id, Reply>,
        last_tick: Option<DateTime<Utc>>,
    }

    impl State {
        /// Strictly increasing store clock so time-ordered listings are total.
        fn tick(&mut self) -> DateTime<Utc> {
            let now = Utc::now();
            let t = match self.last_tick {
                Some(last) if now <= last => last + chrono::Duration::microseconds(1),
                _ => now,
            };
            self.last_tick = Some(t);
            t
        }
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
        // orders snapshot writes so an older state never lands last
        persist_lock: Arc<Mutex<()>>,
    }

    impl InMemRepo {
        pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
                persist_lock: Arc::default(),
            }
        }

        /// Never touches the filesystem.
        pub fn ephemeral() -> Self {
            Self {
                state: Arc::new(RwLock::new(State::default())),
                snapshot_path: None,
                persist_lock: Arc::default(),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("failed to parse snapshot '{}': {e}; starting empty", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("no snapshot at '{}' ({e}); starting empty", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let _guard = self.persist_lock.lock().unwrap_or_else(|p| p.into_inner());
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => { log::error!("failed to encode snapshot: {e}"); return; }
                Err(e) => { log::error!("{e}"); return; }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(path.as_path(), bytes) {
                log::error!("failed to write snapshot '{}': {e}", path.display());
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn find_board(&self, name: &str) -> RepoResult<Option<Board>> {
            let s = self.read()?;
            Ok(s.boards.values().find(|b| b.name == name).cloned())
        }
        async fn get_or_create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let mut s = self.write()?;
            if let Some(b) = s.boards.values().find(|b| b.name == new.name) {
                return Ok(b.clone());
            }
            let board = Board { id: Id::new_v4(), name: new.name, created_at: s.tick() };
            s.boards.insert(board.id, board.clone());
            drop(s);                       // release lock before persisting
            self.persist();
            Ok(board)
        }
    }

    #[async_trait]
    impl ThreadRepo for InMemRepo {
        async fn list_threads(&self, board_id: Id, limit: usize) -> RepoResult<Vec<Thread>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.threads.values()
                .filter(|t| t.board_id == board_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.bumped_on.cmp(&a.bumped_on).then(b.created_at.cmp(&a.created_at)));
            v.truncate(limit);
            Ok(v)
        }
        async fn create_thread(&self, new: NewThread) -> RepoResult<Thread> {
            let mut s = self.write()?;
            if !s.boards.contains_key(&new.board_id) { return Err(RepoError::NotFound); }
            let now = s.tick();
            let thread = Thread {
                id: Id::new_v4(),
                board_id: new.board_id,
                text: new.text,
                replycount: 0,
                reported: false,
                password: new.password,
                created_at: now,
                bumped_on: now,
            };
            s.threads.insert(thread.id, thread.clone());
            drop(s);
            self.persist();
            Ok(thread)
        }
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let s = self.read()?;
            s.threads.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn report_thread(&self, id: Id) -> RepoResult<Thread> {
            let mut s = self.write()?;
            let th = s.threads.get_mut(&id).ok_or(RepoError::NotFound)?;
            th.reported = true;
            let updated = th.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn bump_thread(&self, id: Id, at: DateTime<Utc>) -> RepoResult<Thread> {
            let mut s = self.write()?;
            let th = s.threads.get_mut(&id).ok_or(RepoError::NotFound)?;
            th.bumped_on = at;
            let updated = th.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn delete_thread(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.threads.remove(&id).ok_or(RepoError::NotFound)?;
            // replies leave with their thread under one lock
            s.replies.retain(|_, r| r.thread_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn list_replies(&self, thread_id: Id) -> RepoResult<Vec<Reply>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.replies
                .values()
                .filter(|r| r.thread_id == thread_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at));    // ascending
            Ok(v)
        }
        async fn recent_replies(&self, thread_id: Id, limit: usize) -> RepoResult<Vec<Reply>> {
            let mut v = self.list_replies(thread_id).await?;
            v.reverse();
            v.truncate(limit);
            Ok(v)
        }
        async fn create_reply(&self, new: NewReply) -> RepoResult<Reply> {
            let mut s = self.write()?;
            if !s.threads.contains_key(&new.thread_id) { return Err(RepoError::NotFound); }
            let now = s.tick();
            let reply = Reply {
                id: Id::new_v4(),
                thread_id: new.thread_id,
                text: new.text,
                reported: false,
                password: new.password,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            s.replies.insert(reply.id, reply.clone());
            // count + bump under the same write lock
            if let Some(th) = s.threads.get_mut(&new.thread_id) {
                th.replycount += 1;
                th.bumped_on = now;
            }
            drop(s);
            self.persist();
            Ok(reply)
        }
        async fn get_reply(&self, id: Id) -> RepoResult<Reply> {
            let s = self.read()?;
            s.replies.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn report_reply(&self, id: Id) -> RepoResult<Reply> {
            let mut s = self.write()?;
            let now = s.tick();
            let r = s.replies.get_mut(&id).ok_or(RepoError::NotFound)?;
            r.reported = true;
            r.updated_at = now;
            let updated = r.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn soft_delete_reply(&self, id: Id) -> RepoResult<Reply> {
            let mut s = self.write()?;
            let now = s.tick();
            let r = s.replies.get_mut(&id).ok_or(RepoError::NotFound)?;
            r.text = DELETED_TEXT.to_string();
            r.updated_at = now;
            r.deleted_at.get_or_insert(now);
            let updated = r.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn delete_replies(&self, thread_id: Id) -> RepoResult<u64> {
            let mut s = self.write()?;
            let before = s.replies.len();
            s.replies.retain(|_, r| r.thread_id != thread_id);
            let removed = (before - s.replies.len()) as u64;
            drop(s);
            self.persist();
            Ok(removed)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const THREAD_COLS: &str = "id, board_id, text, replycount, reported, password, created_at, bumped_on";
    const REPLY_COLS: &str = "id, thread_id, text, reported, password, created_at, updated_at, deleted_at";

    fn internal(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn find_board(&self, name: &str) -> RepoResult<Option<Board>> {
            sqlx::query_as::<_, Board>("SELECT id, name, created_at FROM boards WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool).await.map_err(internal)
        }
        async fn get_or_create_board(&self, new: NewBoard) -> RepoResult<Board> {
            // no-op update so RETURNING yields the existing row on conflict
            sqlx::query_as::<_, Board>(
                "INSERT INTO boards (id, name) VALUES ($1, $2)
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id, name, created_at"
            )
            .bind(Id::new_v4())
            .bind(&new.name)
            .fetch_one(&self.pool).await.map_err(internal)
        }
    }

    #[async_trait]
    impl ThreadRepo for PgRepo {
        async fn list_threads(&self, board_id: Id, limit: usize) -> RepoResult<Vec<Thread>> {
            sqlx::query_as::<_, Thread>(&format!(
                "SELECT {THREAD_COLS} FROM threads WHERE board_id = $1
                 ORDER BY bumped_on DESC, created_at DESC LIMIT $2"
            ))
            .bind(board_id)
            .bind(limit as i64)
            .fetch_all(&self.pool).await.map_err(internal)
        }
        async fn create_thread(&self, new: NewThread) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(&format!(
                "WITH ts AS (SELECT clock_timestamp() AS t)
                 INSERT INTO threads (id, board_id, text, password, created_at, bumped_on)
                 SELECT $1, $2, $3, $4, ts.t, ts.t FROM ts
                 RETURNING {THREAD_COLS}"
            ))
            .bind(Id::new_v4())
            .bind(new.board_id)
            .bind(&new.text)
            .bind(&new.password)
            .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(&format!("SELECT {THREAD_COLS} FROM threads WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn report_thread(&self, id: Id) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(&format!(
                "UPDATE threads SET reported = TRUE WHERE id = $1 RETURNING {THREAD_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn bump_thread(&self, id: Id, at: DateTime<Utc>) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(&format!(
                "UPDATE threads SET bumped_on = $2 WHERE id = $1 RETURNING {THREAD_COLS}"
            ))
            .bind(id)
            .bind(at)
            .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn delete_thread(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM threads WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl ReplyRepo for PgRepo {
        async fn list_replies(&self, thread_id: Id) -> RepoResult<Vec<Reply>> {
            sqlx::query_as::<_, Reply>(&format!(
                "SELECT {REPLY_COLS} FROM replies WHERE thread_id = $1 ORDER BY created_at ASC"
            ))
            .bind(thread_id)
            .fetch_all(&self.pool).await.map_err(internal)
        }
        async fn recent_replies(&self, thread_id: Id, limit: usize) -> RepoResult<Vec<Reply>> {
            sqlx::query_as::<_, Reply>(&format!(
                "SELECT {REPLY_COLS} FROM replies WHERE thread_id = $1
                 ORDER BY created_at DESC LIMIT $2"
            ))
            .bind(thread_id)
            .bind(limit as i64)
            .fetch_all(&self.pool).await.map_err(internal)
        }
        async fn create_reply(&self, new: NewReply) -> RepoResult<Reply> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let reply = sqlx::query_as::<_, Reply>(&format!(
                "WITH ts AS (SELECT clock_timestamp() AS t)
                 INSERT INTO replies (id, thread_id, text, password, created_at, updated_at)
                 SELECT $1, $2, $3, $4, ts.t, ts.t FROM ts
                 RETURNING {REPLY_COLS}"
            ))
            .bind(Id::new_v4())
            .bind(new.thread_id)
            .bind(&new.text)
            .bind(&new.password)
            .fetch_one(&mut *tx).await
            .map_err(|e| match e {
                // FK violation: parent thread vanished
                sqlx::Error::Database(ref d) if d.is_foreign_key_violation() => RepoError::NotFound,
                other => internal(other),
            })?;
            let res = sqlx::query("UPDATE threads SET replycount = replycount + 1, bumped_on = $2 WHERE id = $1")
                .bind(new.thread_id)
                .bind(reply.created_at)
                .execute(&mut *tx).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            tx.commit().await.map_err(internal)?;
            Ok(reply)
        }
        async fn get_reply(&self, id: Id) -> RepoResult<Reply> {
            sqlx::query_as::<_, Reply>(&format!("SELECT {REPLY_COLS} FROM replies WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn report_reply(&self, id: Id) -> RepoResult<Reply> {
            sqlx::query_as::<_, Reply>(&format!(
                "UPDATE replies SET reported = TRUE, updated_at = clock_timestamp()
                 WHERE id = $1 RETURNING {REPLY_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn soft_delete_reply(&self, id: Id) -> RepoResult<Reply> {
            sqlx::query_as::<_, Reply>(&format!(
                "WITH ts AS (SELECT clock_timestamp() AS t)
                 UPDATE replies SET text = $2, updated_at = ts.t,
                        deleted_at = COALESCE(deleted_at, ts.t)
                 FROM ts WHERE id = $1 RETURNING {REPLY_COLS}"
            ))
            .bind(id)
            .bind(DELETED_TEXT)
            .fetch_one(&self.pool).await.map_err(internal)
        }
        async fn delete_replies(&self, thread_id: Id) -> RepoResult<u64> {
            let res = sqlx::query("DELETE FROM replies WHERE thread_id = $1")
                .bind(thread_id)
                .execute(&self.pool).await.map_err(internal)?;
            Ok(res.rows_affected())
        }
    }
}
