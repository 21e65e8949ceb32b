use crate::models::{Board, NewBoard};
use crate::repo::{BoardRepo, Repo};

use super::ServiceResult;

/// Board for `name`, created on first use.
pub async fn resolve_board(repo: &dyn Repo, name: &str) -> ServiceResult<Board> {
    let board = repo.get_or_create_board(NewBoard { name: name.to_string() }).await?;
    tracing::debug!(board = %board.name, board_id = %board.id, "board resolved");
    Ok(board)
}

/// Lookup without creating; reads never materialise boards.
pub async fn find_board(repo: &dyn Repo, name: &str) -> ServiceResult<Option<Board>> {
    Ok(repo.find_board(name).await?)
}
