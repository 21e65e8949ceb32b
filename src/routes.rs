use std::sync::Arc;
use actix_web::http::header::ContentType;
use actix_web::{web, Either, HttpResponse};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::*;
use crate::repo::Repo;
use crate::service::{Ack, ReplyService, ThreadService};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/threads/{board}")
                    .route(web::get().to(list_threads))
                    .route(web::post().to(create_thread))
                    .route(web::put().to(report_thread))
                    .route(web::delete().to(delete_thread)),
            )
            .service(
                web::resource("/replies/{board}")
                    .route(web::get().to(view_thread))
                    .route(web::post().to(create_reply))
                    .route(web::put().to(report_reply))
                    .route(web::delete().to(delete_reply)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState { pub threads: ThreadService, pub replies: ReplyService }

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { threads: ThreadService::new(repo.clone()), replies: ReplyService::new(repo) }
    }
}

/// JSON or urlencoded body. An absent or unreadable body behaves like one
/// with no fields, so it surfaces as "Missing required field(s)".
pub type Payload<T> = Option<Either<web::Json<T>, web::Form<T>>>;

fn fields<T: DeserializeOwned + Default>(body: Payload<T>) -> T {
    match body {
        Some(Either::Left(json)) => json.into_inner(),
        Some(Either::Right(form)) => form.into_inner(),
        None => T::default(),
    }
}

fn ack(a: Ack) -> HttpResponse {
    HttpResponse::Ok().insert_header(ContentType::plaintext()).body(a.as_str())
}

#[utoipa::path(
    get,
    path = "/api/threads/{board}",
    params(("board" = String, Path, description = "Board name")),
    responses(
        (status = 200, description = "Ten most recently bumped threads, three newest replies each", body = [ThreadView])
    ),
    tag = "threads"
)]
pub async fn list_threads(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let threads = data.threads.list(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(threads))
}

#[utoipa::path(
    post,
    path = "/api/threads/{board}",
    params(("board" = String, Path, description = "Board name, created on first post")),
    request_body = NewThreadForm,
    responses(
        (status = 200, description = "Created thread, or plain-text \"Missing required field(s)\"", body = ThreadView)
    ),
    tag = "threads"
)]
pub async fn create_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: Payload<NewThreadForm>,
) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    let thread = data
        .threads
        .create(&path.into_inner(), form.text.as_deref(), form.delete_password.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    put,
    path = "/api/threads/{board}",
    params(("board" = String, Path, description = "Board name")),
    request_body = ReportThreadForm,
    responses(
        (status = 200, description = "\"reported\" | \"Invalid Thread Id provided\" | \"Missing required field(s)\"", body = String)
    ),
    tag = "threads"
)]
pub async fn report_thread(data: web::Data<AppState>, body: Payload<ReportThreadForm>) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    Ok(ack(data.threads.report(form.report_id.as_deref()).await?))
}

#[utoipa::path(
    delete,
    path = "/api/threads/{board}",
    params(("board" = String, Path, description = "Board name")),
    request_body = DeleteThreadForm,
    responses(
        (status = 200, description = "\"success\" | \"incorrect password\" | \"Invalid Thread Id provided\" | \"Missing required field(s)\"", body = String)
    ),
    tag = "threads"
)]
pub async fn delete_thread(data: web::Data<AppState>, body: Payload<DeleteThreadForm>) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    let a = data
        .threads
        .delete(form.thread_id.as_deref(), form.delete_password.as_deref())
        .await?;
    Ok(ack(a))
}

#[utoipa::path(
    get,
    path = "/api/replies/{board}",
    params(("board" = String, Path, description = "Board name"), ThreadQuery),
    responses(
        (status = 200, description = "Thread with all replies, or plain-text error", body = ThreadView)
    ),
    tag = "replies"
)]
pub async fn view_thread(data: web::Data<AppState>, query: Option<web::Query<ThreadQuery>>) -> Result<HttpResponse, ApiError> {
    let query = query.map(|q| q.into_inner()).unwrap_or_default();
    let thread = data.replies.view(query.thread_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    post,
    path = "/api/replies/{board}",
    params(("board" = String, Path, description = "Board name")),
    request_body = NewReplyForm,
    responses(
        (status = 200, description = "Created reply, or plain-text error", body = ReplyView)
    ),
    tag = "replies"
)]
pub async fn create_reply(data: web::Data<AppState>, body: Payload<NewReplyForm>) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    let reply = data
        .replies
        .create(form.thread_id.as_deref(), form.text.as_deref(), form.delete_password.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(reply))
}

#[utoipa::path(
    put,
    path = "/api/replies/{board}",
    params(("board" = String, Path, description = "Board name")),
    request_body = ReportReplyForm,
    responses(
        (status = 200, description = "\"reported\" | \"Invalid Thread Id provided\" | \"Invalid reply Id provided\" | \"Missing required field(s)\"", body = String)
    ),
    tag = "replies"
)]
pub async fn report_reply(data: web::Data<AppState>, body: Payload<ReportReplyForm>) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    let a = data
        .replies
        .report(form.thread_id.as_deref(), form.reply_id.as_deref())
        .await?;
    Ok(ack(a))
}

#[utoipa::path(
    delete,
    path = "/api/replies/{board}",
    params(("board" = String, Path, description = "Board name")),
    request_body = DeleteReplyForm,
    responses(
        (status = 200, description = "\"success\" | \"incorrect password\" | \"Invalid Thread Id provided\" | \"Invalid reply Id provided\" | \"Missing required field(s)\"", body = String)
    ),
    tag = "replies"
)]
pub async fn delete_reply(data: web::Data<AppState>, body: Payload<DeleteReplyForm>) -> Result<HttpResponse, ApiError> {
    let form = fields(body);
    let a = data
        .replies
        .delete(form.thread_id.as_deref(), form.reply_id.as_deref(), form.delete_password.as_deref())
        .await?;
    Ok(ack(a))
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().insert_header(ContentType::plaintext()).body("Not Found")
}
