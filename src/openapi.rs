use crate::models::{
    DeleteReplyForm, DeleteThreadForm, NewReplyForm, NewThreadForm, ReplyView, ReportReplyForm,
    ReportThreadForm, ThreadView,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_threads,
        crate::routes::create_thread,
        crate::routes::report_thread,
        crate::routes::delete_thread,
        crate::routes::view_thread,
        crate::routes::create_reply,
        crate::routes::report_reply,
        crate::routes::delete_reply,
    ),
    components(schemas(
        ThreadView, ReplyView,
        NewThreadForm, ReportThreadForm, DeleteThreadForm,
        NewReplyForm, ReportReplyForm, DeleteReplyForm
    )),
    tags(
        (name = "threads", description = "Thread operations"),
        (name = "replies", description = "Reply operations"),
    )
)]
pub struct ApiDoc;
