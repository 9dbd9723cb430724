/// Post endpoints
///
/// Create, update and delete take `multipart/form-data` with a `text` field,
/// a `visibility` field and any number of `image` fields. An `image` part
/// carrying a file name is a new upload; one without is the URL of an image
/// the post already has.
use crate::{
    auth::Session,
    context::AppContext,
    error::{PostError, PostResult},
    posts::{Post, PostIdResponse},
    validation::{RawImage, RawSubmission},
};
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

/// Build post routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:id/replies", post(create_reply))
}

async fn create_post(
    State(ctx): State<AppContext>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> PostResult<impl IntoResponse> {
    // Reject anonymous callers before reading the body
    session.current_user_id()?;
    let submission = read_submission(multipart.map_err(not_a_form)?).await?;

    let id = ctx.posts.create(&session, submission, None).await?;

    Ok((StatusCode::CREATED, Json(PostIdResponse { id })))
}

async fn create_reply(
    State(ctx): State<AppContext>,
    Path(parent_id): Path<String>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> PostResult<impl IntoResponse> {
    session.current_user_id()?;
    let submission = read_submission(multipart.map_err(not_a_form)?).await?;

    let id = ctx.posts.create(&session, submission, Some(parent_id)).await?;

    Ok((StatusCode::CREATED, Json(PostIdResponse { id })))
}

async fn update_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> PostResult<Json<PostIdResponse>> {
    session.current_user_id()?;
    let submission = read_submission(multipart.map_err(not_a_form)?).await?;

    let id = ctx.posts.update(&session, &id, submission).await?;

    Ok(Json(PostIdResponse { id }))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    session: Session,
) -> PostResult<Json<PostIdResponse>> {
    let id = ctx.posts.delete(&session, &id).await?;

    Ok(Json(PostIdResponse { id }))
}

async fn get_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    session: Session,
) -> PostResult<Json<Post>> {
    Ok(Json(ctx.posts.get(&session, &id).await?))
}

fn not_a_form(e: MultipartRejection) -> PostError {
    PostError::Validation(format!("Expected multipart form data: {}", e.body_text()))
}

fn malformed(e: MultipartError) -> PostError {
    tracing::debug!("Rejecting malformed form body: {}", e);
    PostError::Validation(format!("Malformed form data: {}", e.body_text()))
}

/// Collect the form fields of a post submission
async fn read_submission(mut multipart: Multipart) -> PostResult<RawSubmission> {
    let mut submission = RawSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => submission.text = Some(field.text().await.map_err(malformed)?),
            "visibility" => submission.visibility = Some(field.text().await.map_err(malformed)?),
            "image" => submission.images.push(read_image(field).await?),
            _ => tracing::debug!("Ignoring unknown form field {:?}", name),
        }
    }

    Ok(submission)
}

async fn read_image(field: Field<'_>) -> PostResult<RawImage> {
    let file_name = field.file_name().map(String::from);
    let data = field.bytes().await.map_err(malformed)?.to_vec();

    Ok(match file_name {
        Some(file_name) => RawImage::File { file_name, data },
        None => match String::from_utf8(data) {
            Ok(url) => RawImage::Url(url),
            Err(_) => RawImage::Unsupported("binary data without a file name".to_string()),
        },
    })
}
