use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::blogs::{AUTHOR_IMAGE_FIELD, BLOG_IMAGE_FIELD, BlogInput, BlogList, BlogUpload},
    error::AppResult,
    media::{MediaFolder, UploadForm},
    middleware::auth::{AuthUser, Capability, authorize},
    models::BlogPost,
    response::{ApiResponse, Deleted},
    services::blog_service,
    state::AppState,
};

const IMAGE_FIELDS: [&str; 2] = [BLOG_IMAGE_FIELD, AUTHOR_IMAGE_FIELD];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/{id}", get(get_blog).put(update_blog).delete(delete_blog))
}

#[utoipa::path(
    get,
    path = "/api/blogs",
    responses(
        (status = 200, description = "List blog posts, newest first", body = ApiResponse<BlogList>)
    ),
    tag = "Blogs"
)]
pub async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<ApiResponse<BlogList>>> {
    let resp = blog_service::list_blogs(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Get blog post", body = ApiResponse<BlogPost>),
        (status = 404, description = "Blog not found")
    ),
    tag = "Blogs"
)]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BlogPost>>> {
    let resp = blog_service::get_blog(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body(content = BlogUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Blog created", body = ApiResponse<BlogPost>),
        (status = 400, description = "Missing fields or images")
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn create_blog(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<BlogPost>>)> {
    authorize(&user, Capability::ManageContent)?;
    let form = UploadForm::read(&state.media, MediaFolder::Blogs, multipart, &IMAGE_FIELDS).await?;
    let resp = blog_service::create_blog(&state, &user, BlogInput::from_form(form)).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    request_body(content = BlogUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Blog updated", body = ApiResponse<BlogPost>),
        (status = 404, description = "Blog not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn update_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<BlogPost>>> {
    authorize(&user, Capability::ManageContent)?;
    let form = UploadForm::read(&state.media, MediaFolder::Blogs, multipart, &IMAGE_FIELDS).await?;
    let resp = blog_service::update_blog(&state, &user, id, BlogInput::from_form(form)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Blog deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Blog not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn delete_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = blog_service::delete_blog(&state, &user, id).await?;
    Ok(Json(resp))
}
