use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::collections::{CollectionInput, CollectionList, CollectionUpload, IMAGE_FIELD},
    error::AppResult,
    media::{MediaFolder, UploadForm},
    middleware::auth::{AuthUser, Capability, authorize},
    models::Collection,
    response::{ApiResponse, Deleted},
    routes::params::CollectionQuery,
    services::collection_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections).post(create_collection))
        .route("/{id}", put(update_collection).delete(delete_collection))
}

#[utoipa::path(
    get,
    path = "/api/collections",
    params(
        ("isTrending" = Option<bool>, Query, description = "Only trending (true) or non-trending (false)"),
        ("excludeTrending" = Option<bool>, Query, description = "Leave out trending collections"),
        ("purpose" = Option<String>, Query, description = "Filter by homepage purpose")
    ),
    responses(
        (status = 200, description = "List collections", body = ApiResponse<CollectionList>)
    ),
    tag = "Collections"
)]
pub async fn list_collections(
    State(state): State<AppState>,
    Query(query): Query<CollectionQuery>,
) -> AppResult<Json<ApiResponse<CollectionList>>> {
    let resp = collection_service::list_collections(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/collections",
    request_body(content = CollectionUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Collection created", body = ApiResponse<Collection>),
        (status = 400, description = "Missing name or image"),
        (status = 409, description = "Duplicate collection name")
    ),
    security(("bearer_auth" = [])),
    tag = "Collections"
)]
pub async fn create_collection(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Collection>>)> {
    authorize(&user, Capability::ManageCatalog)?;
    let form = UploadForm::read(&state.media, MediaFolder::Collections, multipart, &[IMAGE_FIELD]).await?;
    let resp =
        collection_service::create_collection(&state, &user, CollectionInput::from_form(form))
            .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection ID")),
    request_body(content = CollectionUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Collection updated", body = ApiResponse<Collection>),
        (status = 404, description = "Collection not found"),
        (status = 409, description = "Duplicate collection name")
    ),
    security(("bearer_auth" = [])),
    tag = "Collections"
)]
pub async fn update_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Collection>>> {
    authorize(&user, Capability::ManageCatalog)?;
    let form = UploadForm::read(&state.media, MediaFolder::Collections, multipart, &[IMAGE_FIELD]).await?;
    let resp =
        collection_service::update_collection(&state, &user, id, CollectionInput::from_form(form))
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Collection not found"),
        (status = 409, description = "Collection still has products")
    ),
    security(("bearer_auth" = [])),
    tag = "Collections"
)]
pub async fn delete_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = collection_service::delete_collection(&state, &user, id).await?;
    Ok(Json(resp))
}
