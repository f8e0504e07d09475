use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::collections::{CollectionInput, CollectionList},
    entity::{
        collections::{ActiveModel, Column, Entity as Collections, Model as CollectionModel},
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, authorize},
    models::Collection,
    response::{ApiResponse, Deleted, Meta},
    routes::params::CollectionQuery,
    services::{cleanup_on_error, is_foreign_key_violation, is_unique_violation, parse_flag, require},
    state::AppState,
};

const DUPLICATE_NAME: &str = "A collection with this name already exists.";

pub async fn list_collections(
    state: &AppState,
    query: CollectionQuery,
) -> AppResult<ApiResponse<CollectionList>> {
    let mut condition = Condition::all();
    if let Some(trending) = query.is_trending {
        condition = condition.add(Column::IsTrending.eq(trending));
    }
    if query.exclude_trending == Some(true) {
        condition = condition.add(Column::IsTrending.eq(false));
    }
    if let Some(purpose) = query.purpose.as_deref().filter(|p| !p.is_empty()) {
        condition = condition.add(Column::Purpose.eq(purpose));
    }

    let items = Collections::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(collection_from_entity)
        .collect();

    Ok(ApiResponse::success("Collections", CollectionList { items }, None))
}

pub async fn create_collection(
    state: &AppState,
    user: &AuthUser,
    input: CollectionInput,
) -> AppResult<ApiResponse<Collection>> {
    let uploads: Vec<_> = input.image.iter().cloned().collect();
    let collection =
        cleanup_on_error(&state.media, &uploads, insert_collection(state, user, input)).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "collection_create",
        "collections",
        serde_json::json!({ "collection_id": collection.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Collection created successfully",
        collection_from_entity(collection),
        Some(Meta::empty()),
    ))
}

async fn insert_collection(
    state: &AppState,
    user: &AuthUser,
    input: CollectionInput,
) -> AppResult<CollectionModel> {
    authorize(user, Capability::ManageCatalog)?;
    let name = require(input.name, "Collection name is required.")?;
    let image = require(input.image, "Collection image is required.")?;
    let is_trending = parse_flag("isTrending", input.is_trending.as_deref())?.unwrap_or(false);

    ensure_name_free(state, &name, None).await?;

    ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        image_url: Set(image.url),
        is_trending: Set(is_trending),
        purpose: Set(input.purpose),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(map_write_error)
}

pub async fn update_collection(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: CollectionInput,
) -> AppResult<ApiResponse<Collection>> {
    let uploads: Vec<_> = input.image.iter().cloned().collect();
    let (collection, replaced_image) = cleanup_on_error(
        &state.media,
        &uploads,
        apply_collection_changes(state, user, id, input),
    )
    .await?;

    if let Some(old_url) = replaced_image {
        state.media.remove(&old_url).await;
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "collection_update",
        "collections",
        serde_json::json!({ "collection_id": collection.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Collection updated successfully",
        collection_from_entity(collection),
        Some(Meta::empty()),
    ))
}

/// Returns the updated row and the image URL it no longer references.
async fn apply_collection_changes(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: CollectionInput,
) -> AppResult<(CollectionModel, Option<String>)> {
    authorize(user, Capability::ManageCatalog)?;
    let existing = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Collection"))?;

    let is_trending = parse_flag("isTrending", input.is_trending.as_deref())?;
    if input.name.is_none()
        && input.image.is_none()
        && is_trending.is_none()
        && input.purpose.is_none()
    {
        return Err(AppError::BadRequest("No fields provided to update.".into()));
    }

    let old_image = existing.image_url.clone();
    let mut active: ActiveModel = existing.into();
    if let Some(name) = input.name {
        ensure_name_free(state, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(is_trending) = is_trending {
        active.is_trending = Set(is_trending);
    }
    if let Some(purpose) = input.purpose {
        active.purpose = Set(Some(purpose));
    }
    let replaced = match input.image {
        Some(image) => {
            active.image_url = Set(image.url);
            Some(old_image)
        }
        None => None,
    };

    let updated = active.update(&state.orm).await.map_err(map_write_error)?;
    Ok((updated, replaced))
}

pub async fn delete_collection(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    authorize(user, Capability::ManageCatalog)?;
    let existing = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Collection"))?;

    let product_count = Products::find()
        .filter(ProductCol::CollectionId.eq(id))
        .count(&state.orm)
        .await?;
    if product_count > 0 {
        return Err(in_use(product_count));
    }

    Collections::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                in_use(1)
            } else {
                err.into()
            }
        })?;
    state.media.remove(&existing.image_url).await;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "collection_delete",
        "collections",
        serde_json::json!({ "collection_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Collection deleted successfully",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

async fn ensure_name_free(state: &AppState, name: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Collections::find().filter(Column::Name.eq(name));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_NAME.into()));
    }
    Ok(())
}

fn map_write_error(err: sea_orm::DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(DUPLICATE_NAME.into())
    } else {
        err.into()
    }
}

fn in_use(product_count: u64) -> AppError {
    AppError::Conflict(format!(
        "Collection still has {product_count} product(s); move or delete them first."
    ))
}

fn collection_from_entity(model: CollectionModel) -> Collection {
    Collection {
        id: model.id,
        name: model.name,
        image_url: model.image_url,
        is_trending: model.is_trending,
        purpose: model.purpose,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
