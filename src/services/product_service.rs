use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ProductInput, ProductList},
    entity::{
        collections::{Entity as Collections, Model as CollectionModel},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, authorize},
    models::{CollectionRef, Gender, Product},
    response::{ApiResponse, Deleted, Meta},
    routes::params::ProductQuery,
    services::{cleanup_on_error, is_foreign_key_violation, require},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let pagination = query.pagination();
    let mut condition = Condition::all();
    if let Some(collection_id) = query.collection_id {
        condition = condition.add(Column::CollectionId.eq(collection_id));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    // Without page parameters the whole filtered list is returned.
    let mut select = finder.find_also_related(Collections);
    let meta = if pagination.is_requested() {
        let (page, limit, offset) = pagination.normalize();
        select = select.limit(limit as u64).offset(offset as u64);
        Meta::new(page, limit, total)
    } else {
        Meta {
            total: Some(total),
            ..Meta::empty()
        }
    };

    let items = select
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(product, collection)| product_from_entity(product, collection))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = load_product(state, id).await?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    input: ProductInput,
) -> AppResult<ApiResponse<Product>> {
    let uploads: Vec<_> = input.image.iter().cloned().collect();
    let product =
        cleanup_on_error(&state.media, &uploads, insert_product(state, user, input)).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created successfully",
        product,
        Some(Meta::empty()),
    ))
}

async fn insert_product(
    state: &AppState,
    user: &AuthUser,
    input: ProductInput,
) -> AppResult<Product> {
    authorize(user, Capability::ManageCatalog)?;
    let name = require(input.name, "Product name is required.")?;
    let product_details = require(input.product_details, "Product details are required.")?;
    let price = parse_price(&require(input.price, "Price is required.")?)?;
    let gender = parse_gender(&require(input.gender, "Gender is required.")?)?;
    let occasion = require(input.occasion, "Occasion is required.")?;
    let material_color = require(input.material_color, "Material color is required.")?;
    let collection_id = require(input.collection, "Collection is required.")?;
    let image = require(input.image, "Product image is required.")?;

    let collection = find_collection(state, &collection_id).await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        product_details: Set(product_details),
        price: Set(price),
        gender: Set(gender.as_str().to_string()),
        occasion: Set(occasion),
        material_color: Set(material_color),
        image_url: Set(image.url),
        collection_id: Set(collection.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(map_write_error)?;

    product_from_entity(product, Some(collection))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: ProductInput,
) -> AppResult<ApiResponse<Product>> {
    let uploads: Vec<_> = input.image.iter().cloned().collect();
    let (product, replaced_image) = cleanup_on_error(
        &state.media,
        &uploads,
        apply_product_changes(state, user, id, input),
    )
    .await?;

    if let Some(old_url) = replaced_image {
        state.media.remove(&old_url).await;
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product,
        Some(Meta::empty()),
    ))
}

async fn apply_product_changes(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: ProductInput,
) -> AppResult<(Product, Option<String>)> {
    authorize(user, Capability::ManageCatalog)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let old_image = existing.image_url.clone();
    let mut changed = false;
    let mut active: ActiveModel = existing.into();

    if let Some(name) = input.name {
        active.name = Set(name);
        changed = true;
    }
    if let Some(details) = input.product_details {
        active.product_details = Set(details);
        changed = true;
    }
    if let Some(price) = input.price {
        active.price = Set(parse_price(&price)?);
        changed = true;
    }
    if let Some(gender) = input.gender {
        active.gender = Set(parse_gender(&gender)?.as_str().to_string());
        changed = true;
    }
    if let Some(occasion) = input.occasion {
        active.occasion = Set(occasion);
        changed = true;
    }
    if let Some(material_color) = input.material_color {
        active.material_color = Set(material_color);
        changed = true;
    }
    if let Some(collection_id) = input.collection {
        let collection = find_collection(state, &collection_id).await?;
        active.collection_id = Set(collection.id);
        changed = true;
    }
    let replaced = match input.image {
        Some(image) => {
            active.image_url = Set(image.url);
            changed = true;
            Some(old_image)
        }
        None => None,
    };

    if !changed {
        return Err(AppError::BadRequest("No fields provided to update.".into()));
    }

    let updated = active.update(&state.orm).await.map_err(map_write_error)?;
    let product = load_product(state, updated.id).await?;
    Ok((product, replaced))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    authorize(user, Capability::ManageCatalog)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    Products::delete_by_id(id).exec(&state.orm).await?;
    state.media.remove(&existing.image_url).await;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted successfully",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

async fn load_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    let (product, collection) = Products::find_by_id(id)
        .find_also_related(Collections)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    product_from_entity(product, collection)
}

/// Resolves the collection a product is being attached to; unknown ids are a client error.
async fn find_collection(state: &AppState, raw_id: &str) -> AppResult<CollectionModel> {
    let invalid = || AppError::BadRequest("Invalid collection ID.".into());
    let id = Uuid::parse_str(raw_id).map_err(|_| invalid())?;
    Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(invalid)
}

fn parse_price(raw: &str) -> AppResult<f64> {
    match raw.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::BadRequest(
            "Price must be a non-negative number.".into(),
        )),
    }
}

fn parse_gender(raw: &str) -> AppResult<Gender> {
    raw.parse::<Gender>().map_err(AppError::BadRequest)
}

fn map_write_error(err: sea_orm::DbErr) -> AppError {
    // The collection was removed between the lookup and the write.
    if is_foreign_key_violation(&err) {
        AppError::BadRequest("Invalid collection ID.".into())
    } else {
        err.into()
    }
}

fn product_from_entity(
    model: ProductModel,
    collection: Option<CollectionModel>,
) -> AppResult<Product> {
    let collection = collection.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("product {} has no collection", model.id))
    })?;
    let gender = model
        .gender
        .parse::<Gender>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(Product {
        id: model.id,
        name: model.name,
        product_details: model.product_details,
        price: model.price,
        gender,
        occasion: model.occasion,
        material_color: model.material_color,
        image_url: model.image_url,
        collection: CollectionRef {
            id: collection.id,
            name: collection.name,
        },
        created_at: model.created_at.with_timezone(&Utc),
    })
}
