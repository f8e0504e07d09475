use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::blogs::{BlogInput, BlogList, DEFAULT_AUTHOR_TEXT_COLOR},
    entity::blogs::{ActiveModel, Column, Entity as Blogs, Model as BlogModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, authorize},
    models::BlogPost,
    response::{ApiResponse, Deleted, Meta},
    services::{cleanup_on_error, require},
    state::AppState,
};

pub async fn list_blogs(state: &AppState) -> AppResult<ApiResponse<BlogList>> {
    let items = Blogs::find()
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(blog_from_entity)
        .collect();
    Ok(ApiResponse::success("Blogs", BlogList { items }, None))
}

pub async fn get_blog(state: &AppState, id: Uuid) -> AppResult<ApiResponse<BlogPost>> {
    let blog = Blogs::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;
    Ok(ApiResponse::success("Blog", blog_from_entity(blog), None))
}

pub async fn create_blog(
    state: &AppState,
    user: &AuthUser,
    input: BlogInput,
) -> AppResult<ApiResponse<BlogPost>> {
    let uploads = input.uploads();
    let blog = cleanup_on_error(&state.media, &uploads, insert_blog(state, user, input)).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "blog_create",
        "blogs",
        serde_json::json!({ "blog_id": blog.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Blog created successfully",
        blog_from_entity(blog),
        Some(Meta::empty()),
    ))
}

async fn insert_blog(state: &AppState, user: &AuthUser, input: BlogInput) -> AppResult<BlogModel> {
    authorize(user, Capability::ManageContent)?;
    let title = require(input.title, "Title is required.")?;
    let description = require(input.description, "Description is required.")?;
    let author_name = require(input.author_name, "Author name is required.")?;
    let author_role = require(input.author_role, "Author role is required.")?;
    let blog_image = require(input.blog_image, "Blog image is required.")?;
    let author_image = require(input.author_image, "Author image is required.")?;

    let blog = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        description: Set(description),
        blog_image_url: Set(blog_image.url),
        author_name: Set(author_name),
        author_role: Set(author_role),
        author_image_url: Set(author_image.url),
        author_text_color: Set(input
            .author_text_color
            .unwrap_or_else(|| DEFAULT_AUTHOR_TEXT_COLOR.to_string())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(blog)
}

pub async fn update_blog(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: BlogInput,
) -> AppResult<ApiResponse<BlogPost>> {
    let uploads = input.uploads();
    let (blog, replaced) = cleanup_on_error(
        &state.media,
        &uploads,
        apply_blog_changes(state, user, id, input),
    )
    .await?;

    for url in &replaced {
        state.media.remove(url).await;
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "blog_update",
        "blogs",
        serde_json::json!({ "blog_id": blog.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Blog updated successfully",
        blog_from_entity(blog),
        Some(Meta::empty()),
    ))
}

async fn apply_blog_changes(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: BlogInput,
) -> AppResult<(BlogModel, Vec<String>)> {
    authorize(user, Capability::ManageContent)?;
    let existing = Blogs::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;

    let mut replaced = Vec::new();
    let mut changed = false;
    let old_blog_image = existing.blog_image_url.clone();
    let old_author_image = existing.author_image_url.clone();
    let mut active: ActiveModel = existing.into();

    if let Some(title) = input.title {
        active.title = Set(title);
        changed = true;
    }
    if let Some(description) = input.description {
        active.description = Set(description);
        changed = true;
    }
    if let Some(author_name) = input.author_name {
        active.author_name = Set(author_name);
        changed = true;
    }
    if let Some(author_role) = input.author_role {
        active.author_role = Set(author_role);
        changed = true;
    }
    if let Some(color) = input.author_text_color {
        active.author_text_color = Set(color);
        changed = true;
    }
    if let Some(image) = input.blog_image {
        active.blog_image_url = Set(image.url);
        replaced.push(old_blog_image);
        changed = true;
    }
    if let Some(image) = input.author_image {
        active.author_image_url = Set(image.url);
        replaced.push(old_author_image);
        changed = true;
    }

    if !changed {
        return Err(AppError::BadRequest("No fields provided to update.".into()));
    }

    let updated = active.update(&state.orm).await?;
    Ok((updated, replaced))
}

pub async fn delete_blog(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    authorize(user, Capability::ManageContent)?;
    let existing = Blogs::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;

    Blogs::delete_by_id(id).exec(&state.orm).await?;
    state.media.remove(&existing.blog_image_url).await;
    state.media.remove(&existing.author_image_url).await;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "blog_delete",
        "blogs",
        serde_json::json!({ "blog_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Blog deleted successfully",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

fn blog_from_entity(model: BlogModel) -> BlogPost {
    BlogPost {
        id: model.id,
        title: model.title,
        description: model.description,
        blog_image_url: model.blog_image_url,
        author_name: model.author_name,
        author_role: model.author_role,
        author_image_url: model.author_image_url,
        author_text_color: model.author_text_color,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
