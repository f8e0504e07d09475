use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect,
    Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::contact::{ContactMessageList, ContactRequest},
    entity::contact_messages::{ActiveModel, Column, Entity as ContactMessages, Model as MessageModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, authorize},
    models::ContactMessage,
    response::{ApiResponse, Deleted, Meta},
    routes::params::Pagination,
    services::{non_blank, require},
    state::AppState,
};

/// Stores a storefront contact message and notifies the shop by email in the background.
pub async fn submit_message(
    state: &AppState,
    payload: ContactRequest,
) -> AppResult<ApiResponse<ContactMessage>> {
    let full_name = require(non_blank(payload.full_name), "Full name is required.")?;
    let email = require(non_blank(payload.email), "Email is required.")?;
    let phone_number = require(non_blank(payload.phone_number), "Phone number is required.")?;
    let message = require(non_blank(payload.message), "Message is required.")?;

    let saved = ActiveModel {
        id: Set(Uuid::new_v4()),
        full_name: Set(full_name),
        email: Set(email),
        phone_number: Set(phone_number),
        message: Set(message),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    let saved = message_from_entity(saved);

    match state.mailer.clone() {
        Some(mailer) => {
            let message = saved.clone();
            tokio::spawn(async move {
                if let Err(err) = mailer.notify_contact(&message).await {
                    tracing::error!(error = %err, message_id = %message.id, "contact notification failed");
                }
            });
        }
        None => tracing::debug!(message_id = %saved.id, "email disabled, skipping notification"),
    }

    Ok(ApiResponse::success(
        "Message sent successfully",
        saved,
        Some(Meta::empty()),
    ))
}

pub async fn list_messages(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ContactMessageList>> {
    authorize(user, Capability::ReviewMessages)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = ContactMessages::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(message_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Messages",
        ContactMessageList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn delete_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    authorize(user, Capability::ReviewMessages)?;
    let result = ContactMessages::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Message"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "contact_message_delete",
        "contact_messages",
        serde_json::json!({ "message_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Message deleted successfully",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

fn message_from_entity(model: MessageModel) -> ContactMessage {
    ContactMessage {
        id: model.id,
        full_name: model.full_name,
        email: model.email,
        phone_number: model.phone_number,
        message: model.message,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
