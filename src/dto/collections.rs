use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    media::{StoredFile, UploadForm},
    models::Collection,
};

pub const IMAGE_FIELD: &str = "collectionImage";

/// Multipart body accepted by collection create and update.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct CollectionUpload {
    pub name: Option<String>,
    pub is_trending: Option<bool>,
    pub purpose: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub collection_image: Option<Vec<u8>>,
}

/// Collection form fields as submitted; validated by the service.
#[derive(Debug, Default)]
pub struct CollectionInput {
    pub name: Option<String>,
    pub is_trending: Option<String>,
    pub purpose: Option<String>,
    pub image: Option<StoredFile>,
}

impl CollectionInput {
    pub fn from_form(mut form: UploadForm) -> Self {
        Self {
            name: form.text("name"),
            is_trending: form.text("isTrending"),
            purpose: form.text("purpose"),
            image: form.take_file(IMAGE_FIELD),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CollectionList {
    #[schema(value_type = Vec<Collection>)]
    pub items: Vec<Collection>,
}
