use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    media::{StoredFile, UploadForm},
    models::Product,
};

pub const IMAGE_FIELD: &str = "productImage";

/// Multipart body accepted by product create and update.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct ProductUpload {
    pub name: Option<String>,
    pub product_details: Option<String>,
    pub price: Option<f64>,
    /// One of Male, Female, Unisex, Kids.
    pub gender: Option<String>,
    pub occasion: Option<String>,
    pub material_color: Option<String>,
    /// Owning collection id.
    pub collection: Option<uuid::Uuid>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub product_image: Option<Vec<u8>>,
}

/// Product form fields as submitted; validated by the service.
#[derive(Debug, Default)]
pub struct ProductInput {
    pub name: Option<String>,
    pub product_details: Option<String>,
    pub price: Option<String>,
    pub gender: Option<String>,
    pub occasion: Option<String>,
    pub material_color: Option<String>,
    pub collection: Option<String>,
    pub image: Option<StoredFile>,
}

impl ProductInput {
    pub fn from_form(mut form: UploadForm) -> Self {
        Self {
            name: form.text("name"),
            product_details: form.text("productDetails"),
            price: form.text("price"),
            gender: form.text("gender"),
            occasion: form.text("occasion"),
            material_color: form.text("materialColor"),
            collection: form.text("collection"),
            image: form.take_file(IMAGE_FIELD),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
