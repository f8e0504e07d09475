use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    media::{StoredFile, UploadForm},
    models::BlogPost,
};

pub const BLOG_IMAGE_FIELD: &str = "blogImage";
pub const AUTHOR_IMAGE_FIELD: &str = "authorImage";
pub const DEFAULT_AUTHOR_TEXT_COLOR: &str = "text-black";

/// Multipart body accepted by blog create and update.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct BlogUpload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_role: Option<String>,
    pub author_text_color: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub blog_image: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub author_image: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct BlogInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_role: Option<String>,
    pub author_text_color: Option<String>,
    pub blog_image: Option<StoredFile>,
    pub author_image: Option<StoredFile>,
}

impl BlogInput {
    pub fn from_form(mut form: UploadForm) -> Self {
        Self {
            title: form.text("title"),
            description: form.text("description"),
            author_name: form.text("authorName"),
            author_role: form.text("authorRole"),
            author_text_color: form.text("authorTextColor"),
            blog_image: form.take_file(BLOG_IMAGE_FIELD),
            author_image: form.take_file(AUTHOR_IMAGE_FIELD),
        }
    }

    pub fn uploads(&self) -> Vec<StoredFile> {
        self.blog_image
            .iter()
            .chain(self.author_image.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct BlogList {
    #[schema(value_type = Vec<BlogPost>)]
    pub items: Vec<BlogPost>,
}
