mod common;

use jewellery_storefront_api::{
    dto::{blogs::BlogInput, collections::CollectionInput, products::ProductInput},
    error::AppError,
    media::MediaFolder,
    routes::params::{CollectionQuery, ProductQuery},
    services::{blog_service, collection_service, product_service},
    state::AppState,
};
use uuid::Uuid;

async fn new_collection(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    collection_with(state, name, true, None).await
}

async fn collection_with(
    state: &AppState,
    name: &str,
    trending: bool,
    purpose: Option<&str>,
) -> anyhow::Result<Uuid> {
    let image = common::store_image(state, MediaFolder::Collections, "collectionImage").await?;
    let created = collection_service::create_collection(
        state,
        &common::admin(),
        CollectionInput {
            name: Some(name.to_string()),
            is_trending: Some(trending.to_string()),
            purpose: purpose.map(str::to_string),
            image: Some(image),
        },
    )
    .await?;
    Ok(created.data.expect("collection").id)
}

async fn listed_collections(state: &AppState, query: CollectionQuery) -> anyhow::Result<Vec<Uuid>> {
    Ok(collection_service::list_collections(state, query)
        .await?
        .data
        .expect("collections")
        .items
        .into_iter()
        .map(|c| c.id)
        .collect())
}

async fn gold_band(state: &AppState, collection: String) -> anyhow::Result<ProductInput> {
    Ok(ProductInput {
        name: Some("Gold Band".into()),
        product_details: Some("22k yellow gold band".into()),
        price: Some("5000".into()),
        gender: Some("Unisex".into()),
        occasion: Some("Wedding".into()),
        material_color: Some("Yellow Gold".into()),
        collection: Some(collection),
        image: Some(common::store_image(state, MediaFolder::Products, "productImage").await?),
    })
}

// Rings collection -> Gold Band product -> filtered listing shows the populated collection.
#[tokio::test]
async fn product_listing_filters_by_collection() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let rings_name = common::unique("Rings");
    let rings = new_collection(&state, &rings_name).await?;

    let product = product_service::create_product(
        &state,
        &common::admin(),
        gold_band(&state, rings.to_string()).await?,
    )
    .await?
    .data
    .expect("product");
    assert_eq!(product.price, 5000.0);

    let listed = product_service::list_products(
        &state,
        ProductQuery {
            collection_id: Some(rings),
            page: None,
            per_page: None,
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].id, product.id);
    assert_eq!(listed.items[0].name, "Gold Band");
    assert_eq!(listed.items[0].collection.id, rings);
    assert_eq!(listed.items[0].collection.name, rings_name);

    let trending = collection_service::list_collections(
        &state,
        CollectionQuery {
            is_trending: Some(true),
            exclude_trending: None,
            purpose: None,
        },
    )
    .await?
    .data
    .expect("collections");
    assert!(trending.items.iter().any(|c| c.id == rings));

    let err = collection_service::delete_collection(&state, &common::admin(), rings)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    product_service::delete_product(&state, &common::admin(), product.id).await?;
    collection_service::delete_collection(&state, &common::admin(), rings).await?;

    Ok(())
}

#[tokio::test]
async fn duplicate_collection_name_conflicts() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let name = common::unique("Necklaces");
    new_collection(&state, &name).await?;

    let image = common::store_image(&state, MediaFolder::Collections, "collectionImage").await?;
    let err = collection_service::create_collection(
        &state,
        &common::admin(),
        CollectionInput {
            name: Some(name),
            is_trending: None,
            purpose: None,
            image: Some(image.clone()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(!image.path.exists(), "rejected upload should be removed");

    Ok(())
}

#[tokio::test]
async fn product_with_unknown_collection_is_rejected_and_upload_removed() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let input = gold_band(&state, Uuid::new_v4().to_string()).await?;
    let upload = input.image.clone().expect("upload");
    assert!(upload.path.exists());

    let err = product_service::create_product(&state, &common::admin(), input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(!upload.path.exists());

    Ok(())
}

#[tokio::test]
async fn shoppers_cannot_edit_catalog() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let image = common::store_image(&state, MediaFolder::Collections, "collectionImage").await?;
    let err = collection_service::create_collection(
        &state,
        &common::shopper(),
        CollectionInput {
            name: Some(common::unique("Bangles")),
            is_trending: None,
            purpose: None,
            image: Some(image.clone()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(!image.path.exists());

    Ok(())
}

#[tokio::test]
async fn collection_image_replacement_removes_old_file() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let id = new_collection(&state, &common::unique("Earrings")).await?;
    let before = collection_service::list_collections(&state, CollectionQuery::default())
        .await?
        .data
        .expect("collections")
        .items
        .into_iter()
        .find(|c| c.id == id)
        .expect("collection listed");
    let old_path = state.media.path_for_url(&before.image_url).expect("local path");
    assert!(old_path.exists());

    let replacement = common::store_image(&state, MediaFolder::Collections, "collectionImage").await?;
    let updated = collection_service::update_collection(
        &state,
        &common::admin(),
        id,
        CollectionInput {
            image: Some(replacement.clone()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("updated");
    assert_eq!(updated.image_url, replacement.url);
    assert!(!old_path.exists());

    let err = collection_service::update_collection(&state, &common::admin(), id, CollectionInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn blog_defaults_text_color_and_needs_both_images() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let blog_image = common::store_image(&state, MediaFolder::Blogs, "blogImage").await?;
    let err = blog_service::create_blog(
        &state,
        &common::admin(),
        BlogInput {
            title: Some("Caring for silver".into()),
            description: Some("Keep it dry.".into()),
            author_name: Some("Meera".into()),
            author_role: Some("Curator".into()),
            blog_image: Some(blog_image.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(!blog_image.path.exists());

    let blog = blog_service::create_blog(
        &state,
        &common::admin(),
        BlogInput {
            title: Some("Caring for silver".into()),
            description: Some("Keep it dry.".into()),
            author_name: Some("Meera".into()),
            author_role: Some("Curator".into()),
            author_text_color: None,
            blog_image: Some(common::store_image(&state, MediaFolder::Blogs, "blogImage").await?),
            author_image: Some(common::store_image(&state, MediaFolder::Blogs, "authorImage").await?),
        },
    )
    .await?
    .data
    .expect("blog");
    assert_eq!(blog.author_text_color, "text-black");

    blog_service::delete_blog(&state, &common::admin(), blog.id).await?;
    let err = blog_service::get_blog(&state, blog.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn collection_filters_split_trending_and_purpose() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let purpose = common::unique("homepage-hero");
    let trending = collection_with(&state, &common::unique("Anklets"), true, None).await?;
    let regular = collection_with(&state, &common::unique("Brooches"), false, Some(&purpose)).await?;

    let excluded = listed_collections(
        &state,
        CollectionQuery {
            exclude_trending: Some(true),
            ..Default::default()
        },
    )
    .await?;
    assert!(excluded.contains(&regular));
    assert!(!excluded.contains(&trending));

    let not_trending = listed_collections(
        &state,
        CollectionQuery {
            is_trending: Some(false),
            ..Default::default()
        },
    )
    .await?;
    assert!(not_trending.contains(&regular));
    assert!(!not_trending.contains(&trending));

    let by_purpose = listed_collections(
        &state,
        CollectionQuery {
            purpose: Some(purpose),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(by_purpose, vec![regular]);

    Ok(())
}

#[tokio::test]
async fn product_update_validates_and_replaces_image() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let rings = new_collection(&state, &common::unique("Rings")).await?;
    let bands = new_collection(&state, &common::unique("Bands")).await?;
    let product = product_service::create_product(
        &state,
        &common::admin(),
        gold_band(&state, rings.to_string()).await?,
    )
    .await?
    .data
    .expect("product");
    let old_path = state.media.path_for_url(&product.image_url).expect("local path");
    assert!(old_path.exists());

    let rejected = common::store_image(&state, MediaFolder::Products, "productImage").await?;
    let err = product_service::update_product(
        &state,
        &common::admin(),
        product.id,
        ProductInput {
            price: Some("-5".into()),
            image: Some(rejected.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(!rejected.path.exists());
    assert!(old_path.exists());

    let rejected = common::store_image(&state, MediaFolder::Products, "productImage").await?;
    let err = product_service::update_product(
        &state,
        &common::admin(),
        product.id,
        ProductInput {
            collection: Some(Uuid::new_v4().to_string()),
            image: Some(rejected.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(!rejected.path.exists());
    assert!(old_path.exists());

    let replacement = common::store_image(&state, MediaFolder::Products, "productImage").await?;
    let updated = product_service::update_product(
        &state,
        &common::admin(),
        product.id,
        ProductInput {
            price: Some("6500".into()),
            collection: Some(bands.to_string()),
            image: Some(replacement.clone()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("updated product");
    assert_eq!(updated.price, 6500.0);
    assert_eq!(updated.name, "Gold Band");
    assert_eq!(updated.collection.id, bands);
    assert_eq!(updated.image_url, replacement.url);
    assert!(replacement.path.exists());
    assert!(!old_path.exists());

    product_service::delete_product(&state, &common::admin(), product.id).await?;
    Ok(())
}

#[tokio::test]
async fn collection_listing_without_paging_returns_every_product() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let rings = new_collection(&state, &common::unique("Rings")).await?;
    for _ in 0..23 {
        product_service::create_product(
            &state,
            &common::admin(),
            gold_band(&state, rings.to_string()).await?,
        )
        .await?;
    }

    let all = product_service::list_products(
        &state,
        ProductQuery {
            collection_id: Some(rings),
            page: None,
            per_page: None,
        },
    )
    .await?;
    assert_eq!(all.data.expect("products").items.len(), 23);
    assert_eq!(all.meta.and_then(|m| m.total), Some(23));

    let second_page = product_service::list_products(
        &state,
        ProductQuery {
            collection_id: Some(rings),
            page: Some(2),
            per_page: Some(20),
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(second_page.items.len(), 3);

    Ok(())
}
