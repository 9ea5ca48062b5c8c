// tests/thumbnail_tests.rs
mod common;

use common::*;
use image::{Rgb, RgbImage};
use storefront_core::models::ProductPatch;
use storefront_core::{CoreError, MediaRoot, ProductQuery};
use tempfile::TempDir;

fn media_with_image(width: u32, height: u32) -> (TempDir, MediaRoot) {
  let dir = tempfile::tempdir().unwrap();
  std::fs::create_dir_all(dir.path().join("products")).unwrap();
  RgbImage::from_pixel(width, height, Rgb([200, 30, 30]))
    .save(dir.path().join("products/source.png"))
    .unwrap();
  let media = MediaRoot::new(dir.path());
  (dir, media)
}

#[tokio::test]
async fn thumbnail_fits_the_bound_and_keeps_aspect_ratio() {
  let (dir, media) = media_with_image(400, 100);
  let h = harness_with_media(media);

  let mut input = product_input("Red Lamp", "19.99");
  input.image = Some("products/source.png".into());
  let product = h.catalog.create_product(input).await.unwrap();

  assert_eq!(product.thumbnail.as_deref(), Some("thumbnails/red-lamp_thumbnail.jpg"));
  let thumbnail = image::open(dir.path().join("thumbnails/red-lamp_thumbnail.jpg")).unwrap();
  assert_eq!((thumbnail.width(), thumbnail.height()), (200, 50));
}

#[tokio::test]
async fn small_images_are_not_upscaled() {
  let (dir, media) = media_with_image(120, 80);
  let h = harness_with_media(media);

  let mut input = product_input("Pin", "1.00");
  input.image = Some("products/source.png".into());
  h.catalog.create_product(input).await.unwrap();

  let thumbnail = image::open(dir.path().join("thumbnails/pin_thumbnail.jpg")).unwrap();
  assert_eq!((thumbnail.width(), thumbnail.height()), (120, 80));
}

#[tokio::test]
async fn products_without_an_image_have_no_thumbnail() {
  let h = harness();
  let product = h.catalog.create_product(product_input("Plain", "1.00")).await.unwrap();
  assert_eq!(product.thumbnail, None);
}

#[tokio::test]
async fn undecodable_images_fail_the_write() {
  let (dir, media) = media_with_image(10, 10);
  std::fs::write(dir.path().join("products/broken.png"), b"definitely not a png").unwrap();
  let h = harness_with_media(media);

  let mut input = product_input("Broken", "1.00");
  input.image = Some("products/broken.png".into());
  let err = h.catalog.create_product(input).await.unwrap_err();

  assert!(matches!(err, CoreError::Thumbnail(_)));
  assert_eq!(h.catalog.list_products(&ProductQuery::default(), None).await.unwrap().count, 0);
  assert!(!dir.path().join("thumbnails/broken_thumbnail.jpg").exists());
}

#[tokio::test]
async fn missing_images_fail_the_write() {
  let (_dir, media) = media_with_image(10, 10);
  let h = harness_with_media(media);

  let mut input = product_input("Ghost", "1.00");
  input.image = Some("products/missing.png".into());
  assert!(matches!(h.catalog.create_product(input).await, Err(CoreError::Thumbnail(_))));
}

#[tokio::test]
async fn unchanged_image_keeps_the_existing_thumbnail() {
  let (dir, media) = media_with_image(400, 400);
  let h = harness_with_media(media);

  let mut input = product_input("Chair", "50.00");
  input.image = Some("products/source.png".into());
  let chair = h.catalog.create_product(input.clone()).await.unwrap();

  std::fs::remove_file(dir.path().join("thumbnails/chair_thumbnail.jpg")).unwrap();
  input.price = dec("45.00");
  let updated = h.catalog.replace_product(chair.id, input).await.unwrap();

  assert_eq!(updated.thumbnail, chair.thumbnail);
  assert!(!dir.path().join("thumbnails/chair_thumbnail.jpg").exists());

  let mut cleared = product_input("Chair", "45.00");
  cleared.image = None;
  let cleared = h.catalog.replace_product(chair.id, cleared).await.unwrap();
  assert_eq!(cleared.thumbnail, None);
}

fn thumbnail_size(dir: &TempDir, relative: &str) -> (u32, u32) {
  image::image_dimensions(dir.path().join(relative)).unwrap()
}

fn thumbnail_dir_entries(dir: &TempDir) -> usize {
  std::fs::read_dir(dir.path().join("thumbnails")).unwrap().count()
}

#[tokio::test]
async fn failed_update_leaves_the_existing_thumbnail_in_place() {
  let (dir, media) = media_with_image(400, 400);
  RgbImage::from_pixel(400, 100, Rgb([30, 30, 200]))
    .save(dir.path().join("products/blue.png"))
    .unwrap();
  let h = harness_with_media(media);

  let mut input = product_input("Lamp", "30.00");
  input.image = Some("products/source.png".into());
  let lamp = h.catalog.create_product(input).await.unwrap();

  let patch: ProductPatch =
    serde_json::from_str(r#"{"image": "products/blue.png", "category_id": 999}"#).unwrap();
  let err = h.catalog.patch_product(lamp.id, patch).await.unwrap_err();

  assert!(matches!(err, CoreError::Validation(_)));
  let stored = h.catalog.get_product(lamp.id).await.unwrap();
  assert_eq!(stored.image.as_deref(), Some("products/source.png"));
  assert_eq!(thumbnail_size(&dir, "thumbnails/lamp_thumbnail.jpg"), (200, 200));
  assert_eq!(thumbnail_dir_entries(&dir), 1);
}

#[tokio::test]
async fn names_with_the_same_slug_cannot_share_a_thumbnail() {
  let (dir, media) = media_with_image(400, 100);
  RgbImage::from_pixel(100, 100, Rgb([30, 30, 200]))
    .save(dir.path().join("products/square.png"))
    .unwrap();
  let h = harness_with_media(media);

  let mut first = product_input("Red Wine", "12.00");
  first.image = Some("products/source.png".into());
  let first = h.catalog.create_product(first).await.unwrap();
  assert_eq!(first.thumbnail.as_deref(), Some("thumbnails/red-wine_thumbnail.jpg"));

  let mut second = product_input("red wine", "9.00");
  second.image = Some("products/square.png".into());
  let err = h.catalog.create_product(second).await.unwrap_err();
  assert!(matches!(err, CoreError::Conflict(_)));

  // Same collision through an update of an unrelated product.
  let other = h.catalog.create_product(product_input("red wine", "9.00")).await.unwrap();
  let patch: ProductPatch = serde_json::from_str(r#"{"image": "products/square.png"}"#).unwrap();
  assert!(matches!(h.catalog.patch_product(other.id, patch).await, Err(CoreError::Conflict(_))));

  assert_eq!(thumbnail_size(&dir, "thumbnails/red-wine_thumbnail.jpg"), (200, 50));
  assert_eq!(thumbnail_dir_entries(&dir), 1);
  assert_eq!(h.catalog.get_product(other.id).await.unwrap().thumbnail, None);
}
