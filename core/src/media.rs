// storefront_core/src/media.rs

//! Product media on the local filesystem and thumbnail derivation.

use std::path::{Component, Path, PathBuf};

use image::{imageops::FilterType, ImageFormat};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Thumbnails fit inside a square of this many pixels.
pub const THUMBNAIL_BOUND: u32 = 200;
pub const THUMBNAIL_DIR: &str = "thumbnails";

#[derive(Debug, Clone)]
pub struct MediaRoot {
  root: PathBuf,
}

impl MediaRoot {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Resolves a stored media path, refusing anything that escapes the root.
  pub fn resolve(&self, relative: &str) -> CoreResult<PathBuf> {
    let candidate = Path::new(relative);
    let safe = !relative.is_empty()
      && candidate
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !safe {
      return Err(CoreError::Validation(format!("Invalid media path '{}'.", relative)));
    }
    Ok(self.root.join(candidate))
  }

  /// Renders the thumbnail for `image` next to its final location.
  ///
  /// Nothing at the final path changes until the returned handle is committed.
  /// Fails (and leaves no file behind) when the source is missing or cannot be
  /// decoded.
  #[instrument(name = "media::derive_thumbnail", skip(self))]
  pub async fn derive_thumbnail(&self, image: &str, product_name: &str) -> CoreResult<StagedThumbnail> {
    let source = self.resolve(image)?;
    let relative = thumbnail_path(product_name);
    let target = self.root.join(&relative);
    let staged = target.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

    let render_to = staged.clone();
    let rendered = tokio::task::spawn_blocking(move || render_thumbnail(&source, &render_to))
      .await
      .map_err(|e| CoreError::Internal(format!("Thumbnail task failed: {}", e)))?;
    if let Err(err) = rendered {
      remove_staged(&staged).await;
      return Err(err);
    }

    debug!(thumbnail = %relative, "Thumbnail staged.");
    Ok(StagedThumbnail { relative, staged, target })
  }
}

/// A rendered thumbnail waiting for the product write that references it.
#[derive(Debug)]
#[must_use = "a staged thumbnail must be committed or discarded"]
pub struct StagedThumbnail {
  relative: String,
  staged: PathBuf,
  target: PathBuf,
}

impl StagedThumbnail {
  /// Stored path the thumbnail will have once committed.
  pub fn path(&self) -> &str {
    &self.relative
  }

  /// Moves the rendered file over the final path.
  pub async fn commit(self) -> CoreResult<String> {
    if let Err(e) = tokio::fs::rename(&self.staged, &self.target).await {
      remove_staged(&self.staged).await;
      return Err(CoreError::Thumbnail(format!("Could not write {}: {}", self.target.display(), e)));
    }
    info!(thumbnail = %self.relative, "Thumbnail derived.");
    Ok(self.relative)
  }

  pub async fn discard(self) {
    remove_staged(&self.staged).await;
  }
}

async fn remove_staged(staged: &Path) {
  match tokio::fs::remove_file(staged).await {
    Ok(()) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => warn!(path = %staged.display(), error = %e, "Could not remove staged thumbnail."),
  }
}

/// Deterministic stored path of a product's thumbnail.
pub fn thumbnail_path(product_name: &str) -> String {
  format!("{}/{}_thumbnail.jpg", THUMBNAIL_DIR, slugify(product_name))
}

fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut pending_dash = false;
  for ch in name.chars() {
    if ch.is_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.extend(ch.to_lowercase());
    } else {
      pending_dash = true;
    }
  }
  if slug.is_empty() {
    slug.push_str("product");
  }
  slug
}

fn render_thumbnail(source: &Path, target: &Path) -> CoreResult<()> {
  if !source.is_file() {
    return Err(CoreError::Thumbnail(format!("Source image {} does not exist.", source.display())));
  }
  let decoded = image::open(source).map_err(|e| {
    warn!(source = %source.display(), error = %e, "Could not decode source image.");
    CoreError::Thumbnail(format!("Could not decode {}: {}", source.display(), e))
  })?;

  // Never upscale: images already inside the bound are only re-encoded.
  let bounded = if decoded.width() > THUMBNAIL_BOUND || decoded.height() > THUMBNAIL_BOUND {
    decoded.resize(THUMBNAIL_BOUND, THUMBNAIL_BOUND, FilterType::Lanczos3)
  } else {
    decoded
  };

  if let Some(parent) = target.parent() {
    std::fs::create_dir_all(parent).map_err(|e| CoreError::Thumbnail(e.to_string()))?;
  }
  bounded
    .to_rgb8()
    .save_with_format(target, ImageFormat::Jpeg)
    .map_err(|e| CoreError::Thumbnail(format!("Could not write {}: {}", target.display(), e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn thumbnail_names_are_slugged_from_product_name() {
    assert_eq!(thumbnail_path("Red Wine 0.75L"), "thumbnails/red-wine-0-75l_thumbnail.jpg");
    assert_eq!(thumbnail_path("  !!  "), "thumbnails/product_thumbnail.jpg");
  }

  #[test]
  fn media_paths_cannot_escape_the_root() {
    let media = MediaRoot::new("/srv/media");
    assert!(media.resolve("products/a.png").is_ok());
    assert!(media.resolve("../etc/passwd").is_err());
    assert!(media.resolve("/etc/passwd").is_err());
    assert!(media.resolve("").is_err());
  }

  #[tokio::test]
  async fn staged_thumbnails_only_replace_the_final_file_on_commit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("products")).unwrap();
    image::RgbImage::new(300, 300).save(dir.path().join("products/a.png")).unwrap();
    let media = MediaRoot::new(dir.path());
    let target = dir.path().join("thumbnails/lamp_thumbnail.jpg");

    let discarded = media.derive_thumbnail("products/a.png", "Lamp").await.unwrap();
    assert!(!target.exists());
    discarded.discard().await;
    assert_eq!(std::fs::read_dir(dir.path().join("thumbnails")).unwrap().count(), 0);

    let staged = media.derive_thumbnail("products/a.png", "Lamp").await.unwrap();
    assert_eq!(staged.path(), "thumbnails/lamp_thumbnail.jpg");
    assert_eq!(staged.commit().await.unwrap(), "thumbnails/lamp_thumbnail.jpg");
    assert_eq!(image::image_dimensions(&target).unwrap(), (200, 200));
    assert_eq!(std::fs::read_dir(dir.path().join("thumbnails")).unwrap().count(), 1);
  }
}
