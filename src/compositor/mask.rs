// SPDX-License-Identifier: GPL-3.0-only

//! Mask catalog and asset loading

use crate::constants::mask::{DEFAULT_MASK, PLACEHOLDER_SIZE, RASTER_SIZE};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use resvg::{tiny_skia, usvg};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Masks that can be drawn over a face, as `(id, artwork file stem)`
pub const MASKS: &[(&str, &str)] = &[
    ("popcat", "Popcat"),
    ("dogecoin", "Dogecoin"),
    ("jupiter", "Jupiter"),
    ("memecoin", "Memecoin"),
    ("metamask", "MetaMask"),
    ("optimism", "Optimism"),
    ("orca", "Orca"),
];

/// Mask ids in catalog order
pub fn mask_ids() -> impl Iterator<Item = &'static str> {
    MASKS.iter().map(|(id, _)| *id)
}

/// How a mask image was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Decoded from the mask directory
    Loaded,
    /// File missing or unreadable, generated stand-in
    Placeholder,
}

/// A decoded mask image
#[derive(Debug)]
pub struct MaskAsset {
    pub id: String,
    pub image: RgbaImage,
    pub state: LoadState,
}

impl MaskAsset {
    /// Generated stand-in: a filled disc with a darker rim
    pub fn placeholder(id: impl Into<String>) -> Self {
        let size = PLACEHOLDER_SIZE;
        let center = size as f32 / 2.0;
        let radius = center - 1.0;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > radius {
                Rgba([0, 0, 0, 0])
            } else if dist > radius * 0.9 {
                Rgba([196, 140, 0, 255])
            } else {
                Rgba([255, 205, 40, 255])
            }
        });
        Self {
            id: id.into(),
            image,
            state: LoadState::Placeholder,
        }
    }

    /// Wrap an already decoded image
    pub fn from_image(id: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: id.into(),
            image,
            state: LoadState::Loaded,
        }
    }
}

/// Catalog id for `id`, if it names a mask
fn catalog_entry(id: &str) -> Option<(&'static str, &'static str)> {
    let id = id.trim().to_ascii_lowercase();
    MASKS.iter().copied().find(|(known, _)| *known == id)
}

/// True if `id` names a mask
pub fn is_known(id: &str) -> bool {
    catalog_entry(id).is_some()
}

/// Files tried for a mask, in order: the SVG artwork, then a PNG raster
pub fn mask_file_candidates(id: &str) -> Vec<String> {
    match catalog_entry(id) {
        Some((id, stem)) => vec![format!("{}.svg", stem), format!("{}.png", id)],
        None => Vec::new(),
    }
}

/// Rasterize SVG data so its longer side is `size` pixels
pub fn rasterize_svg(data: &[u8], size: u32) -> Result<RgbaImage, String> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).map_err(|e| e.to_string())?;
    let view = tree.size();
    let scale = size as f32 / view.width().max(view.height());
    let width = ((view.width() * scale).round() as u32).max(1);
    let height = ((view.height() * scale).round() as u32).max(1);

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| format!("invalid raster size {}x{}", width, height))?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    // tiny-skia stores premultiplied alpha
    let mut image = RgbaImage::new(width, height);
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(image)
}

/// Decode one mask file
fn load_file(path: &Path) -> Result<RgbaImage, String> {
    let is_svg = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        let data = std::fs::read(path).map_err(|e| e.to_string())?;
        rasterize_svg(&data, RASTER_SIZE)
    } else {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| e.to_string())
    }
}

/// Loads and caches mask images from a directory
#[derive(Debug)]
pub struct MaskCatalog {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<MaskAsset>>>,
}

impl MaskCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The mask shown before the user picks one
    pub fn default_mask(&self) -> Arc<MaskAsset> {
        self.load(DEFAULT_MASK)
    }

    /// Load a mask by id
    ///
    /// Unknown ids resolve to the default mask. When no artwork file decodes,
    /// a placeholder is used so the overlay still renders.
    pub fn load(&self, id: &str) -> Arc<MaskAsset> {
        let id = match catalog_entry(id) {
            Some((known, _)) => known,
            None => {
                warn!(mask = id, fallback = DEFAULT_MASK, "Unknown mask");
                DEFAULT_MASK
            }
        };

        if let Some(asset) = self.cache.lock().get(id) {
            return Arc::clone(asset);
        }

        let loaded = mask_file_candidates(id).into_iter().find_map(|name| {
            let path = self.dir.join(name);
            match load_file(&path) {
                Ok(image) => {
                    info!(mask = %id, path = %path.display(), "Mask loaded");
                    Some(image)
                }
                Err(e) => {
                    debug!(mask = %id, path = %path.display(), error = %e, "Mask file skipped");
                    None
                }
            }
        });
        let asset = Arc::new(match loaded {
            Some(image) => MaskAsset::from_image(id, image),
            None => {
                debug!(mask = %id, "Using placeholder mask");
                MaskAsset::placeholder(id)
            }
        });

        self.cache.lock().insert(id.to_string(), Arc::clone(&asset));
        asset
    }
}
