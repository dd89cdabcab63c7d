//! Rendering outputs and the interactive viewer seam.

use ndarray::{s, Array4, ArrayD};
use simbatch_core::{Result, SimError};

use crate::scene::Scene;

/// An interactive viewer driven by `render()` in human mode.
pub trait Viewer: Send {
    /// Bind to a freshly built scene.
    fn bind(&mut self, scene: &Scene);

    /// Drop any reference to the current scene before it is torn down.
    fn unbind(&mut self);

    /// Draw the current state.
    fn draw(&mut self, scene: &Scene) -> Result<()>;
}

/// What `render()` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    /// The attached viewer was refreshed.
    Displayed,
    /// Tiled RGB images, `(N, H, W, 3)` batched or `(H, W, 3)` on the
    /// single-instance device.
    Image(ArrayD<u8>),
}

impl RenderOutput {
    pub fn image(&self) -> Option<&ArrayD<u8>> {
        match self {
            RenderOutput::Image(img) => Some(img),
            RenderOutput::Displayed => None,
        }
    }
}

/// Tile per-camera image batches into one image per instance.
///
/// Images are laid out row-major on a grid with `ceil(sqrt(k))` columns.
/// Every cell is sized to the largest input; smaller images are padded with
/// black. All inputs must share the batch size and channel count.
pub fn tile_images(images: &[Array4<u8>]) -> Result<Array4<u8>> {
    let first = images
        .first()
        .ok_or_else(|| SimError::contract("render", "no images to tile"))?;
    let (n, _, _, c) = first.dim();
    if let Some(bad) = images.iter().find(|img| img.dim().0 != n || img.dim().3 != c) {
        return Err(SimError::shape("tiled image", &[n, 0, 0, c], bad.shape()));
    }
    if images.len() == 1 {
        return Ok(first.clone());
    }

    let cell_h = images.iter().map(|img| img.dim().1).max().unwrap_or(0);
    let cell_w = images.iter().map(|img| img.dim().2).max().unwrap_or(0);
    let cols = (images.len() as f32).sqrt().ceil() as usize;
    let grid_rows = (images.len() + cols - 1) / cols;

    let mut out = Array4::zeros((n, grid_rows * cell_h, cols * cell_w, c));
    for (k, img) in images.iter().enumerate() {
        let (_, h, w, _) = img.dim();
        let y = (k / cols) * cell_h;
        let x = (k % cols) * cell_w;
        out.slice_mut(s![.., y..y + h, x..x + w, ..]).assign(img);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_image_untouched() {
        let img = Array4::from_elem((2, 3, 4, 3), 7u8);
        assert_eq!(tile_images(&[img.clone()]).unwrap(), img);
    }

    #[test]
    fn test_three_images_on_two_by_two_grid() {
        let a = Array4::from_elem((1, 2, 2, 3), 1u8);
        let b = Array4::from_elem((1, 2, 3, 3), 2u8);
        let c = Array4::from_elem((1, 1, 1, 3), 3u8);
        let tiled = tile_images(&[a, b, c]).unwrap();
        assert_eq!(tiled.dim(), (1, 4, 6, 3));
        assert_eq!(tiled[[0, 0, 0, 0]], 1);
        assert_eq!(tiled[[0, 0, 3, 0]], 2);
        assert_eq!(tiled[[0, 2, 0, 0]], 3);
        assert_eq!(tiled[[0, 3, 5, 0]], 0);
    }

    #[test]
    fn test_mismatched_batch_rejected() {
        let a = Array4::<u8>::zeros((1, 2, 2, 3));
        let b = Array4::<u8>::zeros((2, 2, 2, 3));
        assert!(tile_images(&[a, b]).is_err());
        assert!(tile_images(&[]).is_err());
    }
}
