//! Debug snapshots of a belief grid.

use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::debug;

use super::OccupancyGrid;
use crate::core::GridCoord;
use crate::error::Result;

const FREE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const OBSTACLE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

impl OccupancyGrid {
    /// Render to an RGB image: free white, obstacle blue, unknown black.
    /// Image row `y` is grid row `y`.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let cell = self.cell(GridCoord::new(x as i32, y as i32));
            if cell.is_obstacle() {
                OBSTACLE_COLOR
            } else if cell.is_free() {
                FREE_COLOR
            } else {
                UNKNOWN_COLOR
            }
        })
    }

    /// Write [`Self::to_image`] as a PNG file.
    pub fn save_to_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.to_image().save(path)?;
        debug!("Saved {}x{} grid to {}", self.width(), self.height(), path.display());
        Ok(())
    }
}
