//! Ground-truth world.
//!
//! Built either from rectangles in the scenario file or from a grayscale
//! bitmap where dark pixels are walls.

use std::path::Path;

use image::GrayImage;

use crate::config::{EnvironmentConfig, WallConfig};
use crate::core::GridCoord;
use crate::error::{Result, SanghaError};
use crate::grid::OccupancyGrid;

/// Pixels darker than this are walls.
const WALL_THRESHOLD: u8 = 128;

/// Static wall layout of the simulated world.
#[derive(Clone, Debug)]
pub struct Environment {
    width: usize,
    height: usize,
    walls: Vec<bool>,
}

impl Environment {
    /// Open world without walls.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            walls: vec![false; width * height],
        }
    }

    /// Build from a scenario's environment section.
    pub fn from_config(config: &EnvironmentConfig) -> Result<Self> {
        let mut env = match &config.image {
            Some(path) => Self::load_image(path)?,
            None => Self::new(config.width, config.height),
        };
        for wall in &config.walls {
            env.add_wall(wall);
        }
        if config.border {
            env.add_border();
        }
        Ok(env)
    }

    /// Load walls from a bitmap; one pixel per cell, row 0 at the top.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| {
                SanghaError::Config(format!(
                    "Failed to load environment image {}: {}",
                    path.display(),
                    e
                ))
            })?
            .into_luma8();
        Ok(Self::from_image(&img))
    }

    pub fn from_image(img: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut env = Self::new(width, height);
        for (px, py, pixel) in img.enumerate_pixels() {
            if pixel.0[0] < WALL_THRESHOLD {
                // Image rows run top-down, grid rows bottom-up
                let y = height - 1 - py as usize;
                env.walls[y * width + px as usize] = true;
            }
        }
        env
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, c: GridCoord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            return None;
        }
        Some(c.y as usize * self.width + c.x as usize)
    }

    pub fn add_wall(&mut self, wall: &WallConfig) {
        for y in wall.y..wall.y + wall.height {
            for x in wall.x..wall.x + wall.width {
                if let Some(i) = self.index(GridCoord::new(x, y)) {
                    self.walls[i] = true;
                }
            }
        }
    }

    /// One-cell wall around the edge.
    pub fn add_border(&mut self) {
        let (w, h) = (self.width as i32, self.height as i32);
        self.add_wall(&WallConfig { x: 0, y: 0, width: w, height: 1 });
        self.add_wall(&WallConfig { x: 0, y: h - 1, width: w, height: 1 });
        self.add_wall(&WallConfig { x: 0, y: 0, width: 1, height: h });
        self.add_wall(&WallConfig { x: w - 1, y: 0, width: 1, height: h });
    }

    /// Wall at `c`. Outside the world counts as wall.
    pub fn is_wall(&self, c: GridCoord) -> bool {
        self.index(c).is_none_or(|i| self.walls[i])
    }

    /// Number of cells that are not walls.
    pub fn total_free(&self) -> usize {
        self.walls.iter().filter(|&&w| !w).count()
    }

    /// Fully known belief grid of the world, for move validation and links.
    pub fn to_occupancy_grid(&self) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(self.width, self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let c = GridCoord::new(x, y);
                if self.is_wall(c) {
                    grid.set_obstacle_at(c);
                } else {
                    grid.set_free_space_at(c);
                }
            }
        }
        grid
    }

    /// Fail if `c` cannot host an agent.
    pub fn check_placement(&self, what: &str, c: GridCoord) -> Result<()> {
        if self.is_wall(c) {
            return Err(SanghaError::Scenario(format!("{} placed inside a wall at {}", what, c)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_border_and_walls() {
        let mut env = Environment::new(10, 8);
        env.add_border();
        env.add_wall(&WallConfig { x: 4, y: 1, width: 1, height: 3 });

        assert!(env.is_wall(GridCoord::new(0, 3)));
        assert!(env.is_wall(GridCoord::new(9, 7)));
        assert!(env.is_wall(GridCoord::new(4, 2)));
        assert!(!env.is_wall(GridCoord::new(4, 4)));
        assert!(env.is_wall(GridCoord::new(-1, 2)));
        // 8 x 6 interior minus 3 wall cells
        assert_eq!(env.total_free(), 45);
    }

    #[test]
    fn test_truth_grid() {
        let mut env = Environment::new(5, 5);
        env.add_border();
        let grid = env.to_occupancy_grid();
        assert_eq!(grid.num_free_cells(), env.total_free());
        assert!(grid.obstacle_at(GridCoord::new(0, 0)));
        assert!(grid.free_space_at(GridCoord::new(2, 2)));
    }

    #[test]
    fn test_image_rows_flip() {
        let mut img = GrayImage::from_pixel(4, 3, Luma([255]));
        // Top-left pixel becomes the top row of the grid
        img.put_pixel(0, 0, Luma([0]));
        let env = Environment::from_image(&img);
        assert_eq!((env.width(), env.height()), (4, 3));
        assert!(env.is_wall(GridCoord::new(0, 2)));
        assert!(!env.is_wall(GridCoord::new(0, 0)));
    }

    #[test]
    fn test_load_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.png");
        let mut img = GrayImage::from_pixel(6, 6, Luma([255]));
        img.put_pixel(3, 3, Luma([10]));
        img.save(&path).unwrap();

        let env = Environment::load_image(&path).unwrap();
        assert_eq!(env.total_free(), 35);
        assert!(Environment::load_image(dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_placement_check() {
        let mut env = Environment::new(6, 6);
        env.add_border();
        assert!(env.check_placement("base", GridCoord::new(2, 2)).is_ok());
        assert!(matches!(
            env.check_placement("robot 1", GridCoord::new(0, 2)),
            Err(SanghaError::Scenario(_))
        ));
    }
}
