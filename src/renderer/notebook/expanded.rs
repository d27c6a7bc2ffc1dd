//! Tiling of an unbounded notebook canvas
//!
//! Notebook pages can grow past their initial frame, so the canvas is cut
//! into fixed-size frames addressed by grid coordinates. Only the frames that
//! overlap the visible area are materialized.
//!
//! Grid y grows upward while document y grows downward: a frame one row
//! below the initial frame has grid y `-1`.

use std::sync::Arc;

use image::RgbaImage;

use crate::geometry::{Point, Rect, Size};
use crate::model::Orientation;

/// Grid coordinates of every frame overlapping the area, y inverted
pub fn visible_frame_coords(
    frame_width: u32,
    frame_height: u32,
    area_x: i32,
    area_y: i32,
    area_width: u32,
    area_height: u32,
) -> Vec<(i32, i32)> {
    if frame_width == 0 || frame_height == 0 {
        return Vec::new();
    }
    let (fw, fh) = (frame_width as i64, frame_height as i64);
    let (ax, ay) = (i64::from(area_x), i64::from(area_y));
    let (aw, ah) = (i64::from(area_width), i64::from(area_height));

    let start_x = ax.div_euclid(fw);
    let end_x = (ax + aw).div_euclid(fw);
    let start_y = ay.div_euclid(fh);
    let end_y = (ay + ah).div_euclid(fh);

    let mut visible = Vec::new();
    for frame_x in start_x..=end_x {
        for frame_y in start_y..=end_y {
            let left = frame_x * fw;
            let right = left + fw;
            let top = frame_y * fh;
            let bottom = top + fh;

            if right > ax && left < ax + aw && bottom > ay && top < ay + ah {
                // Rows whose flipped index leaves i32 cannot be addressed
                if let (Ok(x), Ok(y)) = (i32::try_from(frame_x), i32::try_from(-frame_y)) {
                    visible.push((x, y));
                }
            }
        }
    }
    visible
}

/// A materialized tile
#[derive(Clone, Debug)]
pub struct Frame {
    /// Factory arguments: `grid * frame size`, y still inverted
    pub initial: Point,
    /// Frame size in document units
    pub size: Size,
    pub image: Arc<RgbaImage>,
}

impl Frame {
    pub fn grid(&self) -> (i32, i32) {
        if self.size.is_empty() {
            return (0, 0);
        }
        (
            self.initial.x.div_euclid(self.size.width as i32),
            self.initial.y.div_euclid(self.size.height as i32),
        )
    }

    /// Top-left corner in document coordinates
    pub fn origin(&self) -> Point {
        Point::new(self.initial.x, -self.initial.y)
    }

    pub fn bounds(&self) -> Rect {
        let origin = self.origin();
        Rect::new(origin.x, origin.y, self.size.width, self.size.height)
    }
}

/// A notebook canvas that can materialize frames on demand
pub trait ExpandedNotebook {
    fn frame_width(&self) -> u32;

    fn frame_height(&self) -> u32;

    /// Materialize the frame whose grid position times the frame size is `(x, y)`
    fn frame_from_initial(&mut self, x: i32, y: i32) -> Frame;

    fn frame_size(&self) -> Size {
        Size::new(self.frame_width(), self.frame_height())
    }

    fn get_frames(&mut self, area: Rect) -> Vec<Frame> {
        let (fw, fh) = (self.frame_width(), self.frame_height());
        let coords = visible_frame_coords(fw, fh, area.x, area.y, area.width, area.height);
        log::trace!("Visible frames for {area:?}: {coords:?}");
        let (Ok(fw), Ok(fh)) = (i32::try_from(fw), i32::try_from(fh)) else {
            return Vec::new();
        };
        coords
            .into_iter()
            .filter_map(|(x, y)| Some(self.frame_from_initial(x.checked_mul(fw)?, y.checked_mul(fh)?)))
            .collect()
    }
}

/// Device page size for a notebook orientation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotebookSizeTracker {
    pub frame_width: u32,
    pub frame_height: u32,
}

impl NotebookSizeTracker {
    pub const PORTRAIT: Self = Self {
        frame_width: 1404,
        frame_height: 1872,
    };

    pub const LANDSCAPE: Self = Self {
        frame_width: 1872,
        frame_height: 1404,
    };

    pub fn for_orientation(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Landscape => Self::LANDSCAPE,
            Orientation::Portrait | Orientation::Unknown => Self::PORTRAIT,
        }
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.frame_width, self.frame_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut coords: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
        coords.sort_unstable();
        coords
    }

    #[test]
    fn square_viewport_over_four_frames() {
        let coords = visible_frame_coords(50, 50, 0, 0, 100, 100);
        assert_eq!(sorted(coords), vec![(0, -1), (0, 0), (1, -1), (1, 0)]);
    }

    #[test]
    fn edge_touching_frames_are_excluded() {
        assert_eq!(visible_frame_coords(50, 50, 0, 0, 50, 50), vec![(0, 0)]);
        assert_eq!(visible_frame_coords(50, 50, 0, 0, 51, 50), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn negative_areas_use_floor_division() {
        let coords = visible_frame_coords(50, 50, -10, -10, 20, 20);
        assert_eq!(sorted(coords), vec![(-1, 0), (-1, 1), (0, 0), (0, 1)]);
    }

    #[test]
    fn extreme_areas_skip_unaddressable_rows() {
        assert!(visible_frame_coords(1, 1, 0, i32::MIN, 1, 1).is_empty());
        assert_eq!(visible_frame_coords(1, 1, 0, i32::MIN, 1, 2), vec![(0, i32::MAX)]);
        assert_eq!(
            visible_frame_coords(1404, 1872, i32::MAX - 10, 0, 5, 5),
            vec![((i32::MAX - 10) / 1404, 0)]
        );
    }

    #[test]
    fn matches_brute_force_overlap() {
        let (fw, fh) = (30u32, 40u32);
        for (ax, ay, aw, ah) in [
            (0, 0, 10, 10),
            (-45, 17, 100, 61),
            (29, 39, 2, 2),
            (60, -80, 0, 40),
            (-7, -200, 95, 333),
        ] {
            let got = sorted(visible_frame_coords(fw, fh, ax, ay, aw, ah));
            let area = Rect::new(ax, ay, aw, ah);
            let mut expected = Vec::new();
            for gx in -20..20 {
                for gy in -20..20 {
                    let frame = Rect::new(gx * fw as i32, gy * fh as i32, fw, fh);
                    if frame.intersects(&area) {
                        expected.push((gx, -gy));
                    }
                }
            }
            assert_eq!(got, sorted(expected), "area {area:?}");
        }
    }

    struct CountingNotebook {
        calls: Vec<(i32, i32)>,
    }

    impl ExpandedNotebook for CountingNotebook {
        fn frame_width(&self) -> u32 {
            50
        }

        fn frame_height(&self) -> u32 {
            50
        }

        fn frame_from_initial(&mut self, x: i32, y: i32) -> Frame {
            self.calls.push((x, y));
            Frame {
                initial: Point::new(x, y),
                size: self.frame_size(),
                image: Arc::new(RgbaImage::new(1, 1)),
            }
        }
    }

    #[test]
    fn factory_receives_scaled_flipped_coordinates() {
        let mut notebook = CountingNotebook { calls: Vec::new() };
        let frames = notebook.get_frames(Rect::new(0, 0, 100, 100));
        assert_eq!(frames.len(), 4);
        assert_eq!(
            sorted(notebook.calls.clone()),
            vec![(0, -50), (0, 0), (50, -50), (50, 0)]
        );

        let below = frames.iter().find(|frame| frame.grid() == (0, -1)).unwrap();
        assert_eq!(below.origin(), Point::new(0, 50));
        assert_eq!(below.bounds(), Rect::new(0, 50, 50, 50));
    }

    #[test]
    fn tracker_sizes() {
        assert_eq!(
            NotebookSizeTracker::for_orientation(Orientation::Portrait).frame_size(),
            Size::new(1404, 1872)
        );
        let landscape = NotebookSizeTracker::for_orientation(Orientation::Landscape);
        assert_eq!(landscape.frame_size(), Size::new(1872, 1404));
    }
}
