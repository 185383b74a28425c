use core::time::Duration;

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{Circle, Line, Primitive, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
    Drawable,
};
use embedded_hal::delay::DelayNs;

use crate::{
    errors::{Axis, CalibrationError},
    RawSample, TouchSampler, TouchSurface,
};

/// Logical panel size, portrait, USB at the bottom.
pub const LOGICAL_WIDTH: u32 = 240;
pub const LOGICAL_HEIGHT: u32 = 320;

/// Where the two corner targets are drawn during calibration.
const TOP_LEFT_TARGET: Point = Point::new(10, 10);
const BOTTOM_RIGHT_TARGET: Point = Point::new(230, 310);

/// Raw-to-logical transform captured from two corner taps.
///
/// Bounds are axis-ordered (`min < max`); when the panel wiring runs
/// an axis against the logical direction, the corresponding `flip`
/// flag mirrors the rescale instead of storing reversed bounds.
/// Treat the fields as read-only and construct via [`from_corners`]
/// or [`from_bounds`].
///
/// [`from_corners`]: CalibrationMapping::from_corners
/// [`from_bounds`]: CalibrationMapping::from_bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationMapping {
    pub min_x: u16,
    pub max_x: u16,
    pub min_y: u16,
    pub max_y: u16,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl CalibrationMapping {
    /// Typical bounds for the board's stock resistive layer, used when
    /// no calibration has been captured. Accuracy is best-effort in
    /// that mode.
    pub const FALLBACK: CalibrationMapping = CalibrationMapping::from_bounds(300, 3800, 200, 3750);

    /// Builds a mapping from the nominal top-left and bottom-right
    /// corner taps.
    ///
    /// Either tap may carry the numerically larger reading: the
    /// sensor's native axis direction differs between panel revisions,
    /// so each axis is ordered here and mirrored on demand in
    /// [`map_to`](Self::map_to). Taps that coincide on an axis are
    /// rejected, since they would leave the rescale with a zero-width
    /// raw range.
    pub fn from_corners(
        top_left: RawSample,
        bottom_right: RawSample,
    ) -> Result<Self, CalibrationError> {
        if top_left.x == bottom_right.x {
            return Err(CalibrationError::DegenerateAxis(Axis::X));
        }
        if top_left.y == bottom_right.y {
            return Err(CalibrationError::DegenerateAxis(Axis::Y));
        }
        Ok(Self::from_bounds(
            top_left.x,
            bottom_right.x,
            top_left.y,
            bottom_right.y,
        ))
    }

    /// Const constructor taking bounds in tap order, as a previously
    /// generated configuration block stores them: a reversed pair
    /// means the axis runs against the logical direction.
    ///
    /// Panics (at const evaluation, for seeded values) on a degenerate
    /// pair.
    pub const fn from_bounds(min_x: u16, max_x: u16, min_y: u16, max_y: u16) -> Self {
        assert!(min_x != max_x, "degenerate X bounds");
        assert!(min_y != max_y, "degenerate Y bounds");
        let flip_x = min_x > max_x;
        let flip_y = min_y > max_y;
        let (min_x, max_x) = if flip_x { (max_x, min_x) } else { (min_x, max_x) };
        let (min_y, max_y) = if flip_y { (max_y, min_y) } else { (min_y, max_y) };
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            flip_x,
            flip_y,
        }
    }

    /// Rescales a raw reading into `region`, clamped to its inclusive
    /// bounds. Pure: same sample and mapping always give the same
    /// point.
    pub fn map_to(&self, sample: RawSample, region: &Rectangle) -> Point {
        let x = rescale(
            sample.x,
            self.min_x,
            self.max_x,
            self.flip_x,
            region.top_left.x,
            region.size.width,
        );
        let y = rescale(
            sample.y,
            self.min_y,
            self.max_y,
            self.flip_y,
            region.top_left.y,
            region.size.height,
        );
        Point::new(x, y)
    }

    /// Rescales into the full panel.
    pub fn map_to_screen(&self, sample: RawSample) -> Point {
        self.map_to(
            sample,
            &Rectangle::new(Point::zero(), Size::new(LOGICAL_WIDTH, LOGICAL_HEIGHT)),
        )
    }
}

/// Linear per-axis rescale with round-half-up, mirrored when the axis
/// is flipped. `range > 0` is guaranteed by the constructors.
fn rescale(raw: u16, min: u16, max: u16, flip: bool, origin: i32, extent: u32) -> i32 {
    let range = (max - min) as i32;
    let span = extent.max(1) as i32 - 1;
    let offset = (raw.clamp(min, max) - min) as i32;
    let mut scaled = (offset * span + range / 2) / range;
    if flip {
        scaled = span - scaled;
    }
    origin + scaled
}

impl<T> TouchSampler<T>
where
    T: TouchSurface,
{
    /// Takes over the screen for the two-point calibration sequence.
    ///
    /// Prompts for the top-left and bottom-right corners; overlapping
    /// taps are reported on screen and the sequence restarts. With a
    /// timeout, `Ok(None)` is returned if either tap never arrives.
    pub fn intrusive_calibration<DRAW, DELAY>(
        &mut self,
        dt: &mut DRAW,
        delay: &mut DELAY,
        timeout: Option<Duration>,
    ) -> Result<Option<CalibrationMapping>, T::Error>
    where
        DRAW: DrawTarget<Color = Rgb565>,
        DELAY: DelayNs,
    {
        let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);

        loop {
            let _ = dt.clear(Rgb565::BLACK);
            draw_corner_target(dt, &TOP_LEFT_TARGET);
            _ = Text::with_alignment("TOUCH HERE", Point::new(60, 24), style, Alignment::Center)
                .draw(dt);
            let Some(top_left) = self.wait_for_tap(delay, timeout)? else {
                return Ok(None);
            };

            let _ = dt.clear(Rgb565::BLACK);
            draw_corner_target(dt, &BOTTOM_RIGHT_TARGET);
            _ = Text::with_alignment("TOUCH HERE", Point::new(180, 300), style, Alignment::Center)
                .draw(dt);
            let Some(bottom_right) = self.wait_for_tap(delay, timeout)? else {
                return Ok(None);
            };

            match CalibrationMapping::from_corners(top_left, bottom_right) {
                Ok(mapping) => return Ok(Some(mapping)),
                Err(CalibrationError::DegenerateAxis(axis)) => {
                    let notice = match axis {
                        Axis::X => "Taps overlapped on X!\nTry again.",
                        Axis::Y => "Taps overlapped on Y!\nTry again.",
                    };
                    let _ = dt.clear(Rgb565::BLACK);
                    _ = Text::with_alignment(
                        notice,
                        Point::new(LOGICAL_WIDTH as i32 / 2, LOGICAL_HEIGHT as i32 / 2),
                        style,
                        Alignment::Center,
                    )
                    .draw(dt);
                    delay.delay_ms(1000);
                }
            }
        }
    }
}

fn draw_corner_target<DT: DrawTarget<Color = Rgb565>>(dt: &mut DT, p: &Point) {
    _ = Circle::with_center(*p, 11)
        .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
        .draw(dt);
    _ = Circle::with_center(*p, 17)
        .into_styled(PrimitiveStyle::with_stroke(Rgb565::WHITE, 1))
        .draw(dt);
    _ = Line::new(Point::new(p.x - 4, p.y), Point::new(p.x + 4, p.y))
        .into_styled(PrimitiveStyle::with_stroke(Rgb565::WHITE, 1))
        .draw(dt);
    _ = Line::new(Point::new(p.x, p.y - 4), Point::new(p.x, p.y + 4))
        .into_styled(PrimitiveStyle::with_stroke(Rgb565::WHITE, 1))
        .draw(dt);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(x: u16, y: u16) -> RawSample {
        RawSample {
            x,
            y,
            pressure: 1000,
        }
    }

    #[test]
    fn bounds_are_ordered_regardless_of_tap_order() {
        let pairs = [
            (raw(100, 200), raw(3900, 3800)),
            (raw(3900, 200), raw(100, 3800)),
            (raw(100, 3800), raw(3900, 200)),
            (raw(3900, 3800), raw(100, 200)),
        ];
        for (a, b) in pairs {
            let m = CalibrationMapping::from_corners(a, b).unwrap();
            assert!(m.min_x < m.max_x);
            assert!(m.min_y < m.max_y);
            assert_eq!((m.min_x, m.max_x), (100, 3900));
            assert_eq!((m.min_y, m.max_y), (200, 3800));
        }
    }

    #[test]
    fn reversed_panel_maps_corners_back_to_corners() {
        // A panel whose raw axes run against the logical directions:
        // the top-left tap reads high, the bottom-right tap reads low.
        let m = CalibrationMapping::from_corners(raw(3570, 3429), raw(544, 532)).unwrap();
        assert_eq!((m.min_x, m.max_x), (544, 3570));
        assert_eq!((m.min_y, m.max_y), (532, 3429));
        assert!(m.flip_x && m.flip_y);

        assert_eq!(m.map_to_screen(raw(3570, 3429)), Point::new(0, 0));
        assert_eq!(m.map_to_screen(raw(544, 532)), Point::new(239, 319));
    }

    #[test]
    fn straight_panel_maps_corners_back_to_corners() {
        let m = CalibrationMapping::from_corners(raw(300, 200), raw(3800, 3750)).unwrap();
        assert!(!m.flip_x && !m.flip_y);
        assert_eq!(m.map_to_screen(raw(300, 200)), Point::new(0, 0));
        assert_eq!(m.map_to_screen(raw(3800, 3750)), Point::new(239, 319));
    }

    #[test]
    fn coincident_taps_are_rejected_per_axis() {
        assert_eq!(
            CalibrationMapping::from_corners(raw(100, 100), raw(100, 100)),
            Err(CalibrationError::DegenerateAxis(Axis::X))
        );
        assert_eq!(
            CalibrationMapping::from_corners(raw(100, 500), raw(700, 500)),
            Err(CalibrationError::DegenerateAxis(Axis::Y))
        );
    }

    #[test]
    fn out_of_range_readings_pin_to_the_edges() {
        let m = CalibrationMapping::from_bounds(500, 3500, 400, 3600);
        assert_eq!(m.map_to_screen(raw(0, 0)), Point::new(0, 0));
        assert_eq!(m.map_to_screen(raw(4095, 4095)), Point::new(239, 319));
    }

    #[test]
    fn mapping_is_monotonic_per_axis() {
        let m = CalibrationMapping::from_bounds(300, 3800, 200, 3750);
        let mut last_x = i32::MIN;
        for x in (0..=4095).step_by(7) {
            let p = m.map_to_screen(raw(x, 2000));
            assert!(p.x >= last_x, "x regressed at raw {x}");
            assert!((0..240).contains(&p.x));
            last_x = p.x;
        }
    }

    #[test]
    fn mapping_is_pure() {
        let m = CalibrationMapping::from_bounds(300, 3800, 200, 3750);
        let s = raw(1234, 2345);
        assert_eq!(m.map_to_screen(s), m.map_to_screen(s));
    }

    #[test]
    fn rounds_to_nearest_pixel() {
        // Raw 600 sits exactly halfway across a 1000-count range;
        // half-up rounding lands on 120 of the 0..=239 span.
        let m = CalibrationMapping::from_bounds(100, 1100, 100, 1100);
        assert_eq!(m.map_to_screen(raw(600, 100)).x, 120);
    }

    #[test]
    fn maps_into_a_sub_region() {
        // Reserve a 40-px header band: all output stays below it.
        let region = Rectangle::new(Point::new(0, 40), Size::new(240, 280));
        let m = CalibrationMapping::from_bounds(300, 3800, 200, 3750);
        assert_eq!(m.map_to(raw(300, 200), &region), Point::new(0, 40));
        assert_eq!(m.map_to(raw(3800, 3750), &region), Point::new(239, 319));
    }

    #[test]
    fn seeded_bounds_keep_the_generated_block_encoding() {
        // A generated block stores a flipped axis as a reversed pair.
        let seeded = CalibrationMapping::from_bounds(3570, 544, 3429, 532);
        let captured =
            CalibrationMapping::from_corners(raw(3570, 3429), raw(544, 532)).unwrap();
        assert_eq!(seeded, captured);
    }

    #[test]
    fn fallback_covers_the_panel() {
        let m = CalibrationMapping::FALLBACK;
        assert_eq!(m.map_to_screen(raw(300, 200)), Point::new(0, 0));
        assert_eq!(m.map_to_screen(raw(3800, 3750)), Point::new(239, 319));
    }
}
