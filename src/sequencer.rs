use core::fmt;
use core::time::Duration;

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{Line, Primitive, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
};
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use strum::VariantArray;
use xpt2046::{
    CalibrationMapping, RawSample, TouchSampler, TouchSurface, LOGICAL_HEIGHT, LOGICAL_WIDTH,
};

const W: i32 = LOGICAL_WIDTH as i32;
const H: i32 = LOGICAL_HEIGHT as i32;

/// Logical x of the left/right split in choice prompts. The boundary
/// pixel belongs to the right half.
const MIDLINE_X: i32 = W / 2;

/// SPI clock candidates swept by the pixel-clock stage, ascending.
const PIXEL_CLOCK_CANDIDATES_MHZ: [u32; 6] = [10, 20, 27, 40, 55, 80];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::VariantArray,
)]
pub enum StageId {
    #[strum(to_string = "Touch Calibration")]
    Calibrate,
    #[strum(to_string = "Panel Variant")]
    PanelVariant,
    #[strum(to_string = "Color Polarity")]
    ColorPolarity,
    #[strum(to_string = "Display Pattern")]
    DisplayPattern,
    #[strum(to_string = "Indicator LED")]
    IndicatorLed,
    #[strum(to_string = "Memory")]
    Memory,
    #[strum(to_string = "Pixel Clock")]
    PixelClock,
    #[strum(to_string = "WiFi Scan")]
    WifiScan,
    #[strum(to_string = "SD Card")]
    SdCard,
    #[strum(to_string = "Report")]
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Automatic,
    Interactive,
}

impl StageId {
    pub fn kind(self) -> StageKind {
        match self {
            StageId::Calibrate
            | StageId::PanelVariant
            | StageId::ColorPolarity
            | StageId::IndicatorLed => StageKind::Interactive,
            _ => StageKind::Automatic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PanelVariant {
    #[strum(to_string = "ILI9341")]
    Ili9341,
    #[strum(to_string = "ST7789")]
    St7789,
}

impl PanelVariant {
    /// Highest SPI clock the controller revision is driven at here.
    /// The ST7789 boards tolerate 55 MHz; the ILI9341 ones top out at
    /// 40.
    pub fn max_pixel_clock_mhz(self) -> u32 {
        match self {
            PanelVariant::Ili9341 => 40,
            PanelVariant::St7789 => 55,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ColorMode {
    #[strum(to_string = "normal colors")]
    Normal,
    #[strum(to_string = "inverted colors")]
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A usable mapping was captured (or seeded from config).
    Calibrated,
    /// No mapping was captured; later taps use the stock bounds.
    DefaultBounds,
    Variant(PanelVariant),
    Polarity(ColorMode),
    Passed,
    Failed,
    FreeHeapKb(u32),
    PixelClockMhz(u32),
    Networks(u16),
    CardSizeMb(u32),
    /// Interactive stage timed out with no gesture.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Calibrated => f.write_str("calibrated"),
            Outcome::DefaultBounds => f.write_str("default bounds (uncalibrated)"),
            Outcome::Variant(v) => write!(f, "{v}"),
            Outcome::Polarity(p) => write!(f, "{p}"),
            Outcome::Passed => f.write_str("pass"),
            Outcome::Failed => f.write_str("fail"),
            Outcome::FreeHeapKb(kb) => write!(f, "{kb} KB free"),
            Outcome::PixelClockMhz(mhz) => write!(f, "{mhz} MHz"),
            Outcome::Networks(n) => write!(f, "{n} networks"),
            Outcome::CardSizeMb(mb) => write!(f, "{mb} MB"),
            Outcome::Skipped => f.write_str("skipped (no input)"),
        }
    }
}

/// Stage-keyed outcome accumulator. Entries are write-once; later
/// stages read earlier outcomes but never overwrite them.
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: Vec<(StageId, Outcome)>,
}

impl ResultSet {
    pub fn record(&mut self, stage: StageId, outcome: Outcome) {
        if self.get(stage).is_some() {
            warn!("{stage} already recorded, keeping the first outcome");
            return;
        }
        self.entries.push((stage, outcome));
    }

    pub fn get(&self, stage: StageId) -> Option<Outcome> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, o)| *o)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(StageId, Outcome)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub free_heap: u32,
    pub min_free_heap: u32,
    pub free_psram: u32,
}

#[derive(Debug, Clone)]
pub struct NetworkHit {
    pub ssid: String,
    pub rssi: i8,
}

/// Everything the sequencer needs from the board besides touch input:
/// a draw surface plus thin probe wrappers over the hardware
/// abstraction layers.
pub trait Board: DrawTarget<Color = Rgb565> {
    /// Applies the polarity the operator chose to the live panel.
    fn set_color_mode(&mut self, mode: ColorMode);
    /// Cycles the indicator LED red, green, blue.
    fn blink_indicator(&mut self) -> anyhow::Result<()>;
    fn memory_stats(&mut self) -> MemoryStats;
    fn scan_networks(&mut self) -> anyhow::Result<Vec<NetworkHit>>;
    /// Mounts the card and returns the volume size in MB.
    fn probe_storage(&mut self) -> anyhow::Result<u32>;
}

/// Ordered, strictly sequential test runner. One stage executes at a
/// time and owns the display and touch surface while it does; its
/// outcome is committed before the cursor advances. No stage is ever
/// retried, and the run always reaches the report stage with whatever
/// partial results were gathered.
pub struct Sequencer<B, T, D>
where
    B: Board,
    T: TouchSurface,
    D: DelayNs,
{
    board: B,
    sampler: TouchSampler<T>,
    delay: D,
    mapping: Option<CalibrationMapping>,
    results: ResultSet,
    cursor: usize,
    stage_timeout: Option<Duration>,
}

impl<B, T, D> Sequencer<B, T, D>
where
    B: Board,
    T: TouchSurface,
    T::Error: fmt::Debug,
    D: DelayNs,
{
    pub fn new(
        board: B,
        sampler: TouchSampler<T>,
        delay: D,
        seeded_mapping: Option<CalibrationMapping>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            board,
            sampler,
            delay,
            mapping: seeded_mapping,
            results: ResultSet::default(),
            cursor: 0,
            stage_timeout,
        }
    }

    /// Runs every stage in order, front to back.
    pub fn run(&mut self) {
        while let Some(&stage) = StageId::VARIANTS.get(self.cursor) {
            info!(
                "[{}/{}] {} ({:?})",
                self.cursor + 1,
                StageId::VARIANTS.len(),
                stage,
                stage.kind()
            );
            let outcome = self.execute(stage);
            info!("{stage}: {outcome}");
            self.results.record(stage, outcome);
            self.cursor += 1;
        }
    }

    /// Hands everything back for the report and the post-test loop.
    pub fn into_parts(self) -> (ResultSet, Option<CalibrationMapping>, B, TouchSampler<T>) {
        (self.results, self.mapping, self.board, self.sampler)
    }

    fn execute(&mut self, stage: StageId) -> Outcome {
        match stage {
            StageId::Calibrate => self.calibrate(),
            StageId::PanelVariant => self.detect_variant(),
            StageId::ColorPolarity => self.detect_polarity(),
            StageId::DisplayPattern => self.display_pattern(),
            StageId::IndicatorLed => self.indicator(),
            StageId::Memory => self.memory(),
            StageId::PixelClock => self.pixel_clock(),
            StageId::WifiScan => self.wifi_scan(),
            StageId::SdCard => self.sd_card(),
            StageId::Report => self.completion_screen(),
        }
    }

    // --- stages ---

    fn calibrate(&mut self) -> Outcome {
        if self.mapping.is_some() {
            self.clear();
            self.centered("Skipping Calibration", 160);
            self.centered("(Config Found)", 180);
            self.delay.delay_ms(1500);
            return Outcome::Calibrated;
        }

        self.clear();
        self.headline("Touch Calibration", 160);
        self.delay.delay_ms(1000);

        match self
            .sampler
            .intrusive_calibration(&mut self.board, &mut self.delay, self.stage_timeout)
        {
            Ok(Some(mapping)) => {
                info!("captured mapping: {mapping:?}");
                self.mapping = Some(mapping);
                self.clear();
                self.centered("Calibration Complete!", 160);
                self.delay.delay_ms(1000);
                Outcome::Calibrated
            }
            Ok(None) => {
                warn!("calibration timed out, continuing with default bounds");
                Outcome::DefaultBounds
            }
            Err(e) => {
                error!("calibration aborted: {e:?}");
                Outcome::DefaultBounds
            }
        }
    }

    fn detect_variant(&mut self) -> Outcome {
        let Some(variant) = self.binary_choice(
            "Panel Variant",
            "Which USB ports does\nthis board have?",
            None,
            ("Micro USB\nonly\n\nILI9341", PanelVariant::Ili9341),
            ("Micro USB\n+ USB-C\n\nST7789", PanelVariant::St7789),
        ) else {
            return Outcome::Skipped;
        };
        Outcome::Variant(variant)
    }

    fn detect_polarity(&mut self) -> Outcome {
        let Some(mode) = self.binary_choice(
            "Color Check",
            "Tap the color you\nsee in the box",
            Some(Rgb565::RED),
            ("RED", ColorMode::Normal),
            ("CYAN", ColorMode::Inverted),
        ) else {
            return Outcome::Skipped;
        };
        self.board.set_color_mode(mode);
        Outcome::Polarity(mode)
    }

    fn display_pattern(&mut self) -> Outcome {
        for color in [Rgb565::RED, Rgb565::GREEN, Rgb565::BLUE, Rgb565::WHITE] {
            _ = self.board.clear(color);
            self.delay.delay_ms(500);
        }

        self.clear();
        let grid = PrimitiveStyle::with_stroke(Rgb565::new(8, 16, 8), 1);
        for y in (0..H).step_by(20) {
            _ = Line::new(Point::new(0, y), Point::new(W - 1, y))
                .into_styled(grid)
                .draw(&mut self.board);
        }
        for x in (0..W).step_by(20) {
            _ = Line::new(Point::new(x, 0), Point::new(x, H - 1))
                .into_styled(grid)
                .draw(&mut self.board);
        }
        _ = Rectangle::new(Point::zero(), Size::new(W as u32, H as u32))
            .into_styled(PrimitiveStyle::with_stroke(Rgb565::RED, 1))
            .draw(&mut self.board);
        let diagonal = PrimitiveStyle::with_stroke(Rgb565::GREEN, 1);
        _ = Line::new(Point::zero(), Point::new(W - 1, H - 1))
            .into_styled(diagonal)
            .draw(&mut self.board);
        _ = Line::new(Point::new(W - 1, 0), Point::new(0, H - 1))
            .into_styled(diagonal)
            .draw(&mut self.board);

        self.centered("Display Test OK", 160);
        self.delay.delay_ms(1000);
        Outcome::Passed
    }

    fn indicator(&mut self) -> Outcome {
        self.clear();
        self.centered("Watch the LED...", 160);
        if let Err(e) = self.board.blink_indicator() {
            error!("indicator drive failed: {e}");
            return Outcome::Failed;
        }
        match self.binary_choice(
            "Indicator LED",
            "Did the LED cycle\nred, green, blue?",
            None,
            ("YES", true),
            ("NO", false),
        ) {
            Some(true) => Outcome::Passed,
            Some(false) => Outcome::Failed,
            None => Outcome::Skipped,
        }
    }

    fn memory(&mut self) -> Outcome {
        let stats = self.board.memory_stats();
        self.clear();
        self.headline("Memory", 40);
        let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
        let lines = [
            format!("Free heap:  {} KB", stats.free_heap / 1024),
            format!("Low mark:   {} KB", stats.min_free_heap / 1024),
            format!("PSRAM free: {} KB", stats.free_psram / 1024),
        ];
        for (i, line) in lines.iter().enumerate() {
            _ = Text::new(line, Point::new(10, 80 + 14 * i as i32), style).draw(&mut self.board);
        }
        self.delay.delay_ms(2000);
        Outcome::FreeHeapKb(stats.free_heap / 1024)
    }

    fn pixel_clock(&mut self) -> Outcome {
        let limit = match self.results.get(StageId::PanelVariant) {
            Some(Outcome::Variant(v)) => v.max_pixel_clock_mhz(),
            // Variant unknown: assume the slower controller.
            _ => PanelVariant::Ili9341.max_pixel_clock_mhz(),
        };
        let outcome = match sweep_pixel_clock(&PIXEL_CLOCK_CANDIDATES_MHZ, limit) {
            Some(mhz) => Outcome::PixelClockMhz(mhz),
            None => Outcome::Failed,
        };
        self.clear();
        self.headline("SPI Clock", 140);
        if let Outcome::PixelClockMhz(mhz) = outcome {
            self.centered(&format!("{mhz} MHz"), 180);
        }
        self.delay.delay_ms(1000);
        outcome
    }

    fn wifi_scan(&mut self) -> Outcome {
        self.clear();
        self.centered("Scanning WiFi...", 160);
        match self.board.scan_networks() {
            Ok(hits) => {
                self.clear();
                let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
                _ = Text::new("WiFi Scan Results:", Point::new(0, 10), style)
                    .draw(&mut self.board);
                if hits.is_empty() {
                    _ = Text::new("No networks found", Point::new(0, 24), style)
                        .draw(&mut self.board);
                } else {
                    let found = format!("Found {} networks", hits.len());
                    _ = Text::new(&found, Point::new(0, 24), style).draw(&mut self.board);
                    for (i, hit) in hits.iter().take(15).enumerate() {
                        let line = format!("{}: {} ({})", i + 1, hit.ssid, hit.rssi);
                        _ = Text::new(&line, Point::new(0, 38 + 12 * i as i32), style)
                            .draw(&mut self.board);
                    }
                }
                self.delay.delay_ms(2000);
                Outcome::Networks(hits.len() as u16)
            }
            Err(e) => {
                error!("wifi scan failed: {e}");
                self.centered("WiFi Scan Failed!", 180);
                self.delay.delay_ms(2000);
                Outcome::Failed
            }
        }
    }

    fn sd_card(&mut self) -> Outcome {
        self.clear();
        self.centered("Testing SD Card...", 160);
        match self.board.probe_storage() {
            Ok(mb) => {
                self.clear();
                self.centered("SD Card OK!", 140);
                self.centered(&format!("Size: {mb} MB"), 160);
                self.delay.delay_ms(2000);
                Outcome::CardSizeMb(mb)
            }
            Err(e) => {
                error!("sd probe failed: {e}");
                self.centered("SD Card Mount Failed!", 180);
                self.delay.delay_ms(2000);
                Outcome::Failed
            }
        }
    }

    fn completion_screen(&mut self) -> Outcome {
        self.clear();
        self.headline("Tests Complete", 100);
        self.centered("Check Serial Monitor", 130);
        self.centered("for Config Block", 145);
        Outcome::Passed
    }

    // --- prompt plumbing ---

    /// Renders the two candidate halves, blocks for one tap, and
    /// classifies its mapped x against the midline.
    fn binary_choice<V>(
        &mut self,
        title: &str,
        question: &str,
        swatch: Option<Rgb565>,
        left: (&str, V),
        right: (&str, V),
    ) -> Option<V> {
        self.clear();
        self.headline(title, 30);
        self.centered(question, 70);
        if let Some(color) = swatch {
            _ = Rectangle::new(Point::new(70, 90), Size::new(100, 60))
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(&mut self.board);
        }

        _ = Line::new(Point::new(MIDLINE_X, 190), Point::new(MIDLINE_X, H - 20))
            .into_styled(PrimitiveStyle::with_stroke(Rgb565::new(8, 16, 8), 1))
            .draw(&mut self.board);
        let label_style = MonoTextStyle::new(&FONT_6X10, Rgb565::YELLOW);
        _ = Text::with_alignment(
            left.0,
            Point::new(MIDLINE_X / 2, 230),
            label_style,
            Alignment::Center,
        )
        .draw(&mut self.board);
        _ = Text::with_alignment(
            right.0,
            Point::new(MIDLINE_X + MIDLINE_X / 2, 230),
            label_style,
            Alignment::Center,
        )
        .draw(&mut self.board);
        self.centered("Tap a side", H - 10);

        let sample = self.tap()?;
        let point = self.active_mapping().map_to_screen(sample);
        Some(pick_half(point, left.1, right.1))
    }

    /// One gesture, with the stage timeout and touch-bus failures both
    /// collapsing to "no input" so the run can move on.
    fn tap(&mut self) -> Option<RawSample> {
        match self.sampler.wait_for_tap(&mut self.delay, self.stage_timeout) {
            Ok(sample) => {
                if sample.is_none() {
                    warn!("no touch within the stage timeout");
                }
                sample
            }
            Err(e) => {
                error!("touch read failed: {e:?}");
                None
            }
        }
    }

    fn active_mapping(&self) -> CalibrationMapping {
        self.mapping.unwrap_or(CalibrationMapping::FALLBACK)
    }

    // --- draw helpers ---

    fn clear(&mut self) {
        _ = self.board.clear(Rgb565::BLACK);
    }

    fn centered(&mut self, text: &str, y: i32) {
        let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
        _ = Text::with_alignment(text, Point::new(MIDLINE_X, y), style, Alignment::Center)
            .draw(&mut self.board);
    }

    fn headline(&mut self, text: &str, y: i32) {
        let style = MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE);
        _ = Text::with_alignment(text, Point::new(MIDLINE_X, y), style, Alignment::Center)
            .draw(&mut self.board);
    }
}

/// Total and exclusive: every logical x lands in exactly one half, and
/// the midline pixel belongs to the right.
fn pick_half<V>(point: Point, left: V, right: V) -> V {
    if point.x < MIDLINE_X {
        left
    } else {
        right
    }
}

/// Walks `candidates` in order and returns the last value within
/// `limit_mhz`, stopping at the first one that exceeds it. A later,
/// lower candidate is deliberately never revisited.
fn sweep_pixel_clock(candidates: &[u32], limit_mhz: u32) -> Option<u32> {
    let mut best = None;
    for &mhz in candidates {
        if mhz > limit_mhz {
            break;
        }
        best = Some(mhz);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::collections::VecDeque;

    struct NoopDelay;

    impl DelayNs for NoopDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[derive(Default)]
    struct FakeBoard {
        color_mode: Option<ColorMode>,
        blinked: bool,
        networks: Vec<NetworkHit>,
        card_mb: Option<u32>,
    }

    impl Dimensions for FakeBoard {
        fn bounding_box(&self) -> Rectangle {
            Rectangle::new(Point::zero(), Size::new(W as u32, H as u32))
        }
    }

    impl DrawTarget for FakeBoard {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }
    }

    impl Board for FakeBoard {
        fn set_color_mode(&mut self, mode: ColorMode) {
            self.color_mode = Some(mode);
        }

        fn blink_indicator(&mut self) -> anyhow::Result<()> {
            self.blinked = true;
            Ok(())
        }

        fn memory_stats(&mut self) -> MemoryStats {
            MemoryStats {
                free_heap: 200 * 1024,
                min_free_heap: 150 * 1024,
                free_psram: 0,
            }
        }

        fn scan_networks(&mut self) -> anyhow::Result<Vec<NetworkHit>> {
            Ok(self.networks.clone())
        }

        fn probe_storage(&mut self) -> anyhow::Result<u32> {
            self.card_mb.ok_or_else(|| anyhow::anyhow!("no card"))
        }
    }

    /// Each queued sample plays back as one press/release cycle.
    struct ScriptedTouch {
        taps: VecDeque<RawSample>,
        holding: bool,
    }

    impl TouchSurface for ScriptedTouch {
        type Error = Infallible;

        fn is_pressed(&mut self) -> Result<bool, Self::Error> {
            if self.holding {
                self.holding = false;
                Ok(false)
            } else if self.taps.is_empty() {
                Ok(false)
            } else {
                self.holding = true;
                Ok(true)
            }
        }

        fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
            Ok(self.taps.pop_front().expect("unscripted touch read"))
        }
    }

    fn raw(x: u16, y: u16) -> RawSample {
        RawSample {
            x,
            y,
            pressure: 1000,
        }
    }

    fn hit(ssid: &str, rssi: i8) -> NetworkHit {
        NetworkHit {
            ssid: ssid.into(),
            rssi,
        }
    }

    fn run_sequencer(
        taps: &[RawSample],
        board: FakeBoard,
        seed: Option<CalibrationMapping>,
        timeout: Option<Duration>,
    ) -> (ResultSet, Option<CalibrationMapping>, FakeBoard) {
        let touch = ScriptedTouch {
            taps: taps.iter().copied().collect(),
            holding: false,
        };
        let mut seq = Sequencer::new(board, TouchSampler::new(touch), NoopDelay, seed, timeout);
        seq.run();
        let (results, mapping, board, _) = seq.into_parts();
        (results, mapping, board)
    }

    #[test]
    fn full_run_records_every_stage_in_order() {
        let taps = [
            // Calibration corners on a reversed panel.
            raw(3570, 3429),
            raw(544, 532),
            // Variant: raw 3570 maps to x = 0, left half -> ILI9341.
            raw(3570, 2000),
            // Polarity: raw 544 maps to x = 239, right half -> inverted.
            raw(544, 2000),
            // LED check: left half -> YES.
            raw(3570, 2000),
        ];
        let board = FakeBoard {
            networks: vec![hit("net-a", -40), hit("net-b", -70)],
            card_mb: Some(1024),
            ..Default::default()
        };
        let (results, mapping, board) = run_sequencer(&taps, board, None, None);

        let m = mapping.expect("calibration captured a mapping");
        assert_eq!((m.min_x, m.max_x, m.min_y, m.max_y), (544, 3570, 532, 3429));

        assert!(board.blinked);
        assert_eq!(board.color_mode, Some(ColorMode::Inverted));

        assert_eq!(results.get(StageId::Calibrate), Some(Outcome::Calibrated));
        assert_eq!(
            results.get(StageId::PanelVariant),
            Some(Outcome::Variant(PanelVariant::Ili9341))
        );
        assert_eq!(
            results.get(StageId::ColorPolarity),
            Some(Outcome::Polarity(ColorMode::Inverted))
        );
        assert_eq!(results.get(StageId::DisplayPattern), Some(Outcome::Passed));
        assert_eq!(results.get(StageId::IndicatorLed), Some(Outcome::Passed));
        assert_eq!(results.get(StageId::Memory), Some(Outcome::FreeHeapKb(200)));
        // ILI9341 bound: the sweep never reaches 55.
        assert_eq!(
            results.get(StageId::PixelClock),
            Some(Outcome::PixelClockMhz(40))
        );
        assert_eq!(results.get(StageId::WifiScan), Some(Outcome::Networks(2)));
        assert_eq!(results.get(StageId::SdCard), Some(Outcome::CardSizeMb(1024)));
        assert_eq!(results.get(StageId::Report), Some(Outcome::Passed));

        let recorded: Vec<StageId> = results.iter().map(|&(s, _)| s).collect();
        assert_eq!(recorded, StageId::VARIANTS);
    }

    #[test]
    fn timed_out_run_still_reaches_the_report() {
        let board = FakeBoard {
            card_mb: None,
            ..Default::default()
        };
        let (results, mapping, _) =
            run_sequencer(&[], board, None, Some(Duration::from_millis(30)));

        assert!(mapping.is_none());
        assert_eq!(results.get(StageId::Calibrate), Some(Outcome::DefaultBounds));
        assert_eq!(results.get(StageId::PanelVariant), Some(Outcome::Skipped));
        assert_eq!(results.get(StageId::ColorPolarity), Some(Outcome::Skipped));
        assert_eq!(results.get(StageId::IndicatorLed), Some(Outcome::Skipped));
        // Conservative bound while the variant is unknown.
        assert_eq!(
            results.get(StageId::PixelClock),
            Some(Outcome::PixelClockMhz(40))
        );
        assert_eq!(results.get(StageId::WifiScan), Some(Outcome::Networks(0)));
        assert_eq!(results.get(StageId::SdCard), Some(Outcome::Failed));
        assert_eq!(results.get(StageId::Report), Some(Outcome::Passed));
    }

    #[test]
    fn seeded_mapping_skips_the_wizard() {
        let seed = CalibrationMapping::from_bounds(300, 3800, 200, 3750);
        let taps = [
            // Variant: right half -> ST7789.
            raw(3800, 2000),
            // Polarity: left half -> RED (normal).
            raw(300, 2000),
            // LED check: left half -> YES.
            raw(300, 2000),
        ];
        let board = FakeBoard {
            card_mb: Some(512),
            ..Default::default()
        };
        let (results, mapping, board) = run_sequencer(&taps, board, Some(seed), None);

        assert_eq!(mapping, Some(seed));
        assert_eq!(results.get(StageId::Calibrate), Some(Outcome::Calibrated));
        assert_eq!(
            results.get(StageId::PanelVariant),
            Some(Outcome::Variant(PanelVariant::St7789))
        );
        assert_eq!(board.color_mode, Some(ColorMode::Normal));
        // ST7789 bound admits 55 and the walk ends before 80.
        assert_eq!(
            results.get(StageId::PixelClock),
            Some(Outcome::PixelClockMhz(55))
        );
    }

    #[test]
    fn outcomes_are_write_once() {
        let mut results = ResultSet::default();
        results.record(StageId::SdCard, Outcome::Failed);
        results.record(StageId::SdCard, Outcome::CardSizeMb(256));
        assert_eq!(results.get(StageId::SdCard), Some(Outcome::Failed));
    }

    #[test]
    fn midline_belongs_to_the_right_half() {
        assert_eq!(pick_half(Point::new(MIDLINE_X - 1, 0), 'L', 'R'), 'L');
        assert_eq!(pick_half(Point::new(MIDLINE_X, 0), 'L', 'R'), 'R');
    }

    #[test]
    fn every_panel_column_selects_exactly_one_half() {
        for x in 0..W {
            let picked = pick_half(Point::new(x, 100), "left", "right");
            if x < MIDLINE_X {
                assert_eq!(picked, "left");
            } else {
                assert_eq!(picked, "right");
            }
        }
    }

    #[test]
    fn sweep_stops_at_the_first_candidate_over_the_limit() {
        assert_eq!(sweep_pixel_clock(&[10, 20, 27, 40, 55, 80], 55), Some(55));
        assert_eq!(sweep_pixel_clock(&[10, 20, 27, 40, 55, 80], 40), Some(40));
        assert_eq!(sweep_pixel_clock(&[10, 20, 27, 40, 55, 80], 5), None);
    }

    #[test]
    fn sweep_never_resumes_after_a_failure() {
        // 15 would satisfy the limit, but the walk ended at 60.
        assert_eq!(sweep_pixel_clock(&[10, 60, 15], 40), Some(10));
    }
}
