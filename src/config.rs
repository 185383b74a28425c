//! Compile-time board configuration.

use core::time::Duration;

use xpt2046::CalibrationMapping;

/// Paste the `TOUCH_*` values from a previously generated
/// configuration block here to skip the calibration wizard on boot:
///
/// ```ignore
/// pub const SEED_CALIBRATION: Option<CalibrationMapping> =
///     Some(CalibrationMapping::from_bounds(3570, 544, 3429, 532));
/// ```
pub const SEED_CALIBRATION: Option<CalibrationMapping> = None;

/// Bounds every interactive wait; a stage whose tap never arrives is
/// recorded as skipped instead of holding the run. `None` waits
/// forever, which is the right default for an operator-attended
/// bring-up.
pub const STAGE_TIMEOUT: Option<Duration> = None;

/// TFT SPI clock during bring-up. Conservative enough for both
/// controller revisions; the achievable clock is derived later and
/// lands in the configuration block.
pub const DISPLAY_BAUDRATE_MHZ: u32 = 40;
