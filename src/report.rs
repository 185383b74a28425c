use xpt2046::CalibrationMapping;

use crate::sequencer::{ColorMode, Outcome, PanelVariant, ResultSet, StageId};

/// Prints the generated hardware configuration block to the serial
/// console, in the header format the board's downstream projects
/// consume. The calibration and test outcomes are the run's; the pin
/// map is fixed by the board.
pub fn print_config(results: &ResultSet, mapping: Option<&CalibrationMapping>) {
    let bounds = mapping.copied().unwrap_or(CalibrationMapping::FALLBACK);
    // A flipped axis goes back out as a reversed pair, the encoding
    // `CalibrationMapping::from_bounds` accepts when the block is
    // pasted back into `config.rs`.
    let (min_x, max_x) = if bounds.flip_x {
        (bounds.max_x, bounds.min_x)
    } else {
        (bounds.min_x, bounds.max_x)
    };
    let (min_y, max_y) = if bounds.flip_y {
        (bounds.max_y, bounds.min_y)
    } else {
        (bounds.min_y, bounds.max_y)
    };

    println!();
    println!();
    println!("/**************************************************************************/");
    println!("/*               CYD HARDWARE CONFIGURATION BLOCK (GENERATED)             */");
    println!("/**************************************************************************/");
    println!("#ifndef CYD_CONFIG_H");
    println!("#define CYD_CONFIG_H");
    println!();
    println!("// --- Touch Screen Calibration ---");
    if mapping.is_none() {
        println!("// WARNING: panel was not calibrated; these are the stock defaults.");
    }
    println!("#define TOUCH_MIN_X {min_x}");
    println!("#define TOUCH_MAX_X {max_x}");
    println!("#define TOUCH_MIN_Y {min_y}");
    println!("#define TOUCH_MAX_Y {max_y}");
    println!();
    println!("// --- Display Driver ---");
    match results.get(StageId::PanelVariant) {
        Some(Outcome::Variant(PanelVariant::Ili9341)) => println!("#define ILI9341_DRIVER"),
        Some(Outcome::Variant(PanelVariant::St7789)) => println!("#define ST7789_DRIVER"),
        _ => println!("// driver variant not identified"),
    }
    match results.get(StageId::ColorPolarity) {
        Some(Outcome::Polarity(ColorMode::Inverted)) => println!("#define TFT_INVERSION_ON"),
        Some(Outcome::Polarity(ColorMode::Normal)) => println!("#define TFT_INVERSION_OFF"),
        _ => println!("// color polarity not identified"),
    }
    if let Some(Outcome::PixelClockMhz(mhz)) = results.get(StageId::PixelClock) {
        println!("#define SPI_FREQUENCY {}", mhz * 1_000_000);
    }
    println!();
    println!("// --- Pin Configuration ---");
    println!("#define TFT_MISO 12");
    println!("#define TFT_MOSI 13");
    println!("#define TFT_SCLK 14");
    println!("#define TFT_CS   15");
    println!("#define TFT_DC    2");
    println!("#define TFT_RST  -1");
    println!("#define TFT_BL   21");
    println!();
    println!("#define TOUCH_CS  33");
    println!("#define TOUCH_IRQ 36");
    println!();
    println!("#define SD_CS     5");
    println!();
    println!("// --- System Info ---");
    let chip = chip_summary();
    println!("// Chip Model: {}", chip.model);
    println!("// Revision: {}", chip.revision);
    println!("// Core Count: {}", chip.cores);
    println!("// Flash Size: {} MB", chip.flash_mb);
    println!();
    println!("// --- Test Results ---");
    for &(stage, outcome) in results.iter() {
        println!("// {stage}: {outcome}");
    }
    println!();
    println!("#endif // CYD_CONFIG_H");
    println!("/**************************************************************************/");
}

struct ChipSummary {
    model: &'static str,
    revision: u16,
    cores: u8,
    flash_mb: u32,
}

fn chip_summary() -> ChipSummary {
    let mut info = esp_idf_sys::esp_chip_info_t::default();
    unsafe { esp_idf_sys::esp_chip_info(&mut info) };
    let model = match info.model {
        m if m == esp_idf_sys::esp_chip_model_t_CHIP_ESP32 => "ESP32",
        m if m == esp_idf_sys::esp_chip_model_t_CHIP_ESP32S2 => "ESP32-S2",
        m if m == esp_idf_sys::esp_chip_model_t_CHIP_ESP32S3 => "ESP32-S3",
        m if m == esp_idf_sys::esp_chip_model_t_CHIP_ESP32C3 => "ESP32-C3",
        _ => "unknown",
    };

    let mut flash_bytes: u32 = 0;
    unsafe { esp_idf_sys::esp_flash_get_size(core::ptr::null_mut(), &mut flash_bytes) };

    ChipSummary {
        model,
        revision: info.revision,
        cores: info.cores,
        flash_mb: flash_bytes / (1024 * 1024),
    }
}
