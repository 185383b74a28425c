use embedded_canvas::CanvasAt;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{Circle, Primitive, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
};
use esp_idf_hal::{
    delay::{Delay, FreeRtos},
    gpio::{OutputPin, PinDriver},
    prelude::Peripherals,
    spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig, SPI2, SPI3},
    units::FromValueType,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use log::{error, info};
use mipidsi::{interface::SpiInterface, models::ST7789, Builder};
use u8g2_fonts::{
    types::{FontColor, HorizontalAlignment, VerticalPosition},
    FontRenderer,
};
use xpt2046::{
    CalibrationMapping, RawSample, TouchSampler, TouchSurface, Xpt2046, LOGICAL_WIDTH,
};

mod board;
mod config;
mod errors;
mod report;
mod sequencer;

use board::{CydBoard, RgbLed, SdParts};
use errors::Result;
use sequencer::Sequencer;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!(
        "Core: {:?}, Heap free: {}",
        esp_idf_hal::cpu::core(),
        unsafe { esp_idf_hal::sys::esp_get_free_heap_size() }
    );

    let peripherals = Peripherals::take()?;
    let mut delay: Delay = Default::default();

    // Backlight: CYD revisions use GPIO21 or GPIO27 (or both). Drive
    // both; the drivers stay alive for the rest of the run.
    let mut backlight_a = PinDriver::output(peripherals.pins.gpio21)?;
    backlight_a.set_high()?;
    let mut backlight_b = PinDriver::output(peripherals.pins.gpio27)?;
    backlight_b.set_high()?;

    // TFT on HSPI.
    let lcd_dc = PinDriver::output(peripherals.pins.gpio2)?;
    let lcd_cs = peripherals.pins.gpio15;
    let lcd_clk = peripherals.pins.gpio14;
    let lcd_miso = peripherals.pins.gpio12; // TFT_SDO
    let lcd_mosi = peripherals.pins.gpio13; // TFT_SDI
    let lcd_driver = SpiDriver::new::<SPI2>(
        peripherals.spi2,
        lcd_clk,
        lcd_mosi,
        Some(lcd_miso),
        &SpiDriverConfig::new(),
    )?;
    let lcd_config = esp_idf_hal::spi::config::Config::new()
        .baudrate(config::DISPLAY_BAUDRATE_MHZ.MHz().into());
    let lcd_device = SpiDeviceDriver::new(lcd_driver, Some(lcd_cs), &lcd_config)?;
    let di = SpiInterface::new(lcd_device, lcd_dc, Box::leak(Box::new([0u8; 512])));
    let mut display = Builder::new(ST7789, di).init(&mut delay).unwrap();
    display.clear(Rgb565::BLACK).unwrap();

    // Touch on a bit-banged bus: the XPT2046 hangs off GPIOs that no
    // free hardware host reaches once the TFT and SD slots have theirs.
    let touch_miso = PinDriver::input(peripherals.pins.gpio39)?;
    let touch_mosi = PinDriver::output(peripherals.pins.gpio32)?;
    let touch_sck = PinDriver::output(peripherals.pins.gpio25)?;
    let touch_cs = PinDriver::output(peripherals.pins.gpio33)?;
    let touch_delay: Delay = Default::default();
    let touch_spi =
        bitbang_hal::spi::Spi::build(touch_miso, touch_mosi, touch_sck, touch_cs, touch_delay)?
            .with_half_period_ns(500);
    let mut sampler = TouchSampler::new(Xpt2046::new(touch_spi));

    // SD on VSPI, claimed on demand by the storage stage.
    let sd_driver = SpiDriver::new::<SPI3>(
        peripherals.spi3,
        peripherals.pins.gpio18,
        peripherals.pins.gpio23,
        Some(peripherals.pins.gpio19),
        &SpiDriverConfig::new(),
    )?;
    let sd = SdParts {
        driver: sd_driver,
        cs: peripherals.pins.gpio5.downgrade_output(),
    };

    let leds = RgbLed {
        red: PinDriver::output(peripherals.pins.gpio4)?,
        green: PinDriver::output(peripherals.pins.gpio16)?,
        blue: PinDriver::output(peripherals.pins.gpio17)?,
    };

    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // The task watchdog would trip during the long blocking waits.
    assert_eq!(unsafe { esp_idf_hal::sys::esp_task_wdt_deinit() }, 0);

    let mut board = CydBoard::new(display, leds, peripherals.modem, sysloop, nvs, sd)?;

    info!("Starting Hardware Test...");

    // Intro
    let headline = FontRenderer::new::<u8g2_fonts::fonts::u8g2_font_fub14_tf>();
    _ = headline.render_aligned(
        "CYD Hardware Test",
        Point::new(LOGICAL_WIDTH as i32 / 2, 140),
        VerticalPosition::Baseline,
        HorizontalAlignment::Center,
        FontColor::Transparent(Rgb565::WHITE),
        &mut board,
    );
    let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
    _ = Text::with_alignment(
        "Tap to Start",
        Point::new(LOGICAL_WIDTH as i32 / 2, 180),
        style,
        Alignment::Center,
    )
    .draw(&mut board);
    sampler.wait_for_any(&mut delay)?;

    let mut sequencer = Sequencer::new(
        board,
        sampler,
        delay,
        config::SEED_CALIBRATION,
        config::STAGE_TIMEOUT,
    );
    sequencer.run();
    let (results, mapping, mut board, mut sampler) = sequencer.into_parts();

    report::print_config(&results, mapping.as_ref());

    // Passive verification loop: echo raw readings and mark the mapped
    // point so the generated calibration can be eyeballed.
    let active = mapping.unwrap_or(CalibrationMapping::FALLBACK);
    let echo_style = MonoTextStyle::new(&FONT_6X10, Rgb565::RED);
    let mut canvas = CanvasAt::<Rgb565>::new(Point::new(0, 0), Size::new(LOGICAL_WIDTH, 20));
    let mut old_bb: Rectangle = Default::default();
    loop {
        match touch_state(&mut sampler) {
            Ok(Some(sample)) => {
                let point = active.map_to_screen(sample);
                info!("X: {}, Y: {}, Z: {}", sample.x, sample.y, sample.pressure);

                let echo = format!(
                    "raw {}/{} -> {}/{}",
                    sample.x, sample.y, point.x, point.y
                );
                let text = Text::new(&echo, Point::new(4, 14), echo_style);
                _ = canvas.fill_solid(&old_bb, Rgb565::BLACK);
                _ = text.draw(&mut canvas);
                old_bb = text.bounding_box();
                _ = canvas.draw(&mut board);

                _ = Circle::with_center(point, 9)
                    .into_styled(PrimitiveStyle::with_fill(Rgb565::GREEN))
                    .draw(&mut board);
            }
            Ok(None) => {}
            Err(e) => {
                error!("{e}");
            }
        }
        FreeRtos::delay_ms(10);
    }
}

/// One unlatched poll of the panel, for the live echo.
fn touch_state<T: TouchSurface>(
    sampler: &mut TouchSampler<T>,
) -> ::core::result::Result<Option<RawSample>, T::Error> {
    let surface = sampler.surface_mut();
    if surface.is_pressed()? {
        Ok(Some(surface.read_raw()?))
    } else {
        Ok(None)
    }
}
