use anyhow::Context;
use embedded_graphics::{pixelcolor::Rgb565, prelude::*, primitives::Rectangle};
use embedded_hal::delay::DelayNs;
use esp_idf_hal::{
    delay::Delay,
    gpio::{AnyIOPin, AnyOutputPin, Gpio2, Gpio4, Gpio16, Gpio17, Output, PinDriver},
    modem::Modem,
    spi::{SpiDeviceDriver, SpiDriver},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    fs::fatfs::Fatfs,
    io::vfs::MountedFatfs,
    nvs::EspDefaultNvsPartition,
    sd::{spi::SdSpiHostDriver, SdCardConfiguration, SdCardDriver},
    wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use esp_idf_sys::esp;
use log::info;
use mipidsi::{interface::SpiInterface, models::ST7789, options::ColorInversion, Builder, NoResetPin};
use takeable::Takeable;

use crate::{
    errors::Result,
    sequencer::{Board, ColorMode, MemoryStats, NetworkHit},
};

/// The TFT link: SPI2 with the DC line on GPIO2, no reset pin wired.
pub type CydDisplay = mipidsi::Display<
    SpiInterface<
        'static,
        SpiDeviceDriver<'static, SpiDriver<'static>>,
        PinDriver<'static, Gpio2, Output>,
    >,
    ST7789,
    NoResetPin,
>;

/// The board's RGB indicator, active low, above the USB connector.
pub struct RgbLed {
    pub red: PinDriver<'static, Gpio4, Output>,
    pub green: PinDriver<'static, Gpio16, Output>,
    pub blue: PinDriver<'static, Gpio17, Output>,
}

/// The SD slot's bus, held until the storage stage claims it.
pub struct SdParts {
    pub driver: SpiDriver<'static>,
    pub cs: AnyOutputPin,
}

pub struct CydBoard {
    display: Takeable<CydDisplay>,
    delay: Delay,
    inverted: bool,
    leds: RgbLed,
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    sd: Option<SdParts>,
}

impl CydBoard {
    pub fn new(
        display: CydDisplay,
        mut leds: RgbLed,
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        sd: SdParts,
    ) -> Result<Self> {
        // Park the active-low LED off.
        leds.red.set_high()?;
        leds.green.set_high()?;
        leds.blue.set_high()?;

        Ok(Self {
            display: Takeable::new(display),
            delay: Default::default(),
            inverted: false,
            leds,
            modem: Some(modem),
            sysloop,
            nvs,
            sd: Some(sd),
        })
    }
}

impl Board for CydBoard {
    fn set_color_mode(&mut self, mode: ColorMode) {
        let inverted = mode == ColorMode::Inverted;
        if inverted == self.inverted {
            return;
        }
        // Inversion is part of the controller's init sequence, so swap
        // it by releasing and re-initializing the panel.
        let (di, model, _rst) = self.display.take().release();
        let mut builder = Builder::new(model, di);
        if inverted {
            builder = builder.invert_colors(ColorInversion::Inverted);
        }
        let display = builder
            .init(&mut self.delay)
            .expect("panel re-init failed");
        self.display = Takeable::new(display);
        self.inverted = inverted;
        info!("display rebuilt, inverted = {inverted}");
    }

    fn blink_indicator(&mut self) -> anyhow::Result<()> {
        self.leds.red.set_low()?;
        self.delay.delay_ms(400);
        self.leds.red.set_high()?;
        self.leds.green.set_low()?;
        self.delay.delay_ms(400);
        self.leds.green.set_high()?;
        self.leds.blue.set_low()?;
        self.delay.delay_ms(400);
        self.leds.blue.set_high()?;
        Ok(())
    }

    fn memory_stats(&mut self) -> MemoryStats {
        unsafe {
            MemoryStats {
                free_heap: esp_idf_sys::esp_get_free_heap_size(),
                min_free_heap: esp_idf_sys::esp_get_minimum_free_heap_size(),
                free_psram: esp_idf_sys::heap_caps_get_free_size(esp_idf_sys::MALLOC_CAP_SPIRAM)
                    as u32,
            }
        }
    }

    fn scan_networks(&mut self) -> anyhow::Result<Vec<NetworkHit>> {
        let modem = self
            .modem
            .take()
            .context("wifi modem already consumed")?;
        let mut wifi = BlockingWifi::wrap(
            EspWifi::new(modem, self.sysloop.clone(), Some(self.nvs.clone()))?,
            self.sysloop.clone(),
        )?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        let access_points = wifi.scan()?;
        wifi.stop()?;

        Ok(access_points
            .into_iter()
            .map(|ap| NetworkHit {
                ssid: ap.ssid.to_string(),
                rssi: ap.signal_strength,
            })
            .collect())
    }

    fn probe_storage(&mut self) -> anyhow::Result<u32> {
        let parts = self.sd.take().context("sd bus already consumed")?;
        let host = SdSpiHostDriver::new(
            parts.driver,
            Some(parts.cs),
            AnyIOPin::none(),
            AnyIOPin::none(),
            AnyIOPin::none(),
            None,
        )?;
        let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
        let _mounted = MountedFatfs::mount(Fatfs::new_sdcard(0, card)?, "/sdcard", 4)?;

        let mut total_bytes: u64 = 0;
        let mut free_bytes: u64 = 0;
        esp!(unsafe {
            esp_idf_sys::esp_vfs_fat_info(
                cstr::cstr!("/sdcard").as_ptr(),
                &mut total_bytes,
                &mut free_bytes,
            )
        })?;
        info!("sd volume: {total_bytes} bytes total, {free_bytes} free");

        Ok((total_bytes / (1024 * 1024)) as u32)
    }
}

impl Dimensions for CydBoard {
    fn bounding_box(&self) -> Rectangle {
        self.display.bounding_box()
    }
}

impl DrawTarget for CydBoard {
    type Color = Rgb565;
    type Error = <CydDisplay as DrawTarget>::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> ::core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.display.draw_iter(pixels)
    }

    fn fill_contiguous<I>(
        &mut self,
        area: &Rectangle,
        colors: I,
    ) -> ::core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.display.fill_contiguous(area, colors)
    }

    fn fill_solid(
        &mut self,
        area: &Rectangle,
        color: Self::Color,
    ) -> ::core::result::Result<(), Self::Error> {
        self.display.fill_solid(area, color)
    }

    fn clear(&mut self, color: Self::Color) -> ::core::result::Result<(), Self::Error> {
        self.display.clear(color)
    }
}
