use embedded_hal::spi::SpiDevice;

use crate::{RawSample, TouchSurface};

mod spi;

/// Z-axis reading below which the panel is considered released. The
/// resistive layer floats near zero when nothing presses the plates
/// together.
const PRESSURE_THRESHOLD: u16 = 400;

/// XPT2046 resistive touch controller.
pub struct Xpt2046<SPI>
where
    SPI: SpiDevice,
{
    spi: spi::Spi<SPI>,
    pressure_threshold: u16,
}

impl<SPI> Xpt2046<SPI>
where
    SPI: SpiDevice,
{
    pub fn new(touch_spi_device: SPI) -> Self {
        Self {
            spi: spi::Spi::new(touch_spi_device),
            pressure_threshold: PRESSURE_THRESHOLD,
        }
    }

    /// Overrides the press-detection threshold for panels with an
    /// unusually stiff or loose layer.
    pub fn with_pressure_threshold(mut self, threshold: u16) -> Self {
        self.pressure_threshold = threshold;
        self
    }
}

impl<SPI> TouchSurface for Xpt2046<SPI>
where
    SPI: SpiDevice,
{
    type Error = SPI::Error;

    fn is_pressed(&mut self) -> Result<bool, Self::Error> {
        Ok(self.spi.read_pressure()? >= self.pressure_threshold)
    }

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        let (x, y) = self.spi.read_position()?;
        let pressure = self.spi.read_pressure()?;
        Ok(RawSample { x, y, pressure })
    }
}
