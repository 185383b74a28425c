use embedded_hal::spi::SpiDevice;

// Control bytes: start bit, channel select, 12-bit differential mode,
// power-down between conversions (keeps the pen-detect circuit alive).
const CMD_READ_X: u8 = 0xD0;
const CMD_READ_Y: u8 = 0x90;
const CMD_READ_Z1: u8 = 0xB0;
const CMD_READ_Z2: u8 = 0xC0;

pub(crate) struct Spi<SPI>
where
    SPI: SpiDevice,
{
    device: SPI,
}

impl<SPI> Spi<SPI>
where
    SPI: SpiDevice,
{
    pub(crate) fn new(device: SPI) -> Self {
        Self { device }
    }

    /// One 12-bit conversion. The result arrives left-aligned across
    /// the two bytes clocked out after the command.
    fn read_channel(&mut self, command: u8) -> Result<u16, SPI::Error> {
        let mut buf = [command, 0, 0];
        self.device.transfer_in_place(&mut buf)?;
        Ok((((buf[1] as u16) << 8) | buf[2] as u16) >> 3)
    }

    pub(crate) fn read_position(&mut self) -> Result<(u16, u16), SPI::Error> {
        let x = self.read_channel(CMD_READ_X)?;
        let y = self.read_channel(CMD_READ_Y)?;
        Ok((x, y))
    }

    /// Touch pressure from the two cross-plate measurements.
    pub(crate) fn read_pressure(&mut self) -> Result<u16, SPI::Error> {
        let z1 = self.read_channel(CMD_READ_Z1)? as i32;
        let z2 = self.read_channel(CMD_READ_Z2)? as i32;
        Ok((z1 + 4095 - z2).clamp(0, 4095) as u16)
    }
}
