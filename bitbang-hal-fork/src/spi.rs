//! Bit-banged SPI master (mode 0, MSB first).
//!
//! Consumes three GPIOs plus a chip select and a delay source. Used
//! for peripherals routed to pins no hardware SPI host can reach.
//! Each byte is clocked manually: data is launched on the falling
//! edge and sampled on the rising edge.

use core::fmt::{self, Debug, Display};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{self, ErrorType, Operation, SpiDevice};

/// Error type
#[derive(Debug)]
pub enum Error<E: Debug + Display> {
    /// Communication error on one of the underlying pins
    Bus(E),
}

impl<E: Debug + Display> core::error::Error for Error<E> {}

impl<E: Debug + Display> Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "Bus error: {}", e),
        }
    }
}

impl<E: Debug + Display> spi::Error for Error<E> {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// A mode-0 SPI master over four GPIOs. The half-period delay is
/// configurable; zero means "as fast as the GPIO driver goes", which
/// is plenty slow enough for conservative peripherals on most MCUs.
pub struct Spi<Miso, Mosi, Sck, Cs, Delay>
where
    Miso: InputPin,
    Mosi: OutputPin,
    Sck: OutputPin,
    Cs: OutputPin,
    Delay: DelayNs,
{
    miso: Miso,
    mosi: Mosi,
    sck: Sck,
    cs: Cs,
    delay: Delay,
    half_period_ns: u32,
}

impl<Miso, Mosi, Sck, Cs, Delay, E> Spi<Miso, Mosi, Sck, Cs, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    Cs: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    /// Creates the bus with the clock parked low and the device
    /// deselected.
    pub fn build(
        miso: Miso,
        mosi: Mosi,
        sck: Sck,
        cs: Cs,
        delay: Delay,
    ) -> Result<Self, Error<E>> {
        let mut spi = Spi {
            miso,
            mosi,
            sck,
            cs,
            delay,
            half_period_ns: 0,
        };
        spi.sck.set_low().map_err(Error::Bus)?;
        spi.cs.set_high().map_err(Error::Bus)?;
        Ok(spi)
    }

    /// `build`s with a fixed half-period between clock edges.
    pub fn with_half_period_ns(mut self, ns: u32) -> Self {
        self.half_period_ns = ns;
        self
    }

    fn pause(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }

    /// Shifts one byte out while shifting one in, MSB first.
    fn exchange_byte(&mut self, out: u8) -> Result<u8, Error<E>> {
        let mut read = 0u8;
        for bit in (0..8).rev() {
            if (out >> bit) & 1 == 1 {
                self.mosi.set_high().map_err(Error::Bus)?;
            } else {
                self.mosi.set_low().map_err(Error::Bus)?;
            }
            self.pause();
            self.sck.set_high().map_err(Error::Bus)?;
            read <<= 1;
            if self.miso.is_high().map_err(Error::Bus)? {
                read |= 1;
            }
            self.pause();
            self.sck.set_low().map_err(Error::Bus)?;
        }
        Ok(read)
    }
}

impl<Miso, Mosi, Sck, Cs, Delay, E> SpiDevice<u8> for Spi<Miso, Mosi, Sck, Cs, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    Cs: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(Error::Bus)?;
        self.pause();

        for op in operations {
            match op {
                Operation::DelayNs(ns) => self.delay.delay_ns(*ns),
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.exchange_byte(0)?;
                    }
                }
                Operation::Write(buf) => {
                    for byte in buf.iter() {
                        self.exchange_byte(*byte)?;
                    }
                }
                Operation::Transfer(read, write) => {
                    for (r, w) in read.iter_mut().zip(write.iter()) {
                        *r = self.exchange_byte(*w)?;
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.exchange_byte(*byte)?;
                    }
                }
            }
        }

        self.pause();
        self.cs.set_high().map_err(Error::Bus)?;
        Ok(())
    }
}

impl<Miso, Mosi, Sck, Cs, Delay, E> ErrorType for Spi<Miso, Mosi, Sck, Cs, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    Cs: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    type Error = Error<E>;
}
