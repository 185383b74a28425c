#![no_std]

pub mod spi;
