pub type Result<T> = ::core::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Esp(#[from] esp_idf_sys::EspError),
    #[error(transparent)]
    BitbangSpi(#[from] bitbang_hal::spi::Error<esp_idf_hal::gpio::GpioError>),
}
