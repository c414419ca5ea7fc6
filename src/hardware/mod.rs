//! Raspberry Pi peripherals: the MFRC522 reader on SPI and the button lines
//! on GPIO. Only built with the `hardware` feature; without it every probe
//! reports the capability as unsupported and the station falls back to the
//! console.

#[cfg(feature = "hardware")]
mod rpi;

use crate::buttons::{ButtonLines, ButtonTrigger};
use crate::config::{ButtonsConfig, ReaderConfig};
use crate::scanner::UidSource;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("built without hardware support")]
    Unsupported,
    #[cfg_attr(not(feature = "hardware"), allow(dead_code))]
    #[error("initialization failed: {0}")]
    Initialization(String),
}

#[cfg(feature = "hardware")]
pub fn open_reader(config: &ReaderConfig) -> Result<Box<dyn UidSource>, HardwareError> {
    Ok(Box::new(rpi::RfidReader::open(config)?))
}

#[cfg(not(feature = "hardware"))]
pub fn open_reader(_config: &ReaderConfig) -> Result<Box<dyn UidSource>, HardwareError> {
    Err(HardwareError::Unsupported)
}

#[cfg(feature = "hardware")]
pub fn open_buttons(
    config: &ButtonsConfig,
    trigger: ButtonTrigger,
) -> Result<Box<dyn ButtonLines>, HardwareError> {
    Ok(Box::new(rpi::GpioButtons::register(config, trigger)?))
}

#[cfg(not(feature = "hardware"))]
pub fn open_buttons(
    _config: &ButtonsConfig,
    _trigger: ButtonTrigger,
) -> Result<Box<dyn ButtonLines>, HardwareError> {
    Err(HardwareError::Unsupported)
}
