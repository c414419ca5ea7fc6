use std::thread;
use std::time::Duration;

use log::{debug, info};
use mfrc522::comm::blocking::spi::SpiInterface;
use mfrc522::{Initialized, Mfrc522};
use rppal::gpio::{Gpio, InputPin, Trigger};
use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};

use super::HardwareError;
use crate::buttons::{ButtonLines, ButtonTrigger};
use crate::config::{ButtonsConfig, ReaderConfig};
use crate::scanner::{SourceError, UidSource, uid_to_string};

type Reader = Mfrc522<SpiInterface<SimpleHalSpiDevice<Spi>>, Initialized>;

pub struct RfidReader {
    reader: Reader,
    poll_interval: Duration,
}

impl RfidReader {
    pub fn open(config: &ReaderConfig) -> Result<Self, HardwareError> {
        let bus = match config.spi_bus() {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => {
                return Err(HardwareError::Initialization(format!(
                    "unsupported SPI bus {}",
                    other
                )));
            }
        };
        let slave = match config.slave_select() {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(HardwareError::Initialization(format!(
                    "unsupported slave select {}",
                    other
                )));
            }
        };

        let spi = Spi::new(bus, slave, config.clock_hz(), Mode::Mode0)
            .map_err(|e| HardwareError::Initialization(format!("SPI: {}", e)))?;
        let mut reader = Mfrc522::new(SpiInterface::new(SimpleHalSpiDevice::new(spi)))
            .init()
            .map_err(|e| HardwareError::Initialization(format!("MFRC522: {:?}", e)))?;

        let version = reader
            .version()
            .map_err(|e| HardwareError::Initialization(format!("MFRC522: {:?}", e)))?;
        info!("[RFID] MFRC522 ready (version 0x{:02X})", version);

        Ok(RfidReader {
            reader,
            poll_interval: config.poll_interval(),
        })
    }
}

impl UidSource for RfidReader {
    fn read_uid(&mut self) -> Result<String, SourceError> {
        loop {
            // No answer to REQA just means no tag in the field yet.
            if let Ok(atqa) = self.reader.reqa() {
                match self.reader.select(&atqa) {
                    Ok(uid) => {
                        if let Err(e) = self.reader.hlta() {
                            debug!("[RFID] halt failed: {:?}", e);
                        }
                        return Ok(uid_to_string(uid.as_bytes()));
                    }
                    Err(e) => debug!("[RFID] select failed: {:?}", e),
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

pub struct GpioButtons {
    pins: Vec<InputPin>,
}

impl GpioButtons {
    /// Pulls every configured line up and fires `trigger` on falling edges.
    pub fn register(config: &ButtonsConfig, trigger: ButtonTrigger) -> Result<Self, HardwareError> {
        let gpio = Gpio::new().map_err(|e| HardwareError::Initialization(format!("GPIO: {}", e)))?;
        let debounce = config.debounce();

        let mut pins = Vec::new();
        for mapping in config.pins() {
            let mut pin = gpio
                .get(mapping.pin)
                .map_err(|e| HardwareError::Initialization(format!("GPIO {}: {}", mapping.pin, e)))?
                .into_input_pullup();
            let trigger = trigger.clone();
            let line = mapping.pin;
            pin.set_async_interrupt(Trigger::FallingEdge, Some(debounce), move |_event| {
                trigger.fire(line);
            })
            .map_err(|e| HardwareError::Initialization(format!("GPIO {}: {}", mapping.pin, e)))?;
            pins.push(pin);
        }

        info!(
            "[BTN] Buttons configured: {}",
            config
                .pins()
                .iter()
                .map(|p| format!("{}={}", p.pin, p.action))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(GpioButtons { pins })
    }
}

impl ButtonLines for GpioButtons {
    fn release(self: Box<Self>) {
        for mut pin in self.pins {
            if let Err(e) = pin.clear_async_interrupt() {
                debug!("[BTN] clearing interrupt on GPIO {}: {}", pin.pin(), e);
            }
            // Dropping the pin restores its previous mode and bias.
        }
        info!("[BTN] GPIO released");
    }
}
