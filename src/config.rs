use std::path::Path;
use std::time::Duration;

use log::warn;
use serde_derive::Deserialize;

use crate::messages::ButtonAction;

pub const DEFAULT_RFID_URL: &str = "http://10.5.0.2:3000/api/rfid";
pub const DEFAULT_BUTTONS_URL: &str = "http://10.5.0.2:3000/api/buttons";
pub const DEFAULT_MACHINE_ID: &str = "ecran_1";

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub buttons: ButtonsConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ApiConfig {
    pub rfid_url: Option<String>,
    pub buttons_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct StationConfig {
    pub machine_id: Option<String>,
    pub interscan_delay_ms: Option<u64>,
}

// Only read by the `hardware` build.
#[allow(dead_code)]
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ReaderConfig {
    pub spi_bus: Option<u8>,
    pub slave_select: Option<u8>,
    pub clock_hz: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ButtonsConfig {
    pub debounce_ms: Option<u64>,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub shutdown_grace_ms: Option<u64>,
    pub pins: Option<Vec<ButtonPin>>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPin {
    pub pin: u8,
    pub action: ButtonAction,
}

impl AppConfig {
    /// Reads the TOML file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(AppConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::de::from_str(&contents)?)
    }
}

impl ApiConfig {
    pub fn rfid_url(&self) -> &str {
        self.rfid_url.as_deref().unwrap_or(DEFAULT_RFID_URL)
    }

    pub fn buttons_url(&self) -> &str {
        self.buttons_url.as_deref().unwrap_or(DEFAULT_BUTTONS_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(5))
    }
}

impl StationConfig {
    pub fn machine_id(&self) -> &str {
        self.machine_id.as_deref().unwrap_or(DEFAULT_MACHINE_ID)
    }

    pub fn interscan_delay(&self) -> Duration {
        Duration::from_millis(self.interscan_delay_ms.unwrap_or(1000))
    }
}

#[allow(dead_code)]
impl ReaderConfig {
    pub fn spi_bus(&self) -> u8 {
        self.spi_bus.unwrap_or(0)
    }

    pub fn slave_select(&self) -> u8 {
        self.slave_select.unwrap_or(0)
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz.unwrap_or(1_000_000)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(100))
    }
}

impl ButtonsConfig {
    #[allow(dead_code)]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(250))
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(2).max(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(16).max(1)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms.unwrap_or(2000))
    }

    /// BCM pin to action mapping of the wired buttons.
    pub fn pins(&self) -> Vec<ButtonPin> {
        match &self.pins {
            Some(pins) => pins.clone(),
            None => vec![
                ButtonPin { pin: 17, action: ButtonAction::IncrementP1 },
                ButtonPin { pin: 27, action: ButtonAction::IncrementP2 },
                ButtonPin { pin: 22, action: ButtonAction::DecrementP1 },
                ButtonPin { pin: 23, action: ButtonAction::DecrementP2 },
                ButtonPin { pin: 24, action: ButtonAction::Back },
            ],
        }
    }
}
