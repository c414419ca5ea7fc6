use crate::messages::ButtonAction;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The input has ended (e.g. stdin reached EOF).
    #[error("input closed")]
    Closed,
    #[error("input error: {0}")]
    Io(#[from] std::io::Error),
    #[error("reader error: {0}")]
    Reader(String),
}

/// Produces badge UIDs. Blocks until one is available; an empty string
/// means nothing was scanned.
pub trait UidSource: Send {
    fn read_uid(&mut self) -> Result<String, SourceError>;
}

/// Blocking button entry used when no GPIO lines are available.
pub trait ButtonMenu: Send {
    /// Shows the available actions before a round of prompts.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Next chosen action, or `None` once the operator skips back to scanning.
    fn next_action(&mut self) -> Result<Option<ButtonAction>, SourceError>;
}

/// Renders raw UID bytes as the decimal number badges are registered under.
///
/// Single size (4 byte) UIDs get their anticollision check byte appended
/// first, which is what the SimpleMFRC522 Python reader reports.
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
pub fn uid_to_string(bytes: &[u8]) -> String {
    let check = bytes.iter().fold(0u8, |acc, b| acc ^ b);
    let mut value: u128 = 0;
    for b in bytes {
        value = (value << 8) | u128::from(*b);
    }
    if bytes.len() == 4 {
        value = (value << 8) | u128::from(check);
    }
    value.to_string()
}
