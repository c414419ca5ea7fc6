use std::fmt;

use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    IncrementP1,
    IncrementP2,
    DecrementP1,
    DecrementP2,
    Back,
}

impl ButtonAction {
    #[cfg(test)]
    pub const ALL: [ButtonAction; 5] = [
        ButtonAction::IncrementP1,
        ButtonAction::IncrementP2,
        ButtonAction::DecrementP1,
        ButtonAction::DecrementP2,
        ButtonAction::Back,
    ];

    /// Console menu key (`1`..`5`) for this action.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "1" => Some(ButtonAction::IncrementP1),
            "2" => Some(ButtonAction::IncrementP2),
            "3" => Some(ButtonAction::DecrementP1),
            "4" => Some(ButtonAction::DecrementP2),
            "5" => Some(ButtonAction::Back),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonAction::IncrementP1 => "increment_p1",
            ButtonAction::IncrementP2 => "increment_p2",
            ButtonAction::DecrementP1 => "decrement_p1",
            ButtonAction::DecrementP2 => "decrement_p2",
            ButtonAction::Back => "back",
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub rfid_uuid: String,
    pub machine_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    pub machine_id: String,
    pub action: ButtonAction,
}

/// Everything the station forwards to the API. Serializes as the bare
/// body of the wrapped event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Scan(ScanEvent),
    Button(ButtonEvent),
}

impl Event {
    pub fn scan(uid: &str, machine_id: &str) -> Self {
        Event::Scan(ScanEvent {
            rfid_uuid: uid.to_string(),
            machine_id: machine_id.to_string(),
        })
    }

    pub fn button(action: ButtonAction, machine_id: &str) -> Self {
        Event::Button(ButtonEvent {
            machine_id: machine_id.to_string(),
            action,
        })
    }
}
