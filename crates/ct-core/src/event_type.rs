//! Remote event type enum as the single source of truth for event type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of calendar entries reported by the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventType {
    /// A regular event or not further specified.
    #[default]
    Default,
    /// An event created from a Gmail message.
    FromGmail,
    /// An all-day event with an annual recurrence.
    Birthday,
    FocusTime,
    OutOfOffice,
    WorkingLocation,
}

impl EventType {
    /// Event types counted toward time accounting unless the caller overrides it.
    pub const TRACKED: [Self; 2] = [Self::Default, Self::FromGmail];

    /// Wire representation used by the remote source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::FromGmail => "fromGmail",
            Self::Birthday => "birthday",
            Self::FocusTime => "focusTime",
            Self::OutOfOffice => "outOfOffice",
            Self::WorkingLocation => "workingLocation",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "fromGmail" | "from_gmail" => Ok(Self::FromGmail),
            "birthday" => Ok(Self::Birthday),
            "focusTime" | "focus_time" => Ok(Self::FocusTime),
            "outOfOffice" | "out_of_office" => Ok(Self::OutOfOffice),
            "workingLocation" | "working_location" => Ok(Self::WorkingLocation),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}
