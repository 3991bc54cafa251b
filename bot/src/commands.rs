//! Chat commands understood by the bot.

use std::fmt;

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Station {
    Bollerwagen,
    Flamingo,
}

impl Station {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Station::Bollerwagen => "Radio Bollerwagen",
            Station::Flamingo => "Radio Flamingo",
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream URLs of the known stations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stations {
    pub flamingo: String,
    pub bollerwagen: String,
}

impl Stations {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            flamingo: config::flamingo_url(),
            bollerwagen: config::bollerwagen_url(),
        }
    }

    #[must_use]
    pub fn url(&self, station: Station) -> &str {
        match station {
            Station::Bollerwagen => &self.bollerwagen,
            Station::Flamingo => &self.flamingo,
        }
    }
}

impl Default for Stations {
    fn default() -> Self {
        Self {
            flamingo: config::RADIO_FLAMINGO.to_string(),
            bollerwagen: config::RADIO_BOLLERWAGEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play(Station),
    Leave,
}

impl Command {
    /// Returns `None` for ordinary chat.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "!bollerwagen" => Some(Command::Play(Station::Bollerwagen)),
            "!flamingo" => Some(Command::Play(Station::Flamingo)),
            "!leave" => Some(Command::Leave),
            _ => None,
        }
    }
}
