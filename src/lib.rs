extern crate serde;

use serde::{ Serialize, Deserialize };
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

mod error;
pub use error::{Error, ErrorKind, Result};
pub mod de;
pub mod page;
pub mod agents;
pub mod controller;
pub mod poller;
pub mod db;
pub mod logging;
pub mod ui;

pub use agents::{HttpAgent, PlcAgent};
pub use controller::{KeyMapping, PageController, PollOutcome};
pub use page::{MemoryPage, Page};
pub use poller::Poller;

/// One of the four data slots of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Data1,
    Data2,
    Data3,
    Data4
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Data1, Field::Data2, Field::Data3, Field::Data4];

    pub fn name(self) -> &'static str {
        match self {
            Field::Data1 => "data1",
            Field::Data2 => "data2",
            Field::Data3 => "data3",
            Field::Data4 => "data4"
        }
    }

    /// id of the editable element whose value gets sent
    pub fn output_id(self) -> String {
        format!("{}_out", self.name())
    }

    /// id of the element that shows the polled value
    pub fn display_id(self) -> String {
        format!("{}_in", self.name())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u8> for Field {
    type Error = Error;

    fn try_from(n: u8) -> Result<Field> {
        match n {
            1 => Ok(Field::Data1),
            2 => Ok(Field::Data2),
            3 => Ok(Field::Data3),
            4 => Ok(Field::Data4),
            _ => Err(Error::config(format!("field must be 1-4, got {}", n)))
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    /// accepts `3` or `data3`
    fn from_str(s: &str) -> Result<Field> {
        let s = s.trim();
        let digits = s.strip_prefix("data").unwrap_or(s);
        let n = digits.parse::<u8>()
            .map_err(|_| Error::config(format!("unknown field '{}'", s)))?;
        Field::try_from(n)
    }
}

/// Values served by the page's data endpoint, already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(deserialize_with="de::scalar_text")]
    pub data1: String,
    #[serde(deserialize_with="de::scalar_text")]
    pub data2: String,
    #[serde(deserialize_with="de::scalar_text")]
    pub data3: String,
    #[serde(deserialize_with="de::scalar_text")]
    pub data4: String
}

impl Snapshot {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Data1 => &self.data1,
            Field::Data2 => &self.data2,
            Field::Data3 => &self.data3,
            Field::Data4 => &self.data4
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = serde_json::to_string(&self)
            .unwrap_or_else(|err| {
                err.to_string()
            });

        write!(f, "{}", val)
    }
}
