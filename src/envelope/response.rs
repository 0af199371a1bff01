//! The JSON body written for every adapted request.

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codes;

/// Response envelope.
///
/// Wire shape: `{"err": <int>, "now": "<RFC3339>", "msg": "...", "data": ...}`.
/// `msg` is present only when `err != 0`, `data` only when it is not null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub err: i64,
    pub now: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub(crate) fn new(err: i64, msg: Option<String>, data: Option<Value>) -> Self {
        Self {
            err,
            now: timestamp(),
            msg: if err == codes::OK { None } else { msg },
            data: data.filter(|value| !value.is_null()),
        }
    }

    /// A success envelope carrying `data`.
    pub fn success(data: Option<Value>) -> Self {
        Self::new(codes::OK, None, data)
    }

    /// True when the business outcome is a success (`err == 0`).
    pub fn is_success(&self) -> bool {
        self.err == codes::OK
    }
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
