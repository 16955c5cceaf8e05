//! Typed views of PCIC data replies.

use serde::Serialize;

use crate::error::{PcicError, Result};
use crate::error_codes::error_message;

const TAB: char = '\t';

/// Parsed `A?` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationList {
    /// Number of applications stored on the device.
    pub count: u32,
    /// Number of the active application.
    pub active: u32,
    pub numbers: Vec<u32>,
}

impl ApplicationList {
    /// Parse `<count>\t<active>\t<number>\t...`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields = text.split(TAB).map(str::trim).filter(|f| !f.is_empty());
        let count = parse_number(fields.next(), "application count")?;
        let active = parse_number(fields.next(), "active application")?;
        let numbers = fields
            .map(|f| parse_number(Some(f), "application number"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            count,
            active,
            numbers,
        })
    }
}

/// Process interface output selection for `p<d>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    Disabled,
    Results,
    Errors,
    ErrorsAndResults,
    Notifications,
    NotificationsAndResults,
    NotificationsAndErrors,
    All,
}

impl OutputMode {
    pub fn digit(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Results => 1,
            Self::Errors => 2,
            Self::ErrorsAndResults => 3,
            Self::Notifications => 4,
            Self::NotificationsAndResults => 5,
            Self::NotificationsAndErrors => 6,
            Self::All => 7,
        }
    }
}

/// Logic state of a digital output, as echoed by `o`/`O?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IoState {
    pub id: u8,
    pub high: bool,
}

impl IoState {
    /// Parse `<2-digit id><0|1>`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() != 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PcicError::UnexpectedResponse(format!(
                "expected <id><state>, got {text:?}"
            )));
        }
        let id = parse_number(Some(&text[..2]), "io id")? as u8;
        let high = match &text[2..] {
            "0" => false,
            "1" => true,
            other => {
                return Err(PcicError::UnexpectedResponse(format!(
                    "io state must be 0 or 1, got {other:?}"
                )))
            }
        };
        Ok(Self { id, high })
    }
}

/// Parsed `E?` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceError {
    pub code: u32,
    /// Documented message for the code, if any.
    pub message: Option<&'static str>,
}

impl DeviceError {
    pub fn parse(text: &str) -> Result<Self> {
        let code = parse_number(Some(text.trim()), "error code")?;
        Ok(Self {
            code,
            message: error_message(code),
        })
    }

    pub fn is_error(&self) -> bool {
        self.code != crate::error_codes::NO_ERROR
    }

    pub fn describe(&self) -> String {
        match self.message {
            Some(message) => message.to_string(),
            None => format!("unknown error code {}", self.code),
        }
    }
}

/// Parsed `V?` reply: `<current> <min> <max>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolVersion {
    pub current: u8,
    pub min: u8,
    pub max: u8,
}

impl ProtocolVersion {
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields = text.split_whitespace();
        let current = parse_number(fields.next(), "current version")? as u8;
        let min = parse_number(fields.next(), "min version")? as u8;
        let max = parse_number(fields.next(), "max version")? as u8;
        Ok(Self { current, min, max })
    }
}

/// Parsed `S?` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodingStatistics {
    /// Images taken since application start.
    pub results: u64,
    pub positive: u64,
    pub negative: u64,
}

impl DecodingStatistics {
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields = text.split(TAB).map(str::trim);
        let mut next = |what: &str| -> Result<u64> {
            let field = fields.next().unwrap_or_default();
            field.parse().map_err(|_| {
                PcicError::UnexpectedResponse(format!("{what} is not a number: {field:?}"))
            })
        };
        Ok(Self {
            results: next("result count")?,
            positive: next("positive decodings")?,
            negative: next("negative decodings")?,
        })
    }
}

/// Parsed `G?` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInformation {
    pub vendor: String,
    pub article_number: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub mac: String,
    pub dhcp: bool,
    /// Port of the remote configuration endpoint.
    pub rpc_port: Option<u16>,
}

impl DeviceInformation {
    /// Parse the tab-separated field list. Missing trailing fields stay empty.
    pub fn parse(text: &str) -> Self {
        let mut fields = text.split(TAB).map(|f| f.trim().to_string());
        let mut next = || fields.next().unwrap_or_default();
        Self {
            vendor: next(),
            article_number: next(),
            name: next(),
            location: next(),
            description: next(),
            ip: next(),
            subnet_mask: next(),
            gateway: next(),
            mac: next(),
            dhcp: next() == "1",
            rpc_port: next().parse().ok(),
        }
    }
}

fn parse_number(field: Option<&str>, what: &str) -> Result<u32> {
    let field = field.ok_or_else(|| PcicError::UnexpectedResponse(format!("missing {what}")))?;
    field
        .parse()
        .map_err(|_| PcicError::UnexpectedResponse(format!("{what} is not a number: {field:?}")))
}
