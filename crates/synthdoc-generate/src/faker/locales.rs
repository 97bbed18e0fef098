use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocaleKey {
    #[default]
    #[serde(rename = "en_US")]
    EnUs,
    #[serde(rename = "pt_BR")]
    PtBr,
}

impl LocaleKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en_US" | "en" => Some(Self::EnUs),
            "pt_BR" | "pt" => Some(Self::PtBr),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en_US",
            Self::PtBr => "pt_BR",
        }
    }
}

impl FromStr for LocaleKey {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            GenerationError::InvalidParams(format!("unsupported faker locale '{value}'"))
        })
    }
}

impl fmt::Display for LocaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
