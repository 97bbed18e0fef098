use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synthdoc_generate::{DeliveryMode, GenerateOptions, LocaleKey};

use crate::CliError;

pub const DEFAULT_CONFIG: &str = "synthdoc.toml";

/// Contents of `synthdoc.toml`. Every field is optional; flags win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub generate: GenerateSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateSettings {
    pub mode: Option<DeliveryMode>,
    pub concurrency: Option<usize>,
    pub count: Option<u64>,
    pub seed: Option<u64>,
    pub strict: Option<bool>,
    pub locale: Option<LocaleKey>,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    pub json: Option<bool>,
    pub file: Option<PathBuf>,
}

/// Command-line values that may override the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<DeliveryMode>,
    pub concurrency: Option<usize>,
    pub count: Option<u64>,
    pub seed: Option<u64>,
    pub strict: bool,
    pub locale: Option<LocaleKey>,
    pub out: Option<PathBuf>,
    pub log_json: bool,
    pub log_file: Option<PathBuf>,
}

/// Read the config file. A missing default file is fine; a missing file
/// named with `--config` is not.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    if !path.exists() {
        if explicit {
            return Err(CliError::InvalidConfig(format!(
                "config file {} not found",
                path.display()
            )));
        }
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}

pub fn parse_settings(content: &str) -> Result<Settings, CliError> {
    Ok(toml::from_str(content)?)
}

impl Settings {
    /// Apply flags on top of the file.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        let generate = &mut self.generate;
        generate.mode = overrides.mode.or(generate.mode);
        generate.concurrency = overrides.concurrency.or(generate.concurrency);
        generate.count = overrides.count.or(generate.count);
        generate.seed = overrides.seed.or(generate.seed);
        if overrides.strict {
            generate.strict = Some(true);
        }
        generate.locale = overrides.locale.or(generate.locale);
        generate.out = overrides.out.or(generate.out.take());

        if overrides.log_json {
            self.logging.json = Some(true);
        }
        self.logging.file = overrides.log_file.or(self.logging.file.take());
        self
    }

    pub fn generate_options(&self) -> GenerateOptions {
        let generate = &self.generate;
        GenerateOptions {
            mode: generate.mode.unwrap_or_default(),
            concurrency: generate.concurrency,
            count_override: generate.count,
            seed_override: generate.seed,
            strict: generate.strict.unwrap_or(false),
            locale: generate.locale.unwrap_or_default(),
        }
    }

    pub fn log_json(&self) -> bool {
        self.logging.json.unwrap_or(false)
    }
}
