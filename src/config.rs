//! Optional JSON configuration file.
//!
//! Deserialization goes through `serde_path_to_error`, so a bad value is
//! reported with the JSON path that holds it.
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::compile::CompileSettings;
use crate::emit::EmitOptions;
use crate::error::{CompileError, Result};
use crate::policy::RequiredPolicy;
use crate::sample::SampleOptions;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "decl-schema.json";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub strict_null_checks: bool,
    pub force_all_required: bool,
    pub no_extra_props: bool,
    pub emit_extensions: bool,
    pub examples: SampleOptions,
}

impl Config {
    pub fn from_json(src: &str) -> Result<Self> {
        let config: Config = from_str_with_path(src).map_err(CompileError::Config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        Self::from_json(&src).map_err(|e| match e {
            CompileError::Config(message) => CompileError::Config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// `explicit` if given; otherwise the default file when it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(Path::new(DEFAULT_CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let rate = self.examples.optional_inclusion;
        if !(0.0..=1.0).contains(&rate) {
            return Err(CompileError::Config(format!(
                "examples.optional_inclusion must lie in [0, 1], got {rate}"
            )));
        }
        if self.examples.max_array_len == 0 {
            return Err(CompileError::Config("examples.max_array_len must be at least 1".into()));
        }
        Ok(())
    }

    pub fn settings(&self) -> CompileSettings {
        CompileSettings {
            policy: RequiredPolicy {
                strict_null_checks: self.strict_null_checks,
                force_all_required: self.force_all_required,
            },
            emit: EmitOptions { no_extra_props: self.no_extra_props, emit_extensions: self.emit_extensions },
            sample: self.examples.clone(),
            ..CompileSettings::default()
        }
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> std::result::Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        format!("at JSON path {path} → {}", err.into_inner())
    })
}
