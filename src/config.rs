// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{path::Path, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::emitter::{DEFAULT_DURATION_UNIT, DEFAULT_LATE_NOTE_OFFSET};

/// Typed error for config load/parse failures so callers can distinguish
/// e.g. file-not-found from parse errors without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

/// A YAML representation of the emitter configuration.
#[derive(Deserialize, Clone)]
pub struct Emitter {
    /// The MIDI output device.
    device: String,

    /// How long one duration tick lasts, in milliseconds.
    duration_unit: Option<u64>,

    /// How long to defer retriggered notes after a flush, e.g. "5ms".
    late_note_offset: Option<String>,
}

impl Emitter {
    /// New will create a new emitter configuration.
    pub fn new(device: &str, duration_unit: Option<u64>, late_note_offset: Option<String>) -> Emitter {
        Emitter {
            device: device.to_string(),
            duration_unit,
            late_note_offset,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the duration unit from the configuration.
    pub fn duration_unit(&self) -> Duration {
        self.duration_unit
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DURATION_UNIT)
    }

    /// Returns the late note offset from the configuration.
    pub fn late_note_offset(&self) -> Result<Duration, ConfigError> {
        match &self.late_note_offset {
            Some(late_note_offset) => DurationString::from_string(late_note_offset.clone())
                .map(|duration| duration.into())
                .map_err(|_| ConfigError::InvalidDuration(late_note_offset.clone())),
            None => Ok(DEFAULT_LATE_NOTE_OFFSET),
        }
    }
}

/// Parses an emitter configuration from a YAML file.
pub fn load(path: &Path) -> Result<Emitter, ConfigError> {
    Ok(config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize::<Emitter>()?)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::{ConfigError, Emitter};

    fn parse(yaml: &str) -> Result<Emitter, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Emitter>()?)
    }

    #[test]
    fn full_config() -> Result<(), ConfigError> {
        let emitter = parse(
            r#"
            device: UM-ONE
            duration_unit: 20
            late_note_offset: 5ms
        "#,
        )?;

        assert_eq!("UM-ONE", emitter.device());
        assert_eq!(Duration::from_millis(20), emitter.duration_unit());
        assert_eq!(Duration::from_millis(5), emitter.late_note_offset()?);
        Ok(())
    }

    #[test]
    fn defaults() -> Result<(), ConfigError> {
        let emitter = parse("device: UM-ONE")?;

        assert_eq!(Duration::from_millis(16), emitter.duration_unit());
        assert_eq!(Duration::ZERO, emitter.late_note_offset()?);
        Ok(())
    }

    #[test]
    fn invalid_late_note_offset() -> Result<(), ConfigError> {
        let emitter = parse(
            r#"
            device: UM-ONE
            late_note_offset: not-a-duration
        "#,
        )?;

        assert!(matches!(
            emitter.late_note_offset(),
            Err(ConfigError::InvalidDuration(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_device_is_an_error() {
        assert!(parse("duration_unit: 20").is_err());
    }
}
