use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_SCHEDULE_DIR: &str = "schedule";
pub const DEFAULT_EXCEPTION_CATEGORY: &str = "Exception schedule";
pub const DEFAULT_DAY_START_HOUR: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to parse {path}: {source}")]
	Decode {
		path: PathBuf,
		source: toml::de::Error,
	},
	#[error("day_start_hour must be between 0 and 23, got {0}")]
	InvalidDayStartHour(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Hour of day (local time) at which a new tracking day begins.
	pub day_start_hour: u32,
	/// Directory holding `categories.txt` and one task file per category.
	pub schedule_dir: Option<PathBuf>,
	pub exception_category: String,
	/// Position of the exception category in the category list.
	pub exception_position: usize,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			day_start_hour: DEFAULT_DAY_START_HOUR,
			schedule_dir: None,
			exception_category: DEFAULT_EXCEPTION_CATEGORY.to_string(),
			exception_position: 0,
		}
	}
}

impl Settings {
	pub fn schedule_dir(&self, state_dir: &Path) -> PathBuf {
		match &self.schedule_dir {
			Some(path) if path.is_absolute() => path.clone(),
			Some(path) => state_dir.join(path),
			None => state_dir.join(DEFAULT_SCHEDULE_DIR),
		}
	}

	fn validate(self) -> Result<Self, ConfigError> {
		if self.day_start_hour > 23 {
			return Err(ConfigError::InvalidDayStartHour(self.day_start_hour));
		}
		Ok(self)
	}
}

pub fn load_settings(state_dir: &Path) -> Result<Settings, ConfigError> {
	let path = state_dir.join(CONFIG_FILE);
	let raw = match fs::read_to_string(&path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
		Err(source) => return Err(ConfigError::Io { path, source }),
	};

	let settings: Settings = toml::from_str(&raw).map_err(|source| ConfigError::Decode {
		path: path.clone(),
		source,
	})?;
	settings.validate()
}

pub fn resolve_state_dir(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("SCHEDULE_TIMER_STATE_DIR") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	default_state_dir()
}

fn default_state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join("schedule_timer");
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join("schedule_timer");
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join("schedule_timer");
	}

	PathBuf::from(".schedule_timer")
}

fn absolutize(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		return path;
	}

	match env::current_dir() {
		Ok(cwd) => cwd.join(path),
		Err(_) => path,
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use super::{ConfigError, DEFAULT_DAY_START_HOUR, Settings, load_settings};

	#[test]
	fn missing_config_falls_back_to_defaults() {
		let dir = temp_dir("schedule_timer_config_missing");
		let settings = load_settings(&dir).expect("defaults should load");
		assert_eq!(settings, Settings::default());
		assert_eq!(settings.day_start_hour, DEFAULT_DAY_START_HOUR);
		assert_eq!(settings.schedule_dir(&dir), dir.join("schedule"));
	}

	#[test]
	fn reads_partial_config_and_rejects_bad_hour() {
		let dir = temp_dir("schedule_timer_config_partial");
		fs::create_dir_all(&dir).expect("temp dir");
		fs::write(dir.join("config.toml"), "day_start_hour = 6\nschedule_dir = \"plans\"\n")
			.expect("write config");
		let settings = load_settings(&dir).expect("config should load");
		assert_eq!(settings.day_start_hour, 6);
		assert_eq!(settings.schedule_dir(&dir), dir.join("plans"));
		assert_eq!(settings.exception_position, 0);

		fs::write(dir.join("config.toml"), "day_start_hour = 24\n").expect("write config");
		assert!(matches!(
			load_settings(&dir),
			Err(ConfigError::InvalidDayStartHour(24))
		));
		let _ = fs::remove_dir_all(dir);
	}

	fn temp_dir(name: &str) -> PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("{}_{}", name, std::process::id()));
		path
	}
}
