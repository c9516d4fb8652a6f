use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Config file {path:?} could not be read.")]
	ReadConfig { path: PathBuf, source: std::io::Error },
	#[error("Config file {path:?} is not valid TOML for this service.")]
	ParseConfig { path: PathBuf, source: toml::de::Error },
	/// A value outside its allowed range; the message names the offending key.
	#[error("Invalid config: {message}")]
	Validation { message: String },
}
