use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;

/// How the container image replaces the previous one on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// write a sibling temp file, then rename it over the container
    #[default]
    Atomic,

    /// truncate and rewrite the container file in place
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    pub path: PathBuf,

    #[serde(default)]
    pub write_mode: WriteMode,
}

impl ContainerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_mode: WriteMode::default(),
        }
    }

    pub fn with_write_mode(self, write_mode: WriteMode) -> Self {
        Self { write_mode, ..self }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);

        Ok(serde_json::from_reader(reader)?)
    }
}
