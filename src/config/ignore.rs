// config/ignore.rs
use crate::error::{CleanupError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::{fs, io};

pub const IGNORE_FILE_NAME: &str = "config-cleanup.ignore";

/// Context names that are never probed and always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    contexts: BTreeSet<String>,
}

/// The ignore file is a ConfigMap; only `data.contexts` is read.
#[derive(Deserialize)]
struct IgnoreConfigMap {
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
}

impl IgnoreSet {
    pub fn contains(&self, context: &str) -> bool {
        self.contexts.contains(context)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn default_path(home: Option<&Path>) -> Option<PathBuf> {
        home.map(|home| home.join(".kube").join(IGNORE_FILE_NAME))
    }

    /// Reads the ignore file. A missing file is an empty set; anything
    /// else that goes wrong aborts the run.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).map_err(|e| CleanupError::yaml(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no ignore file at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(CleanupError::io(path, e)),
        }
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config_map: IgnoreConfigMap = serde_yaml::from_str(contents)?;
        let contexts = config_map
            .data
            .and_then(|mut data| data.remove("contexts"))
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self { contexts })
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            contexts: iter.into_iter().map(Into::into).collect(),
        }
    }
}
