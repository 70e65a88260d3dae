//! Server-declared script manifest and payload decoding.
//!
//! Pure functions only. The sync service decides what to do with a
//! [`Manifest`]; this module only says what the server sent.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::ManifestError;

/// Identity and expected content digest of one external script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub plugin: String,
    pub filename: String,
    /// SHA-256 hex digest of the script content.
    pub hash: String,
}

impl ScriptDescriptor {
    /// Reject descriptors whose names would escape `<root>/<plugin>/`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnsafeComponent`] naming the offending part.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for part in [&self.plugin, &self.filename] {
            if !is_plain_component(part) {
                return Err(ManifestError::UnsafeComponent(part.clone()));
            }
        }
        Ok(())
    }

    /// `<root>/<plugin>/<filename>`.
    #[must_use]
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.plugin).join(&self.filename)
    }
}

/// What the server said about the expected script set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    /// The server was unreachable or returned something unusable.
    Absent,
    /// The server's declared set, possibly empty.
    Present(Vec<ScriptDescriptor>),
}

impl Manifest {
    /// Interpret a manifest response.
    ///
    /// Anything other than a 200 carrying a JSON array of descriptors is
    /// [`Manifest::Absent`].
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        if status != 200 {
            return Self::Absent;
        }
        serde_json::from_slice::<Vec<ScriptDescriptor>>(body).map_or(Self::Absent, Self::Present)
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ScriptDescriptor] {
        match self {
            Self::Absent => &[],
            Self::Present(items) => items,
        }
    }

    /// Distinct plugin names among valid descriptors, sorted.
    #[must_use]
    pub fn plugins(&self) -> BTreeSet<&str> {
        self.valid()
            .map(|d| d.plugin.as_str())
            .collect()
    }

    /// `(plugin, filename)` pairs that must survive pruning.
    #[must_use]
    pub fn keep_set(&self) -> HashSet<(&str, &str)> {
        self.valid()
            .map(|d| (d.plugin.as_str(), d.filename.as_str()))
            .collect()
    }

    fn valid(&self) -> impl Iterator<Item = &ScriptDescriptor> {
        self.descriptors().iter().filter(|d| d.validate().is_ok())
    }
}

#[derive(Deserialize)]
struct ScriptPayload {
    content: String,
}

/// Extract the script source from a `get-script` response body.
///
/// # Errors
///
/// Returns an error if the body is not a JSON array whose first element
/// carries a `content` string.
pub fn parse_script_content(body: &[u8]) -> Result<String, ManifestError> {
    let mut items: Vec<ScriptPayload> = serde_json::from_slice(body)?;
    if items.is_empty() {
        return Err(ManifestError::MissingContent);
    }
    Ok(items.swap_remove(0).content)
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
