//! Registry manifest.
//!
//! The manifest maps agent network files (relative to the manifest's
//! directory) to whether they are served:
//!
//! ```text
//! {
//!     "music_nerd_pro.hocon": true,
//!     "hello_world.hocon": { "serve": true, "public": false },
//!     "experimental.hocon": false
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One manifest value: a bare flag or a detailed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Enabled(bool),
    Detailed {
        #[serde(default = "default_true")]
        serve: bool,
        #[serde(default = "default_true")]
        public: bool,
    },
}

const fn default_true() -> bool {
    true
}

impl ManifestEntry {
    pub fn serve(&self) -> bool {
        match self {
            Self::Enabled(serve) | Self::Detailed { serve, .. } => *serve,
        }
    }

    pub fn public(&self) -> bool {
        match self {
            Self::Enabled(_) => true,
            Self::Detailed { public, .. } => *public,
        }
    }
}

/// A served agent network listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestAgent {
    /// Agent network name: the file name without its extension.
    pub name: String,
    /// Absolute path of the definition file.
    pub path: PathBuf,
    pub public: bool,
}

/// Parsed manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Resolve served entries against the manifest's directory.
    ///
    /// Entries whose file name has no usable stem are reported as errors.
    pub fn served_agents(&self, base_dir: &Path) -> Result<Vec<ManifestAgent>, String> {
        let mut agents = Vec::new();
        for (file, entry) in &self.entries {
            if !entry.serve() {
                continue;
            }
            agents.push(ManifestAgent {
                name: agent_name_for(file)?,
                path: base_dir.join(file),
                public: entry.public(),
            });
        }
        Ok(agents)
    }
}

/// Derive an agent network name from its manifest key.
///
/// `music_nerd_pro.hocon` → `music_nerd_pro`, `basic/hello.hocon` → `basic/hello`.
pub fn agent_name_for(file: &str) -> Result<String, String> {
    let trimmed = file.trim();
    let (dir, file_name) = match trimmed.rsplit_once('/') {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, trimmed),
    };
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    if stem.is_empty() {
        return Err(format!("manifest key '{file}' does not name an agent network"));
    }
    Ok(match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    })
}
