//! # Domain: the context a manager runs under.
//!
//! A [`Domain`] bundles the state directory (where the state document and
//! the admin socket live) with the ordered list of load paths scanned for
//! manifests at startup. It is immutable after construction.

use std::fmt;
use std::path::{Path, PathBuf};

/// The per-user or system context a manager operates in.
///
/// Load paths may point at directories (iterated non-recursively) or at
/// single manifest files. Paths are expected to be already resolved; no
/// tilde expansion is performed.
#[derive(Clone, Debug)]
pub struct Domain {
    statedir: PathBuf,
    load_paths: Vec<PathBuf>,
}

impl Domain {
    /// Creates a new domain.
    pub fn new(statedir: impl Into<PathBuf>, load_paths: Vec<PathBuf>) -> Self {
        Self {
            statedir: statedir.into(),
            load_paths,
        }
    }

    /// The directory holding the state document and the admin socket.
    pub fn statedir(&self) -> &Path {
        &self.statedir
    }

    /// The manifest locations scanned at startup, in order.
    pub fn load_paths(&self) -> &[PathBuf] {
        &self.load_paths
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statedir={}", self.statedir.display())?;
        if !self.load_paths.is_empty() {
            write!(f, " load_paths=[")?;
            for (i, path) in self.load_paths.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", path.display())?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
