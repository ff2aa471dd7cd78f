use relative_path::{RelativePath, RelativePathBuf};
use std::path::{Path, PathBuf};

/* 📖 # Why use RelativePathBuf for FilePath?

Every path the engine hands to the PAL is relative to the PAL's base directory (for the
CLI: the directory holding the JSON file). RelativePathBuf makes that explicit in the
type, and keeps watch events comparable with the path that was registered.
*/

/// Type-safe wrapper for file paths relative to the PAL base directory.
///
/// ```
/// use bananadb_base::FilePath;
///
/// let path = FilePath::from("db.json");
/// assert_eq!(path.file_name(), Some("db.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath(RelativePathBuf);

impl FilePath {
    pub fn as_relative(&self) -> &RelativePath {
        &self.0
    }

    /// Converts to a regular Path, without any base directory.
    pub fn as_path(&self) -> &Path {
        Path::new(self.as_relative().as_str())
    }

    /// Resolve against a base directory.
    pub fn to_path(&self, base: &Path) -> PathBuf {
        self.0.to_path(base)
    }

    /// The final component of the path, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }
}

impl From<&str> for FilePath {
    fn from(s: &str) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<String> for FilePath {
    fn from(s: String) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<&Path> for FilePath {
    fn from(p: &Path) -> Self {
        Self(RelativePathBuf::from(p.to_string_lossy().into_owned()))
    }
}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<RelativePath> for FilePath {
    fn as_ref(&self) -> &RelativePath {
        &self.0
    }
}
