/* 📖 # Why have bananadb_base as a core library?
bananadb_base provides the error type, tracing setup and the platform abstraction layer
used by the engine and the CLI. Keeping them here prevents circular dependencies and lets
the engine be tested entirely against the in-memory MockPal.
*/

pub mod error;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{BananaError, BananaResult, ErrorKind, ResultExt};
pub use pal::{FilePath, MockPal, Pal, PalHandle, RealPal};
