/* 📖 # What is the Platform Abstraction Layer?

The PAL is the only place that touches the filesystem, the file watcher and the network.
RealPal is what the CLI runs on; MockPal keeps everything in memory and lets tests decide
when file change notifications are delivered.
*/

mod file_path;
pub mod http;
pub mod mock;
pub mod real_pal;
mod traits;

pub use file_path::FilePath;
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal, PalHandle};
