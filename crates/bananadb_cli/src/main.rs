/* 📖 # Why does the PAL root at the database file's directory?

The engine addresses its file through a FilePath relative to the PAL base directory,
and the watcher observes the directory holding that file. Rooting RealPal at the file's
parent makes both work the same for `bananadb`, `bananadb -d data/api.json` and an
absolute path.

Exit codes:
- 1: the server could not start (no free port, unwritable database file, bad path)
- otherwise the process runs until it is terminated
*/

use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use bananadb_base::pal::real_pal::parent_or_current;
use bananadb_base::tracing::init_tracing;
use bananadb_base::{FilePath, PalHandle, RealPal};
use bananadb_engine::config::{DEFAULT_FILE, DEFAULT_HOST, DEFAULT_PORT};
use bananadb_engine::{ServerConfig, start_server};
use clap::Parser;
use tracing::{debug, error, info};

/// A lightweight JSON database and REST API mock server.
#[derive(Debug, Parser)]
#[command(name = "bananadb", version, about)]
struct Cli {
    /// Port to run the server on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// JSON file to serve
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_FILE)]
    db: PathBuf,

    /// Alias for --db (JSON file to serve)
    #[arg(short, long, value_name = "FILE")]
    watch: Option<PathBuf>,

    /// Disable CORS (enabled by default)
    #[arg(long)]
    no_cors: bool,

    /// Interface to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
}

impl Cli {
    /// The database file; `--watch` takes precedence over `--db`.
    fn db_file(&self) -> &Path {
        self.watch.as_deref().unwrap_or(&self.db)
    }

    /// Split the database path into the PAL base directory and the engine configuration.
    fn server_config(&self) -> Result<(PathBuf, ServerConfig), String> {
        let db_file = self.db_file();
        let file_name = db_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("Not a valid database file path: {}", db_file.display()))?;
        let config = ServerConfig::new(FilePath::from(file_name))
            .with_host(self.host.as_str())
            .with_port(self.port)
            .with_cors(!self.no_cors);
        Ok((parent_or_current(db_file), config))
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: {}", e);
    }
    debug!(?cli, "starting");

    let (base_dir, config) = match cli.server_config() {
        Ok(resolved) => resolved,
        Err(message) => {
            error!("{message}");
            process::exit(1);
        }
    };

    let pal = PalHandle::new(RealPal::new(base_dir.clone()));
    let server = match start_server(pal, config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start BananaDB: {e}");
            debug!("{e:?}");
            process::exit(1);
        }
    };
    info!(port = server.port(), dir = %base_dir.display(), "Watching for changes");

    // The server thread and the watcher run in the background; keep the handle alive.
    loop {
        thread::park();
    }
}
