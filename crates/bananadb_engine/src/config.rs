use bananadb_base::FilePath;

pub const DEFAULT_FILE: &str = "db.json";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Backing JSON file, relative to the PAL's base directory.
    pub file: FilePath,
    /// Interface to bind.
    pub host: String,
    /// Preferred port; the following ports are tried when it is taken.
    pub port: u16,
    /// Whether to send CORS headers and answer preflight requests.
    pub enable_cors: bool,
}

impl ServerConfig {
    pub fn new(file: impl Into<FilePath>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            file: FilePath::from(DEFAULT_FILE),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            enable_cors: true,
        }
    }
}
