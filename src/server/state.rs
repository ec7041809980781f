use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::args::ServeArgs;
use crate::sample::SampleDescriptor;

/// Files the app reads and writes under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub static_dir: PathBuf,
    pub results: PathBuf,
    pub session_log: PathBuf,
    pub metadata: PathBuf,
}

impl DataPaths {
    pub fn from_args(args: &ServeArgs) -> Self {
        DataPaths {
            voices_dir: args.voices_dir(),
            static_dir: args.static_dir.clone(),
            results: args.data_dir.join("results.jsonl"),
            session_log: args.data_dir.join("session_log.jsonl"),
            metadata: args.data_dir.join("sample_metadata.json"),
            data_dir: args.data_dir.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup, never mutated.
    pub pool: Arc<Vec<SampleDescriptor>>,
    pub paths: Arc<DataPaths>,
    pub session_size: usize,
    // Serialises appends to the JSONL logs
    pub lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pool: Vec<SampleDescriptor>, paths: DataPaths, session_size: usize) -> Self {
        Self {
            pool: Arc::new(pool),
            paths: Arc::new(paths),
            session_size,
            lock: Arc::new(Mutex::new(())),
        }
    }
}
