//! Listening-test web app
//!
//! Serves random sample sessions to evaluators and appends their scores to
//! flat JSONL files under the data directory.

use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::args::ServeArgs;
use crate::store;

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use state::{AppState, DataPaths};

/// Creates the data and voices directories and the two JSONL logs.
pub fn prepare_data_dir(paths: &DataPaths) -> Result<()> {
    fs::create_dir_all(&paths.data_dir)
        .with_context(|| format!("creating {}", paths.data_dir.display()))?;
    fs::create_dir_all(&paths.voices_dir)
        .with_context(|| format!("creating {}", paths.voices_dir.display()))?;
    store::touch(&paths.results)?;
    store::touch(&paths.session_log)?;
    Ok(())
}

pub async fn start_server(args: ServeArgs) -> Result<()> {
    let paths = DataPaths::from_args(&args);
    prepare_data_dir(&paths)?;

    let pool = store::load_pool(&paths.metadata)?;
    info!("Loaded {} samples", pool.len());
    info!("Data directory: {}", paths.data_dir.display());
    info!("Voices directory: {}", paths.voices_dir.display());
    info!("Samples per session: {}", args.session_size);

    let state = AppState::new(pool, paths, args.session_size);
    let app = routes::create_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
