//! TTS QA toolkit: batch sample generation against the vendor TTS API, the
//! listening-test web app, and score analysis over evaluator results.

pub mod analysis;
pub mod args;
pub mod audio;
pub mod catalog;
pub mod chart;
pub mod comments;
pub mod evaluation;
pub mod generate;
pub mod report;
pub mod sample;
pub mod server;
pub mod stats;
pub mod store;
pub mod tts;
