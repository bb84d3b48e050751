//! Top-level error type for the CLI binary.

use thiserror::Error;

/// Everything that can send the CLI to a non-zero exit.
#[derive(Debug, Error)]
pub enum CliError {
    /// Could not read the configuration file from disk.
    #[error("failed to read config file `{path}`: {source}")]
    ReadConfig {
        /// The path that was requested.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not valid JSON or didn't match the
    /// `ConfigDocument` shape.
    #[error("failed to parse config file `{path}`: {source}")]
    ParseConfig {
        /// The path that was requested.
        path: String,
        /// The underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },

    /// Compiling or stepping the simulation failed.
    #[error(transparent)]
    Simulation(#[from] sse::SimulationError),

    /// A `--model` value didn't match a known provider prefix and no
    /// adapter could be selected.
    #[error("no sampler available for model `{0}` (expected a `gpt-` or `claude-` prefix, or omit --live)")]
    UnknownModelPrefix(String),

    /// Writing the result snapshot failed.
    #[error("failed to write snapshot `{path}`: {source}")]
    WriteSnapshot {
        /// The path that was written to.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
