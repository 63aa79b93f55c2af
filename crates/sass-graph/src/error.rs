// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the dump-to-graph pipeline.
//!
//! Building a graph never fails; these cover loading inputs and writing
//! output at the boundary.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A theme file that is not a JSON theme object.
    #[error("invalid theme file {}: {source}", path.display())]
    Theme {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A requested function has no `.text.` section in the dump.
    #[error("function '{0}' not found in dump")]
    UnknownFunction(String),
}

/// Result type alias for the graph pipeline.
pub type Result<T> = std::result::Result<T, GraphError>;
