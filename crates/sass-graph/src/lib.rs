// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control flow graphs from `nvdisasm` SASS dumps
//!
//! The pipeline has three stages:
//! 1. [`split_sections`] cuts the dump into named sections
//! 2. [`build_function_cfg`] turns each `.text.<function>` section into a
//!    [`CfgGraph`] of highlighted basic blocks
//! 3. [`CfgGraph::encode`] projects the graph into a JSON-serializable form
//!
//! [`generate_cfgs`] runs stage 2 for every function in parallel.
//!
//! # Example
//!
//! ```
//! use sass::Highlighter;
//! use sass_graph::{BuildOptions, encode_all, generate_cfgs, split_sections};
//!
//! let dump = "//--------------------- .text.k ----\nk:\n.text.k:\n  /*0000*/ EXIT ;\n";
//! let sections = split_sections(dump);
//! let cfgs = generate_cfgs(&sections, &Highlighter::plain(), &BuildOptions::default());
//! let encoded = encode_all(&cfgs);
//! assert_eq!(encoded["k"]["entry"].lines, vec!["EXIT"]);
//! ```

use std::{fs, path::Path};

use indexmap::IndexMap;
use rayon::prelude::*;
use sass::{Highlighter, Theme};
use tracing::debug;

pub mod builder;
pub mod error;
pub mod graph;
pub mod section;

pub use builder::{BuildOptions, FallthroughPolicy, build_function_cfg};
pub use error::{GraphError, Result};
pub use graph::{CfgGraph, ENTRY, EncodedGraph, EncodedNode, Node};
pub use section::{Sections, split_sections};

/// Build the CFG of every function section.
///
/// Functions are built in parallel; the result follows section order.
pub fn generate_cfgs(
    sections: &Sections<'_>,
    highlighter: &Highlighter,
    options: &BuildOptions,
) -> IndexMap<String, CfgGraph> {
    let functions: Vec<(&str, &[&str])> = sections.functions().collect();

    let graphs: Vec<(String, CfgGraph)> = functions
        .par_iter()
        .map(|&(name, lines)| {
            let graph = build_function_cfg(name, lines, highlighter, options);
            debug!(function = name, blocks = graph.len(), "built CFG");
            (name.to_string(), graph)
        })
        .collect();

    graphs.into_iter().collect()
}

/// Encode every graph: function name to node name to encoded node.
pub fn encode_all(cfgs: &IndexMap<String, CfgGraph>) -> IndexMap<String, EncodedGraph> {
    cfgs.iter()
        .map(|(name, graph)| (name.clone(), graph.encode()))
        .collect()
}

/// Split, build and encode a whole dump in one call.
pub fn process_dump(
    dump: &str,
    highlighter: &Highlighter,
    options: &BuildOptions,
) -> IndexMap<String, EncodedGraph> {
    let sections = split_sections(dump);
    encode_all(&generate_cfgs(&sections, highlighter, options))
}

/// Load a [`Theme`] from a JSON file. Omitted colours keep their defaults.
pub fn load_theme(path: &Path) -> Result<Theme> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| GraphError::Theme {
        path: path.to_path_buf(),
        source,
    })
}
