// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SASS control flow graph CLI
//!
//! Reads an `nvdisasm` dump, builds one CFG per function, and writes the
//! encoded graphs as JSON to stdout.
//!
//! Usage:
//!     nvdisasm kernel.cubin | sass-graph --pretty > cfg.json

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use sass::{Highlighter, Markup, Theme};
use sass_graph::{
    BuildOptions, FallthroughPolicy, GraphError, Result, encode_all, generate_cfgs, load_theme,
    split_sections,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sass-graph")]
#[command(version, about = "Build per-function control flow graphs from SASS dumps")]
struct Cli {
    /// nvdisasm output to read (stdin when omitted or `-`)
    input: Option<PathBuf>,

    /// Only emit the graph of this function
    #[arg(short, long, value_name = "NAME")]
    function: Option<String>,

    /// JSON file overriding highlight colours
    #[arg(long, value_name = "FILE")]
    theme: Option<PathBuf>,

    /// Emit plain text lines instead of HTML spans
    #[arg(long)]
    plain: bool,

    /// Skip fallthrough edges after unguarded EXIT/BRA/RET
    #[arg(long)]
    terminator_aware: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let dump = read_input(cli.input.as_deref())?;

    let theme = match &cli.theme {
        Some(path) => load_theme(path)?,
        None => Theme::default(),
    };
    let markup = if cli.plain { Markup::Plain } else { Markup::Html };
    let highlighter = Highlighter::new(theme, markup);

    let options = BuildOptions {
        fallthrough: if cli.terminator_aware {
            FallthroughPolicy::UnlessTerminated
        } else {
            FallthroughPolicy::Always
        },
    };

    let sections = split_sections(&dump);
    let mut cfgs = generate_cfgs(&sections, &highlighter, &options);
    info!(sections = sections.len(), functions = cfgs.len(), "built CFGs");

    if let Some(function) = &cli.function {
        let graph = cfgs
            .shift_remove(function)
            .ok_or_else(|| GraphError::UnknownFunction(function.clone()))?;
        cfgs = [(function.clone(), graph)].into_iter().collect();
    }

    let encoded = encode_all(&cfgs);
    let json = if cli.pretty {
        serde_json::to_string_pretty(&encoded)?
    } else {
        serde_json::to_string(&encoded)?
    };
    println!("{json}");

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => Ok(fs::read_to_string(path)?),
        _ => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}
