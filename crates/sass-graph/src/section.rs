// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Splitting an `nvdisasm` dump into named sections.
//!
//! Sections are introduced by separator lines of the form
//!
//! ```text
//! //--------------------- .text._Z6kernelPi  --------------------------
//! ```
//!
//! The section name is the text between the separator and the next `-`,
//! trimmed. Function bodies live in sections named `.text.<symbol>`.

use indexmap::IndexMap;
use tracing::warn;

/// Prefix of every section separator line.
pub const SEPARATOR: &str = "//---------------------";

/// Prefix of sections that hold function code.
pub const FUNCTION_PREFIX: &str = ".text.";

/// Named sections of a dump, borrowing from the dump text.
///
/// Iteration order is the order of each name's last occurrence.
#[derive(Debug, Default)]
pub struct Sections<'a> {
    sections: IndexMap<&'a str, Vec<&'a str>>,
    duplicates: Vec<&'a str>,
}

impl<'a> Sections<'a> {
    /// Split a dump into sections.
    ///
    /// Lines before the first separator are discarded and separator lines are
    /// not stored. When a name recurs, only its last section is kept.
    pub fn parse(dump: &'a str) -> Self {
        let mut sections: IndexMap<&'a str, Vec<&'a str>> = IndexMap::new();
        let mut duplicates = Vec::new();
        let mut current: Option<(&'a str, Vec<&'a str>)> = None;

        let mut close = |section: Option<(&'a str, Vec<&'a str>)>| {
            if let Some((name, lines)) = section {
                if sections.shift_remove(name).is_some() {
                    warn!(section = name, "duplicate section, keeping the last occurrence");
                    duplicates.push(name);
                }
                sections.insert(name, lines);
            }
        };

        for line in dump.lines() {
            if let Some(rest) = line.strip_prefix(SEPARATOR) {
                close(current.take());
                current = Some((Self::section_name(rest), Vec::new()));
                continue;
            }

            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
        close(current.take());

        Self {
            sections,
            duplicates,
        }
    }

    /// Name portion of a separator line (text after the separator).
    ///
    /// A separator with no trailing dashes names the whole remainder.
    fn section_name(rest: &str) -> &str {
        let end = rest.find('-').unwrap_or(rest.len());
        rest[..end].trim()
    }

    /// Lines of a section.
    pub fn get(&self, name: &str) -> Option<&[&'a str]> {
        self.sections.get(name).map(Vec::as_slice)
    }

    /// Iterate over `(name, lines)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &[&'a str])> + '_ {
        self.sections.iter().map(|(&name, lines)| (name, lines.as_slice()))
    }

    /// Iterate over function sections as `(function_name, lines)`.
    ///
    /// The function name is the section name without [`FUNCTION_PREFIX`].
    pub fn functions(&self) -> impl Iterator<Item = (&'a str, &[&'a str])> + '_ {
        self.iter()
            .filter_map(|(name, lines)| name.strip_prefix(FUNCTION_PREFIX).map(|f| (f, lines)))
    }

    /// Names that occurred more than once, in order of recurrence.
    pub fn duplicates(&self) -> &[&'a str] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Split a dump into sections. See [`Sections::parse`].
pub fn split_sections(dump: &str) -> Sections<'_> {
    Sections::parse(dump)
}
