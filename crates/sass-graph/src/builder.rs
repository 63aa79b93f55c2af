// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! CFG builder for one function section
//!
//! Builds the graph in a single linear pass over the section lines:
//! - Instruction lines (containing `/*`) are parsed, rendered and appended to
//!   the current block. `BRA <label>` adds an edge to the label.
//! - Label lines (`.L_x_0:`) start a new block. The block before it gets a
//!   fallthrough edge, subject to [`FallthroughPolicy`].
//! - Everything else (directives, blank lines) is ignored.

use sass::{Highlighter, ParsedLine, StyleClass, parse_line};
use tracing::{debug, warn};

use crate::graph::{CfgGraph, Node};

/// Substring that marks an instruction line (`/*0040*/ ...`).
pub const INSTRUCTION_MARKER: &str = "/*";

/// When a block gets an edge to the label that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallthroughPolicy {
    /// Every label gets an edge from the block before it.
    #[default]
    Always,
    /// No edge when the previous block ends in an unguarded terminator
    /// (`BRA`, `EXIT`, `RET`, ...).
    UnlessTerminated,
}

/// Options for [`build_function_cfg`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub fallthrough: FallthroughPolicy,
}

/// Build the CFG of `function_name` from the lines of its `.text.` section.
///
/// Never fails: lines that do not parse are kept as plain text (without the
/// encoding comment and `;`), and a section without instructions yields a
/// graph holding only the entry node.
pub fn build_function_cfg(
    function_name: &str,
    lines: &[&str],
    highlighter: &Highlighter,
    options: &BuildOptions,
) -> CfgGraph {
    CfgBuilder::new(function_name, highlighter, options).build(lines)
}

/// Builder state for one function
struct CfgBuilder<'a> {
    function: &'a str,
    highlighter: &'a Highlighter,
    options: &'a BuildOptions,
    graph: CfgGraph,
    /// Position of the block receiving lines.
    current: usize,
    /// Whether the last parsed instruction of the current block ends it.
    terminated: bool,
}

impl<'a> CfgBuilder<'a> {
    fn new(function: &'a str, highlighter: &'a Highlighter, options: &'a BuildOptions) -> Self {
        Self {
            function,
            highlighter,
            options,
            graph: CfgGraph::new(),
            current: 0,
            terminated: false,
        }
    }

    fn build(mut self, lines: &[&str]) -> CfgGraph {
        for &line in self.body(lines) {
            if line.contains(INSTRUCTION_MARKER) {
                if let Some(text) = extract_instruction(line) {
                    self.add_instruction(text);
                }
            } else if let Some(label) = label_declaration(line) {
                self.add_label(line.trim(), label);
            }
        }

        self.graph
    }

    /// Lines after the function label and the `.text.<name>:` line below it.
    fn body<'l>(&self, lines: &'l [&'l str]) -> &'l [&'l str] {
        let label = format!("{}:", self.function);
        match lines.iter().position(|line| line.trim() == label) {
            Some(index) => &lines[(index + 2).min(lines.len())..],
            None => {
                warn!(function = self.function, "function label not found, using whole section");
                lines
            }
        }
    }

    fn add_instruction(&mut self, text: &str) {
        let (rendered, target, ends_block) = match parse_line(text) {
            ParsedLine::Parsed(instruction) => (
                self.highlighter.highlight(&instruction),
                instruction.branch_target().map(str::to_string),
                Some(instruction.ends_block()),
            ),
            ParsedLine::Unparsed { text, error } => {
                debug!(function = self.function, line = %text, %error, "keeping unparsed instruction");
                (text, None, None)
            }
        };

        if let Some(ends_block) = ends_block {
            self.terminated = ends_block;
        }

        let Some(block) = self.graph.node_mut(self.current) else {
            return;
        };
        block.push_line(rendered);
        if let Some(target) = target {
            block.push_edge(target);
        }
    }

    fn add_label(&mut self, line: &str, label: &str) {
        let name = node_name(label);

        let fallthrough = match self.options.fallthrough {
            FallthroughPolicy::Always => true,
            FallthroughPolicy::UnlessTerminated => !self.terminated,
        };
        if fallthrough {
            if let Some(previous) = self.graph.node_mut(self.current) {
                previous.push_edge(name);
            }
        }

        if self.graph.node(name).is_some() {
            warn!(function = self.function, label = name, "label declared twice, replacing block");
        }

        let mut node = Node::new(name);
        node.push_line(self.highlighter.styled(StyleClass::Constant, line));
        self.current = self.graph.add_node(node);
        self.terminated = false;
    }
}

/// Instruction text of a marker line.
///
/// Takes the text after the first `*/`, dropping a trailing encoding comment
/// and `;`. Returns None for encoding continuation lines.
fn extract_instruction(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once("*/")?;

    let mut text = rest.trim();
    if let Some(comment) = text.find(INSTRUCTION_MARKER) {
        text = text[..comment].trim_end();
    }
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();

    (!text.is_empty()).then_some(text)
}

/// The label declared by a `name:` line.
fn label_declaration(line: &str) -> Option<&str> {
    line.trim()
        .strip_suffix(':')
        .filter(|label| !label.is_empty() && !label.contains(char::is_whitespace))
}

/// Node name for a label, matching the names branch operands resolve to.
fn node_name(label: &str) -> &str {
    label.strip_prefix('.').unwrap_or(label)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::ENTRY;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    fn build_plain(function: &str, text: &str, fallthrough: FallthroughPolicy) -> CfgGraph {
        build_function_cfg(
            function,
            &lines(text),
            &Highlighter::plain(),
            &BuildOptions { fallthrough },
        )
    }

    fn names(graph: &CfgGraph) -> Vec<&str> {
        graph.nodes().map(Node::name).collect()
    }

    const LOOP: &str = indoc! {"
                .global         _Z4loopPi
                .type           _Z4loopPi,@function
        _Z4loopPi:
        .text._Z4loopPi:
                /*0000*/                   MOV R1, c[0x0][0x28] ;                  /* 0x00000a0000017a02 */
                                                                                   /* 0x000fc40000000f00 */
                /*0010*/                   ISETP.GE.AND P0, PT, R0, 0x10, PT ;     /* 0x000000100000780c */
                /*0020*/               @P0 EXIT ;                                  /* 0x000000000000094d */
        .L_x_0:
                /*0030*/                   IADD3 R0, R0, 0x1, RZ ;                 /* 0x0000000100007810 */
                /*0040*/                   ISETP.GE.AND P0, PT, R0, 0x10, PT ;     /* 0x000000100000780c */
                /*0050*/              @!P0 BRA `(.L_x_0) ;                         /* 0xfffffff000008947 */
                /*0060*/                   EXIT ;                                  /* 0x000000000000794d */
        .L_x_1:
                /*0070*/                   BRA `(.L_x_1);                          /* 0xfffffff000007947 */
    "};

    #[test]
    fn test_loop_graph() {
        let graph = build_plain("_Z4loopPi", LOOP, FallthroughPolicy::Always);

        assert_eq!(names(&graph), vec!["entry", "L_x_0", "L_x_1"]);
        assert_eq!(
            graph.entry().lines(),
            &[
                "MOV R1, c[0x0][0x28]".to_string(),
                "ISETP.GE.AND P0, PT, R0, 0x10, PT".to_string(),
                "@P0 EXIT".to_string(),
            ]
        );
        assert_eq!(graph.entry().edges(), &["L_x_0".to_string()]);

        let body = graph.node("L_x_0").unwrap();
        assert_eq!(body.lines()[0], ".L_x_0:");
        assert_eq!(body.lines().len(), 5);
        assert_eq!(body.edges(), &["L_x_0".to_string(), "L_x_1".to_string()]);

        let tail = graph.node("L_x_1").unwrap();
        assert_eq!(tail.edges(), &["L_x_1".to_string()]);
    }

    #[test]
    fn test_unless_terminated_drops_fallthrough_after_exit() {
        let graph = build_plain("_Z4loopPi", LOOP, FallthroughPolicy::UnlessTerminated);

        // Guarded EXIT does not end the block
        assert_eq!(graph.entry().edges(), &["L_x_0".to_string()]);
        // Unguarded EXIT does
        assert_eq!(graph.node("L_x_0").unwrap().edges(), &["L_x_0".to_string()]);
        assert_eq!(graph.unreachable_nodes(), vec!["L_x_1"]);
    }

    #[test]
    fn test_unless_terminated_after_unguarded_branch() {
        let text = indoc! {"
            f:
            .text.f:
                /*0000*/ BRA `(.L_x_2) ;
            .L_x_1:
                /*0010*/ @PT BRA `(.L_x_2) ;
            .L_x_2:
                /*0020*/ NOP ;
            .L_x_3:
        "};
        let graph = build_plain("f", text, FallthroughPolicy::UnlessTerminated);

        assert_eq!(graph.entry().edges(), &["L_x_2".to_string()]);
        assert_eq!(graph.node("L_x_1").unwrap().edges(), &["L_x_2".to_string()]);
        assert_eq!(graph.node("L_x_2").unwrap().edges(), &["L_x_3".to_string()]);

        let always = build_plain("f", text, FallthroughPolicy::Always);
        assert_eq!(
            always.entry().edges(),
            &["L_x_2".to_string(), "L_x_1".to_string()]
        );
    }

    #[test]
    fn test_only_bra_creates_edges() {
        let text = indoc! {"
            f:
            .text.f:
                /*0000*/ JMP label_a ;
                /*0010*/ CALL.REL.NOINC `(callee) ;
                /*0020*/ BRX R2 -0x30 ;
                /*0030*/ BRA `(.L_x) ;
        "};
        let graph = build_plain("f", text, FallthroughPolicy::Always);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.entry().edges(), &["L_x".to_string()]);
        assert_eq!(graph.entry().lines()[0], "JMP label_a");
        assert_eq!(graph.dangling_edges(), vec![("entry", "L_x")]);
    }

    #[test]
    fn test_label_after_content() {
        let text = indoc! {"
            g:
            .text.g:
                /*0000*/ NOP ;
            L_1:
                /*0010*/ EXIT ;
        "};
        let graph = build_plain("g", text, FallthroughPolicy::Always);

        assert_eq!(names(&graph), vec!["entry", "L_1"]);
        assert_eq!(graph.entry().edges(), &["L_1".to_string()]);
        assert_eq!(
            graph.node("L_1").unwrap().lines(),
            &["L_1:".to_string(), "EXIT".to_string()]
        );
    }

    #[test]
    fn test_unparsed_instruction_kept_verbatim() {
        let text = indoc! {"
            h:
            .text.h:
                /*0000*/ ??? R1, R2 ;                   /* 0x0000000000000000 */
                /*0010*/ MOV R1, R2 ;
        "};
        let graph = build_plain("h", text, FallthroughPolicy::Always);

        assert_eq!(
            graph.entry().lines(),
            &["??? R1, R2".to_string(), "MOV R1, R2".to_string()]
        );
        assert!(graph.entry().edges().is_empty());
    }

    #[test]
    fn test_empty_section() {
        let graph = build_plain("k", "", FallthroughPolicy::Always);
        assert_eq!(names(&graph), vec![ENTRY]);
        assert!(graph.entry().lines().is_empty());

        let graph = build_plain("k", "k:\n.text.k:\n", FallthroughPolicy::Always);
        assert_eq!(names(&graph), vec![ENTRY]);
    }

    #[test]
    fn test_missing_function_label_uses_whole_section() {
        let text = indoc! {"
                /*0000*/ NOP ;
            .L_x_0:
                /*0010*/ EXIT ;
        "};
        let graph = build_plain("missing", text, FallthroughPolicy::Always);

        assert_eq!(names(&graph), vec!["entry", "L_x_0"]);
        assert_eq!(graph.entry().lines(), &["NOP".to_string()]);
    }

    #[test]
    fn test_duplicate_label_replaced_in_place() {
        let text = indoc! {"
            f:
            .text.f:
            .L_a:
                /*0000*/ NOP ;
            .L_b:
                /*0010*/ NOP ;
            .L_a:
                /*0020*/ EXIT ;
        "};
        let graph = build_plain("f", text, FallthroughPolicy::Always);

        assert_eq!(names(&graph), vec!["entry", "L_a", "L_b"]);
        assert_eq!(
            graph.node("L_a").unwrap().lines(),
            &[".L_a:".to_string(), "EXIT".to_string()]
        );
        assert_eq!(graph.node("L_b").unwrap().edges(), &["L_a".to_string()]);
    }

    #[test]
    fn test_html_lines() {
        let text = indoc! {"
            f:
            .text.f:
                /*0000*/ @P0 BRA `(.L_x_0) ;
            .L_x_0:
        "};
        let graph = build_function_cfg(
            "f",
            &lines(text),
            &Highlighter::default(),
            &BuildOptions::default(),
        );

        assert_eq!(
            graph.entry().lines()[0],
            "<span style=\"color: red\">@P0</span> <span style=\"color: black\">BRA</span> \
             <span style=\"color: black\">`(.L_x_0)</span>"
        );
        assert_eq!(
            graph.node("L_x_0").unwrap().lines()[0],
            "<span style=\"color: black\">.L_x_0:</span>"
        );
    }

    #[test]
    fn test_extract_instruction() {
        assert_eq!(
            extract_instruction("  /*0040*/   @!P0 BRA `(.L_x_1) ;   /* 0x0000 */"),
            Some("@!P0 BRA `(.L_x_1)")
        );
        assert_eq!(extract_instruction("  /*0050*/ EXIT;"), Some("EXIT"));
        assert_eq!(extract_instruction("          /* 0x000fea0003800000 */"), None);
        assert_eq!(extract_instruction("  /* unterminated"), None);
    }

    #[test]
    fn test_label_declaration() {
        assert_eq!(label_declaration(".L_x_3:"), Some(".L_x_3"));
        assert_eq!(label_declaration("  L_1:  "), Some("L_1"));
        assert_eq!(label_declaration(":"), None);
        assert_eq!(label_declaration("  .section .text:  foo"), None);
        assert_eq!(label_declaration("x y:"), None);
        assert_eq!(node_name(".L_x_3"), "L_x_3");
        assert_eq!(node_name("L_1"), "L_1");
    }
}
