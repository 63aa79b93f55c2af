// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! NVIDIA SASS instruction parsing and highlighting
//!
//! This crate provides:
//! - **Instruction parsing** of disassembled SASS text (predicate, opcode,
//!   modifiers and a typed operand tree)
//! - **Opcode classification** for control flow
//! - **Syntax highlighting** of parsed instructions with a configurable theme
//!
//! # Modules
//!
//! - [`instruction`]: `Instruction`, `ParsedLine` and the line grammar
//! - [`operand`]: the closed `Operand` enum and per-operand grammar
//! - [`opcode`]: control-flow opcode table
//! - [`highlight`]: `Highlighter`, `Theme`, `Markup`
//! - [`error`]: `ParseError`

pub mod error;
pub mod highlight;
pub mod instruction;
pub mod opcode;
pub mod operand;

pub use error::{ParseError, Result};
pub use highlight::{Highlighter, Markup, StyleClass, Theme};
pub use instruction::{Instruction, ParsedLine, parse_line};
pub use opcode::{BY_MNEMONIC, ClassifiedOpcode, UNCONDITIONAL_BRANCH};
pub use operand::{AddressOperand, LabelOperand, Operand, RegisterClass, RegisterOperand};
