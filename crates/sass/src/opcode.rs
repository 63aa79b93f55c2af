// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SASS control-flow opcode classification
//!
//! Single source of truth for which base mnemonics transfer control. Only
//! control-flow opcodes are listed; everything else (arithmetic, memory,
//! synchronization) is absent from the table and treated as straight-line.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Mnemonic of the direct branch that produces CFG edges.
pub const UNCONDITIONAL_BRANCH: &str = "BRA";

/// Classification of a SASS control-flow opcode
pub struct ClassifiedOpcode {
    /// The base mnemonic (e.g., "BRA", "EXIT")
    pub mnemonic: &'static str,
    /// Control flow: is this a branch instruction?
    pub is_branch: bool,
    /// Control flow: is this a call? (CALL)
    pub is_call: bool,
    /// Control flow: is this a return? (RET, RTT)
    pub is_return: bool,
    /// Control flow: does this have an indirect (register) target?
    pub is_indirect: bool,
    /// Control flow: does this end the thread? (EXIT, KILL, BPT)
    pub is_exit: bool,
}

impl ClassifiedOpcode {
    const fn direct_branch(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            is_branch: true,
            is_call: false,
            is_return: false,
            is_indirect: false,
            is_exit: false,
        }
    }

    const fn indirect_branch(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            is_branch: true,
            is_call: false,
            is_return: false,
            is_indirect: true,
            is_exit: false,
        }
    }

    const fn call(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            is_branch: true,
            is_call: true,
            is_return: false,
            is_indirect: false,
            is_exit: false,
        }
    }

    const fn ret(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            is_branch: true,
            is_call: false,
            is_return: true,
            is_indirect: true,
            is_exit: false,
        }
    }

    const fn exit(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            is_branch: false,
            is_call: false,
            is_return: false,
            is_indirect: false,
            is_exit: true,
        }
    }

    /// Classify by base mnemonic (case-sensitive, SASS is upper case).
    ///
    /// Returns None for opcodes that do not transfer control.
    pub fn from_mnemonic(mnemonic: &str) -> Option<&'static Self> {
        BY_MNEMONIC.get(mnemonic).copied()
    }

    /// Whether executing this opcode (unguarded) never continues with the
    /// next instruction in program order.
    ///
    /// Calls return to their call site, so they do not end a block.
    pub fn ends_block(&self) -> bool {
        (self.is_branch && !self.is_call) || self.is_return || self.is_exit
    }
}

static OPCODE_TABLE: &[ClassifiedOpcode] = &[
    // Branches
    ClassifiedOpcode::direct_branch("BRA"),
    ClassifiedOpcode::direct_branch("JMP"),
    ClassifiedOpcode::indirect_branch("BRX"),
    ClassifiedOpcode::indirect_branch("JMX"),
    // Calls and returns
    ClassifiedOpcode::call("CALL"),
    ClassifiedOpcode::ret("RET"),
    ClassifiedOpcode::ret("RTT"),
    // Thread termination
    ClassifiedOpcode::exit("EXIT"),
    ClassifiedOpcode::exit("KILL"),
    ClassifiedOpcode::exit("BPT"),
];

lazy_static! {
    /// Map from base mnemonic to ClassifiedOpcode
    pub static ref BY_MNEMONIC: HashMap<&'static str, &'static ClassifiedOpcode> = {
        OPCODE_TABLE.iter().map(|c| (c.mnemonic, c)).collect()
    };
}
