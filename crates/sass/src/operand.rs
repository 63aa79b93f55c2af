// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SASS operand model and operand parsing.
//!
//! Every operand shape is a variant of the closed [`Operand`] enum. Compound
//! shapes (`[R2.64+0x10]`, `c[0x0][0x160]`, `desc[UR4][R2.64]`, `a[0x70]`)
//! own their sub-operands, so an operand is always a finite tree.
//!
//! Operands keep enough source text to be rendered back exactly: immediates
//! keep their literal spelling (hex vs decimal) and labels keep their
//! backquoted form.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ParseError, Result};

lazy_static! {
    static ref RE_REGISTER: Regex = Regex::new(r"^(UR|UP|R|P|B)(\d+|Z|T)$").unwrap();
    static ref RE_SPECIAL: Regex =
        Regex::new(r"^(SR_[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*|SRZ)$").unwrap();
    static ref RE_MODIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref RE_INT: Regex = Regex::new(r"^[+-]?(0[xX][0-9a-fA-F]+|\d+)$").unwrap();
    static ref RE_FLOAT: Regex = Regex::new(
        r"^[+-]?((\d+\.\d*|\.\d+)([eE][+-]?\d+)?|\d+[eE][+-]?\d+|INF|QNAN|NAN)$"
    )
    .unwrap();
    static ref RE_SYMBOL: Regex =
        Regex::new(r"^[A-Za-z0-9_.$@]+(\([A-Za-z0-9_.$@]+\))?$").unwrap();
}

/// Register file a register operand belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// `R0`..`R255`, `RZ`
    General,
    /// `SR_TID.X`, `SR_LANEID`, `SRZ`
    Special,
    /// `UR0`..`UR63`, `URZ`
    Uniform,
    /// `P0`..`P6`, `PT`
    Predicate,
    /// `UP0`..`UP6`, `UPT`
    UniformPredicate,
    /// Convergence barrier registers `B0`..`B15`
    Barrier,
}

impl RegisterClass {
    /// Predicate or uniform predicate.
    pub fn is_predicate(self) -> bool {
        matches!(self, RegisterClass::Predicate | RegisterClass::UniformPredicate)
    }
}

/// A register reference such as `-|R2.reuse|` or `!P0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOperand {
    pub class: RegisterClass,
    /// Register name as written, without modifiers (`R2`, `RZ`, `SR_TID.X`).
    pub name: String,
    /// Numeric index for numbered registers; `None` for `RZ`, `PT`, `SR_*`.
    pub index: Option<u32>,
    /// Dot-suffixes such as `reuse`, `64`, `H1`.
    pub modifiers: Vec<String>,
    /// Arithmetic negation `-R2`.
    pub negated: bool,
    /// Absolute value `|R2|`.
    pub absolute: bool,
    /// Logical (`!P0`) or bitwise (`~R2`) inversion.
    pub inverted: bool,
}

impl RegisterOperand {
    /// Parse a register token. Returns `None` if the token is not a register.
    pub fn parse(token: &str) -> Option<Self> {
        let mut core = token.trim();

        let negated = match core.strip_prefix('-') {
            Some(rest) => {
                core = rest;
                true
            }
            None => false,
        };

        let absolute = match core.strip_prefix('|').and_then(|s| s.strip_suffix('|')) {
            Some(inner) => {
                core = inner;
                true
            }
            None => false,
        };

        let inverted = match core.strip_prefix(['!', '~']) {
            Some(rest) => {
                core = rest;
                true
            }
            None => false,
        };

        // Special register names contain dots themselves (`SR_TID.X`)
        if RE_SPECIAL.is_match(core) {
            return Some(Self {
                class: RegisterClass::Special,
                name: core.to_string(),
                index: None,
                modifiers: Vec::new(),
                negated,
                absolute,
                inverted,
            });
        }

        let mut parts = core.split('.');
        let base = parts.next()?;
        let caps = RE_REGISTER.captures(base)?;

        let class = match &caps[1] {
            "R" => RegisterClass::General,
            "UR" => RegisterClass::Uniform,
            "P" => RegisterClass::Predicate,
            "UP" => RegisterClass::UniformPredicate,
            "B" => RegisterClass::Barrier,
            _ => return None,
        };

        let index = match (&caps[2], class) {
            ("Z", RegisterClass::General | RegisterClass::Uniform) => None,
            ("T", RegisterClass::Predicate | RegisterClass::UniformPredicate) => None,
            ("Z" | "T", _) => return None,
            (digits, _) => Some(digits.parse().ok()?),
        };

        let modifiers = parts
            .map(|m| RE_MODIFIER.is_match(m).then(|| m.to_string()))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            class,
            name: base.to_string(),
            index,
            modifiers,
            negated,
            absolute,
            inverted,
        })
    }

    /// Source text of the register, including sign, bars and modifiers.
    pub fn text(&self) -> String {
        let mut text = String::new();
        if self.negated {
            text.push('-');
        }
        if self.absolute {
            text.push('|');
        }
        if self.inverted {
            text.push(if self.class.is_predicate() { '!' } else { '~' });
        }
        text.push_str(&self.name);
        for modifier in &self.modifiers {
            text.push('.');
            text.push_str(modifier);
        }
        if self.absolute {
            text.push('|');
        }
        text
    }
}

/// A label or symbol reference.
///
/// Branch targets are written `` `(.L_x_0) `` and are named `L_x_0`; other
/// symbols (`label_a`, `32@lo(sym)`) are named by their full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelOperand {
    pub name: String,
    pub text: String,
}

/// `[term + term + ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct AddressOperand {
    pub terms: Vec<Operand>,
}

impl AddressOperand {
    /// Parse the inside of a bracket pair, e.g. `R2.64+0x10`.
    ///
    /// A `-` between two terms becomes part of the following term, so
    /// `R1-0x4` yields the terms `R1` and `-0x4`.
    pub fn parse_inner(inner: &str) -> Result<Self> {
        let mut terms = Vec::new();
        let mut start = 0;
        let mut depth: usize = 0;

        for (i, c) in inner.char_indices() {
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                '+' if depth == 0 => {
                    terms.push(Self::parse_term(&inner[start..i], inner)?);
                    start = i + 1;
                }
                '-' if depth == 0 && !inner[start..i].trim().is_empty() => {
                    terms.push(Self::parse_term(&inner[start..i], inner)?);
                    start = i;
                }
                _ => {}
            }
        }
        terms.push(Self::parse_term(&inner[start..], inner)?);

        Ok(Self { terms })
    }

    fn parse_term(term: &str, inner: &str) -> Result<Operand> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ParseError::InvalidOperand {
                operand: format!("[{inner}]"),
                reason: "empty address term",
            });
        }
        Operand::parse(term)
    }
}

/// A single instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(RegisterOperand),
    Label(LabelOperand),
    Address(AddressOperand),
    IntImmediate {
        /// Values above `i64::MAX` keep their 64-bit pattern.
        value: i64,
        text: String,
    },
    FloatImmediate {
        value: f64,
        text: String,
    },
    /// `desc[UR4][R2.64]`, or `gdesc[...]` when `global`
    Descriptor {
        descriptor: Box<Operand>,
        address: Box<Operand>,
        global: bool,
    },
    /// `a[0x70]`
    Attribute { source: Box<Operand> },
    /// `c[0x0][0x160]`, or `cx[...]` when `extended`
    ///
    /// Source operands may carry the same wrappers as registers:
    /// `-c[0x0][0x170]`, `|c[0x0][0x160]|`, `c[0x0][0x160].H0_H0`.
    ConstantMemory {
        bank: Box<Operand>,
        address: Box<Operand>,
        extended: bool,
        negated: bool,
        absolute: bool,
        modifiers: Vec<String>,
    },
}

impl Operand {
    /// Parse one operand token (already split at top-level commas).
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();

        if token.starts_with('[') {
            let [inner] = bracket_groups::<1>(token)?;
            return Ok(Operand::Address(AddressOperand::parse_inner(inner)?));
        }

        if let Some((rest, global)) = strip_indexed_prefix(token, &["gdesc", "desc"]) {
            let [descriptor, address] = bracket_groups::<2>(rest)?;
            return Ok(Operand::Descriptor {
                descriptor: Box::new(Operand::parse(descriptor)?),
                address: Box::new(Operand::Address(AddressOperand::parse_inner(address)?)),
                global: global == "gdesc",
            });
        }

        if let Some(constant) = parse_constant_memory(token)? {
            return Ok(constant);
        }

        if let Some((rest, _)) = strip_indexed_prefix(token, &["a"]) {
            let [source] = bracket_groups::<1>(rest)?;
            return Ok(Operand::Attribute {
                source: Box::new(Operand::Address(AddressOperand::parse_inner(source)?)),
            });
        }

        if let Some(rest) = token.strip_prefix("`(") {
            let inner = rest
                .strip_suffix(')')
                .ok_or_else(|| ParseError::UnbalancedDelimiter(token.to_string()))?
                .trim();
            let name = inner.strip_prefix('.').unwrap_or(inner);
            if name.is_empty() || !RE_SYMBOL.is_match(name) {
                return Err(ParseError::InvalidOperand {
                    operand: token.to_string(),
                    reason: "invalid branch target",
                });
            }
            return Ok(Operand::Label(LabelOperand {
                name: name.to_string(),
                text: token.to_string(),
            }));
        }

        if RE_INT.is_match(token) {
            return parse_int(token);
        }

        if RE_FLOAT.is_match(token) {
            return Ok(Operand::FloatImmediate {
                value: parse_float(token),
                text: token.to_string(),
            });
        }

        if let Some(register) = RegisterOperand::parse(token) {
            return Ok(Operand::Register(register));
        }

        if RE_SYMBOL.is_match(token) {
            return Ok(Operand::Label(LabelOperand {
                name: token.to_string(),
                text: token.to_string(),
            }));
        }

        Err(ParseError::InvalidOperand {
            operand: token.to_string(),
            reason: "unrecognized operand",
        })
    }

    /// The label name, if this is a label operand.
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Operand::Label(label) => Some(&label.name),
            _ => None,
        }
    }

    /// The register, if this is a register operand.
    pub fn as_register(&self) -> Option<&RegisterOperand> {
        match self {
            Operand::Register(register) => Some(register),
            _ => None,
        }
    }
}

/// Match `prefix[` against each candidate in order, returning the text from
/// the `[` onward and the matched prefix.
fn strip_indexed_prefix<'a>(token: &'a str, prefixes: &[&'static str]) -> Option<(&'a str, &'static str)> {
    prefixes.iter().find_map(|&prefix| {
        token
            .strip_prefix(prefix)
            .filter(|rest| rest.starts_with('['))
            .map(|rest| (rest, prefix))
    })
}

/// Parse `c[bank][address]` or `cx[...][...]`, with an optional leading `-`,
/// surrounding `|...|` and trailing `.MOD` suffixes.
///
/// Returns None when the token is not a constant bank reference at all.
fn parse_constant_memory(token: &str) -> Result<Option<Operand>> {
    let mut core = token;

    let negated = match core.strip_prefix('-') {
        Some(rest) => {
            core = rest;
            true
        }
        None => false,
    };

    let absolute = match core.strip_prefix('|').and_then(|s| s.strip_suffix('|')) {
        Some(inner) => {
            core = inner;
            true
        }
        None => false,
    };

    let Some((rest, prefix)) = strip_indexed_prefix(core, &["cx", "c"]) else {
        return Ok(None);
    };

    // Modifiers follow the last bracket group
    let end = rest.rfind(']').map_or(rest.len(), |i| i + 1);
    let (groups, suffix) = rest.split_at(end);
    let modifiers = match suffix.strip_prefix('.') {
        Some(suffix) => suffix
            .split('.')
            .map(|m| {
                RE_MODIFIER
                    .is_match(m)
                    .then(|| m.to_string())
                    .ok_or_else(|| ParseError::InvalidOperand {
                        operand: token.to_string(),
                        reason: "invalid constant bank modifier",
                    })
            })
            .collect::<Result<Vec<_>>>()?,
        None if suffix.trim().is_empty() => Vec::new(),
        None => {
            return Err(ParseError::InvalidOperand {
                operand: token.to_string(),
                reason: "unexpected text outside brackets",
            });
        }
    };

    let [bank, address] = bracket_groups::<2>(groups)?;
    Ok(Some(Operand::ConstantMemory {
        bank: Box::new(Operand::parse(bank)?),
        address: Box::new(Operand::Address(AddressOperand::parse_inner(address)?)),
        extended: prefix == "cx",
        negated,
        absolute,
        modifiers,
    }))
}

/// Split text made only of `N` consecutive bracket groups (`[a][b]`) into
/// the groups' inner text.
fn bracket_groups<const N: usize>(text: &str) -> Result<[&str; N]> {
    let mut groups = [""; N];
    let mut count = 0;
    let mut depth: usize = 0;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::UnbalancedDelimiter(text.to_string()))?;
                if depth == 0 {
                    if count == N {
                        return Err(ParseError::InvalidOperand {
                            operand: text.to_string(),
                            reason: "too many bracket groups",
                        });
                    }
                    groups[count] = &text[start..i];
                    count += 1;
                }
            }
            _ if depth == 0 && !c.is_whitespace() => {
                return Err(ParseError::InvalidOperand {
                    operand: text.to_string(),
                    reason: "unexpected text outside brackets",
                });
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedDelimiter(text.to_string()));
    }
    if count != N {
        return Err(ParseError::InvalidOperand {
            operand: text.to_string(),
            reason: "wrong number of bracket groups",
        });
    }
    Ok(groups)
}

fn parse_int(token: &str) -> Result<Operand> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|_| ParseError::InvalidOperand {
        operand: token.to_string(),
        reason: "integer literal out of range",
    })?;

    let value = if negative {
        i64::try_from(-i128::from(magnitude)).map_err(|_| ParseError::InvalidOperand {
            operand: token.to_string(),
            reason: "integer literal out of range",
        })?
    } else {
        magnitude as i64
    };

    Ok(Operand::IntImmediate {
        value,
        text: token.to_string(),
    })
}

fn parse_float(token: &str) -> f64 {
    let negative = token.starts_with('-');
    let unsigned = token.trim_start_matches(['+', '-']);
    let value = match unsigned {
        "INF" => f64::INFINITY,
        "QNAN" | "NAN" => f64::NAN,
        // RE_FLOAT only admits literals that f64 parsing accepts
        _ => unsigned.parse().unwrap_or(f64::NAN),
    };
    if negative { -value } else { value }
}
