// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SASS instruction line parser.
//!
//! An instruction line has the shape
//!
//! ```text
//! [@[!]Pn] OPCODE[.MOD]* [operand[, operand]*] [;]
//! ```
//!
//! e.g. `@!P0 IMAD.MOV.U32 R1, RZ, RZ, c[0x0][0x28] ;`. Parsing is atomic:
//! either the whole line is accepted or a [`ParseError`] is returned.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::{ParseError, Result},
    highlight::Highlighter,
    opcode::{ClassifiedOpcode, UNCONDITIONAL_BRANCH},
    operand::{Operand, RegisterOperand},
};

lazy_static! {
    static ref RE_OPCODE: Regex = Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap();
    static ref RE_OPCODE_MODIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// A parsed SASS instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Guard predicate without the `@`, e.g. `P0` or `!PT`.
    pub predicate: Option<String>,
    /// Base opcode, e.g. `IMAD`.
    pub opcode: String,
    /// Dot-separated opcode modifiers, e.g. `["MOV", "U32"]`.
    pub modifiers: Vec<String>,
    pub operands: Vec<Operand>,
}

/// Result of parsing one instruction line.
///
/// Lines that fail to parse are kept verbatim so they can still be shown.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Parsed(Instruction),
    /// `text` is exactly what was passed to [`parse_line`]. Callers that
    /// pre-clean a dump line (the CFG builder drops the `/* 0x... */`
    /// encoding comment and the trailing `;`) get the cleaned text back.
    Unparsed { text: String, error: ParseError },
}

/// Parse an instruction line, keeping the raw text on failure.
pub fn parse_line(text: &str) -> ParsedLine {
    match Instruction::parse(text) {
        Ok(instruction) => ParsedLine::Parsed(instruction),
        Err(error) => ParsedLine::Unparsed {
            text: text.to_string(),
            error,
        },
    }
}

impl Instruction {
    /// Parse one instruction from its textual form.
    ///
    /// A trailing `;` is accepted and ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut text = text.trim();
        if let Some(stripped) = text.strip_suffix(';') {
            text = stripped.trim_end();
        }
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut predicate = None;
        if let Some(guarded) = text.strip_prefix('@') {
            let (guard, body) = split_first_word(guarded);
            predicate = Some(Self::parse_predicate(guard)?);
            text = body;
        }

        let (mnemonic, operand_text) = split_first_word(text);
        let (opcode, modifiers) = Self::parse_mnemonic(mnemonic)?;

        let operands = split_operands(operand_text)?
            .into_iter()
            .map(Operand::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            predicate,
            opcode,
            modifiers,
            operands,
        })
    }

    /// Validate a guard such as `P0`, `!P0`, `UP1` or `!PT`.
    fn parse_predicate(guard: &str) -> Result<String> {
        match RegisterOperand::parse(guard) {
            Some(register)
                if register.class.is_predicate()
                    && register.modifiers.is_empty()
                    && !register.negated
                    && !register.absolute =>
            {
                Ok(guard.to_string())
            }
            _ => Err(ParseError::InvalidPredicate(guard.to_string())),
        }
    }

    /// Split `IMAD.MOV.U32` into `IMAD` and `["MOV", "U32"]`.
    fn parse_mnemonic(mnemonic: &str) -> Result<(String, Vec<String>)> {
        let invalid = || ParseError::InvalidOpcode(mnemonic.to_string());

        let mut parts = mnemonic.split('.');
        let base = parts.next().filter(|b| RE_OPCODE.is_match(b)).ok_or_else(invalid)?;

        let modifiers = parts
            .map(|m| {
                RE_OPCODE_MODIFIER
                    .is_match(m)
                    .then(|| m.to_string())
                    .ok_or_else(invalid)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((base.to_string(), modifiers))
    }

    /// Opcode and modifiers joined with `.`, e.g. `IMAD.MOV.U32`.
    pub fn mnemonic(&self) -> String {
        let mut mnemonic = self.opcode.clone();
        for modifier in &self.modifiers {
            mnemonic.push('.');
            mnemonic.push_str(modifier);
        }
        mnemonic
    }

    /// The target label if this is a `BRA` whose first operand is a label.
    ///
    /// This is the only instruction form that produces a CFG edge. The guard
    /// predicate is not considered.
    pub fn branch_target(&self) -> Option<&str> {
        if self.opcode != UNCONDITIONAL_BRANCH {
            return None;
        }
        self.operands.first().and_then(Operand::as_label)
    }

    /// Whether the instruction executes unconditionally (no guard, or `@PT`).
    pub fn is_unguarded(&self) -> bool {
        matches!(self.predicate.as_deref(), None | Some("PT") | Some("UPT"))
    }

    /// Whether control never reaches the next instruction in program order.
    pub fn ends_block(&self) -> bool {
        self.is_unguarded()
            && ClassifiedOpcode::from_mnemonic(&self.opcode).is_some_and(ClassifiedOpcode::ends_block)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Highlighter::plain().highlight(self))
    }
}

/// Split at the first whitespace run into (word, rest).
fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim_start()),
        None => (text, ""),
    }
}

/// Split comma-separated operands, respecting `[...]` and `(...)`.
///
/// Commas inside brackets or parentheses are not separators.
fn split_operands(s: &str) -> Result<Vec<&str>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }

    let mut operands = Vec::new();
    let mut start = 0;
    let mut depth: usize = 0;

    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::UnbalancedDelimiter(s.to_string()))?;
            }
            ',' if depth == 0 => {
                push_operand(&mut operands, s[start..i].trim())?;
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedDelimiter(s.to_string()));
    }

    // Last operand
    push_operand(&mut operands, s[start..].trim())?;

    Ok(operands)
}

fn push_operand<'a>(operands: &mut Vec<&'a str>, operand: &'a str) -> Result<()> {
    if operand.is_empty() {
        return Err(ParseError::EmptyOperand {
            position: operands.len(),
        });
    }
    operands.push(operand);
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::operand::{AddressOperand, LabelOperand, RegisterClass};

    fn parse(text: &str) -> Instruction {
        Instruction::parse(text).unwrap()
    }

    #[test]
    fn test_parse_no_operands() {
        let inst = parse("EXIT ;");
        assert_eq!(inst.opcode, "EXIT");
        assert!(inst.modifiers.is_empty());
        assert!(inst.operands.is_empty());
        assert!(inst.predicate.is_none());
    }

    #[test]
    fn test_parse_modifiers() {
        let inst = parse("IMAD.MOV.U32 R1, RZ, RZ, c[0x0][0x28] ;");
        assert_eq!(inst.opcode, "IMAD");
        assert_eq!(inst.modifiers, vec!["MOV", "U32"]);
        assert_eq!(inst.mnemonic(), "IMAD.MOV.U32");
        assert_eq!(inst.operands.len(), 4);
        assert!(matches!(
            inst.operands[3],
            Operand::ConstantMemory { extended: false, .. }
        ));
    }

    #[test]
    fn test_parse_predicate() {
        let inst = parse("@!P0 BRA `(.L_x_1) ;");
        assert_eq!(inst.predicate.as_deref(), Some("!P0"));
        assert_eq!(inst.opcode, "BRA");

        let inst = parse("@UP1 EXIT");
        assert_eq!(inst.predicate.as_deref(), Some("UP1"));
    }

    #[test]
    fn test_invalid_predicate() {
        assert_eq!(
            Instruction::parse("@R0 EXIT"),
            Err(ParseError::InvalidPredicate("R0".to_string()))
        );
        assert!(matches!(
            Instruction::parse("@P0.reuse EXIT"),
            Err(ParseError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn test_bra_label_operand() {
        let inst = parse("BRA `(.L_x)");
        assert_eq!(inst.opcode, "BRA");
        assert_eq!(
            inst.operands,
            vec![Operand::Label(LabelOperand {
                name: "L_x".to_string(),
                text: "`(.L_x)".to_string(),
            })]
        );
        assert_eq!(inst.branch_target(), Some("L_x"));
    }

    #[test]
    fn test_only_bra_has_branch_target() {
        let jmp = parse("JMP label_a");
        assert_eq!(jmp.operands[0].as_label(), Some("label_a"));
        assert_eq!(jmp.branch_target(), None);

        let call = parse("CALL.REL.NOINC `(helper)");
        assert_eq!(call.branch_target(), None);

        // BRA with a register operand first (BRA.DIV) has no label target
        let div = parse("BRA.DIV UR4, `(.L_x_3)");
        assert_eq!(div.branch_target(), None);
    }

    #[test]
    fn test_guarded_bra_still_has_target() {
        let inst = parse("@P0 BRA `(.L_x_0)");
        assert_eq!(inst.branch_target(), Some("L_x_0"));
    }

    #[test]
    fn test_ends_block() {
        assert!(parse("EXIT").ends_block());
        assert!(parse("BRA `(.L_x_0)").ends_block());
        assert!(parse("@PT BRA `(.L_x_0)").ends_block());
        assert!(!parse("@P0 BRA `(.L_x_0)").ends_block());
        assert!(!parse("@!P1 EXIT").ends_block());
        assert!(!parse("CALL.ABS.NOINC `(vprintf)").ends_block());
        assert!(!parse("IADD3 R0, R0, 0x1, RZ").ends_block());
    }

    #[test]
    fn test_memory_operands() {
        let inst = parse("LDG.E R2, desc[UR4][R2.64] ;");
        assert_eq!(inst.operands.len(), 2);
        assert!(matches!(inst.operands[1], Operand::Descriptor { global: false, .. }));

        let inst = parse("STS [R3+0x10], R5");
        let Operand::Address(AddressOperand { terms }) = &inst.operands[0] else {
            panic!("expected address");
        };
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_special_register() {
        let inst = parse("S2R R0, SR_TID.X ;");
        let sr = inst.operands[1].as_register().unwrap();
        assert_eq!(sr.class, RegisterClass::Special);
        assert_eq!(sr.name, "SR_TID.X");
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(matches!(
            Instruction::parse("%%% ???"),
            Err(ParseError::InvalidOpcode(_))
        ));
        assert!(matches!(
            Instruction::parse("mov x0, #0"),
            Err(ParseError::InvalidOpcode(_))
        ));
        assert!(matches!(
            Instruction::parse("IADD3. R0"),
            Err(ParseError::InvalidOpcode(_))
        ));
        assert!(matches!(
            Instruction::parse("@P0"),
            Err(ParseError::InvalidOpcode(_))
        ));
    }

    #[test]
    fn test_empty_instruction() {
        assert_eq!(Instruction::parse(""), Err(ParseError::Empty));
        assert_eq!(Instruction::parse("  ; "), Err(ParseError::Empty));
    }

    #[test]
    fn test_empty_operand() {
        assert_eq!(
            Instruction::parse("IADD3 R0, , R1"),
            Err(ParseError::EmptyOperand { position: 1 })
        );
        assert_eq!(
            Instruction::parse("IADD3 R0, R1,"),
            Err(ParseError::EmptyOperand { position: 2 })
        );
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(matches!(
            Instruction::parse("LDG.E R2, [R2.64"),
            Err(ParseError::UnbalancedDelimiter(_))
        ));
        assert!(matches!(
            Instruction::parse("LDG.E R2, R2.64]"),
            Err(ParseError::UnbalancedDelimiter(_))
        ));
    }

    #[test]
    fn test_failure_is_atomic() {
        // One bad operand rejects the whole line
        assert!(Instruction::parse("IADD3 R0, R1, %bad").is_err());
    }

    #[test]
    fn test_parse_line_keeps_raw_text() {
        match parse_line("??? garbage") {
            ParsedLine::Unparsed { text, .. } => assert_eq!(text, "??? garbage"),
            ParsedLine::Parsed(_) => panic!("garbage should not parse"),
        }
        assert!(matches!(parse_line("NOP"), ParsedLine::Parsed(_)));

        // Surrounding whitespace and `;` are not stripped from the kept text
        match parse_line("  RET.REL.NODEC R20 `(_Z6kernelPi) ;") {
            ParsedLine::Unparsed { text, .. } => {
                assert_eq!(text, "  RET.REL.NODEC R20 `(_Z6kernelPi) ;")
            }
            ParsedLine::Parsed(_) => panic!("space-separated operands should not parse"),
        }
    }

    #[test]
    fn test_parse_wrapped_constant_memory() {
        for text in [
            "FADD R0, -R2, -c[0x0][0x168]",
            "FFMA R0, R1, |c[0x0][0x160]|, R2",
            "HADD2.F32 R0, -RZ, c[0x0][0x160].H0_H0",
        ] {
            let inst = parse(text);
            assert!(
                inst.operands
                    .iter()
                    .any(|op| matches!(op, Operand::ConstantMemory { .. })),
                "{text}"
            );
        }
    }

    #[test]
    fn test_display_reproduces_tokens() {
        let text = "@!P0 FFMA R4, -|R2.reuse|, 1.5, c[0x0][0x160]";
        assert_eq!(parse(text).to_string(), text);

        let text = "LDG.E.64 R2, gdesc[UR4][R2.64+-0x8]";
        assert_eq!(parse(text).to_string(), text);
    }
}
