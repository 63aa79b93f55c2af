// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Syntax highlighting for parsed SASS instructions.
//!
//! The highlighter is a pure formatting pass: it walks an [`Instruction`] and
//! its operand tree and emits one styled string. Colours come from an
//! immutable [`Theme`]; the output markup is either HTML spans or plain text.

use serde::{Deserialize, Serialize};

use crate::{
    instruction::Instruction,
    operand::{Operand, RegisterClass, RegisterOperand},
};

/// Semantic class of a rendered token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleClass {
    /// Guard predicate (`@!P0`)
    Predicate,
    /// Opcode with modifiers (`IMAD.MOV.U32`)
    Instruction,
    /// Labels and immediates
    Constant,
    /// General and barrier registers
    Register,
    SpecialRegister,
    UniformRegister,
    /// Predicate and uniform predicate registers
    PredicateRegister,
}

impl StyleClass {
    /// Style class of a register operand.
    pub fn for_register(class: RegisterClass) -> Self {
        match class {
            RegisterClass::Special => StyleClass::SpecialRegister,
            RegisterClass::Uniform => StyleClass::UniformRegister,
            RegisterClass::Predicate | RegisterClass::UniformPredicate => {
                StyleClass::PredicateRegister
            }
            RegisterClass::General | RegisterClass::Barrier => StyleClass::Register,
        }
    }
}

/// Colour per style class.
///
/// Deserializes from a JSON object; omitted classes keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub predicate: String,
    pub instruction: String,
    pub constant: String,
    pub register: String,
    pub special_register: String,
    pub uniform_register: String,
    pub predicate_register: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            predicate: "red".to_string(),
            instruction: "black".to_string(),
            constant: "black".to_string(),
            register: "green".to_string(),
            special_register: "darkorange".to_string(),
            uniform_register: "blue".to_string(),
            predicate_register: "red".to_string(),
        }
    }
}

impl Theme {
    /// The colour assigned to a style class.
    pub fn color(&self, class: StyleClass) -> &str {
        match class {
            StyleClass::Predicate => &self.predicate,
            StyleClass::Instruction => &self.instruction,
            StyleClass::Constant => &self.constant,
            StyleClass::Register => &self.register,
            StyleClass::SpecialRegister => &self.special_register,
            StyleClass::UniformRegister => &self.uniform_register,
            StyleClass::PredicateRegister => &self.predicate_register,
        }
    }
}

/// Output markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    /// `<span style="color: ...">escaped text</span>`
    #[default]
    Html,
    /// Text only, no styling.
    Plain,
}

/// Renders instructions as styled text.
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    theme: Theme,
    markup: Markup,
}

impl Highlighter {
    pub fn new(theme: Theme, markup: Markup) -> Self {
        Self { theme, markup }
    }

    /// Plain-text highlighter (no markup).
    pub fn plain() -> Self {
        Self::new(Theme::default(), Markup::Plain)
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn markup(&self) -> Markup {
        self.markup
    }

    /// Wrap `text` in the style of `class`.
    pub fn styled(&self, class: StyleClass, text: &str) -> String {
        match self.markup {
            Markup::Html => format!(
                "<span style=\"color: {}\">{}</span>",
                escape_html(self.theme.color(class)),
                escape_html(text)
            ),
            Markup::Plain => text.to_string(),
        }
    }

    /// Render a whole instruction.
    pub fn highlight(&self, instruction: &Instruction) -> String {
        let mut result = String::new();

        if let Some(predicate) = &instruction.predicate {
            result.push_str(&self.styled(StyleClass::Predicate, &format!("@{predicate}")));
            result.push(' ');
        }

        result.push_str(&self.styled(StyleClass::Instruction, &instruction.mnemonic()));

        for (i, operand) in instruction.operands.iter().enumerate() {
            if i != 0 {
                result.push(',');
            }
            result.push(' ');
            result.push_str(&self.operand(operand));
        }

        result
    }

    /// Render one operand, recursing into compound operands.
    pub fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Register(register) => self.register(register),
            Operand::Label(label) => self.styled(StyleClass::Constant, &label.text),
            Operand::IntImmediate { text, .. } | Operand::FloatImmediate { text, .. } => {
                self.styled(StyleClass::Constant, text)
            }
            Operand::Address(address) => {
                let terms: Vec<String> = address.terms.iter().map(|t| self.operand(t)).collect();
                format!("[{}]", terms.join("+"))
            }
            Operand::Descriptor {
                descriptor,
                address,
                global,
            } => {
                let prefix = if *global { "g" } else { "" };
                format!(
                    "{prefix}desc[{}]{}",
                    self.operand(descriptor),
                    self.operand(address)
                )
            }
            Operand::Attribute { source } => format!("a{}", self.operand(source)),
            Operand::ConstantMemory {
                bank,
                address,
                extended,
                negated,
                absolute,
                modifiers,
            } => {
                let mut text = String::new();
                if *negated {
                    text.push('-');
                }
                if *absolute {
                    text.push('|');
                }
                text.push_str(if *extended { "cx" } else { "c" });
                text.push_str(&format!("[{}]{}", self.operand(bank), self.operand(address)));
                for modifier in modifiers {
                    text.push('.');
                    text.push_str(modifier);
                }
                if *absolute {
                    text.push('|');
                }
                text
            }
        }
    }

    fn register(&self, register: &RegisterOperand) -> String {
        self.styled(StyleClass::for_register(register.class), &register.text())
    }
}

/// Escape text for inclusion in HTML content or attribute values.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
