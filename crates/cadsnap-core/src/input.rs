//! Numeric keyboard entry.
//!
//! Accepts a signed decimal number with an optional unit suffix, e.g. `12.5mm`,
//! `-3 ft`, `2"`, `45°`, `0.5rad`. There is no arithmetic. Lengths are returned
//! in scene units (meters), angles in radians.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::errors::InputError;

/// A parsed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    /// Length in scene units.
    Length(f64),
    /// Angle in radians.
    Angle(f64),
    /// A bare number.
    Scalar(f64),
}

/// What the consumer of a typed value expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    Length,
    Angle,
    Scalar,
}

impl Quantity {
    fn kind_name(&self) -> &'static str {
        match self {
            Quantity::Length(_) => "length",
            Quantity::Angle(_) => "angle",
            Quantity::Scalar(_) => "number",
        }
    }

    /// Interpret as `kind`. Bare numbers are scene units for lengths and
    /// degrees for angles.
    pub fn as_kind(self, kind: QuantityKind) -> Result<f64, InputError> {
        match (kind, self) {
            (QuantityKind::Length, Quantity::Length(v) | Quantity::Scalar(v)) => Ok(v),
            (QuantityKind::Angle, Quantity::Angle(v)) => Ok(v),
            (QuantityKind::Angle, Quantity::Scalar(v)) => Ok(v.to_radians()),
            (QuantityKind::Scalar, Quantity::Scalar(v)) => Ok(v),
            (expected, got) => Err(InputError::WrongQuantity {
                expected: format!("{expected:?}").to_lowercase(),
                got: got.kind_name().to_string(),
            }),
        }
    }
}

/// Parse a signed decimal number.
fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(alt((char('-'), char('+')))),
        alt((
            recognize(pair(
                take_while1(|c: char| c.is_ascii_digit()),
                opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
            )),
            recognize(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
        )),
    ))(input)
}

/// Parse a unit word.
fn unit(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphabetic() || matches!(c, '\'' | '"' | '°' | 'µ'))(input)
}

fn apply_unit(value: f64, unit: &str) -> Result<Quantity, InputError> {
    let length = |factor: f64| Ok(Quantity::Length(value * factor));
    let metric = |divisor: f64| Ok(Quantity::Length(value / divisor));
    match unit.to_lowercase().as_str() {
        "um" | "µm" => metric(1e6),
        "mm" => metric(1e3),
        "cm" => metric(1e2),
        "m" => length(1.0),
        "km" => length(1e3),
        "in" | "\"" => length(0.0254),
        "ft" | "'" => length(0.3048),
        "yd" => length(0.9144),
        "mi" => length(1609.344),
        "deg" | "d" | "°" => Ok(Quantity::Angle(value.to_radians())),
        "rad" | "r" => Ok(Quantity::Angle(value)),
        other => Err(InputError::UnknownUnit {
            unit: other.to_string(),
        }),
    }
}

/// Parse typed text into a [`Quantity`].
pub fn parse_quantity(input: &str) -> Result<Quantity, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }

    let (rest, (digits, suffix)) = tuple((number, preceded(multispace0, opt(unit))))(trimmed)
        .map_err(|_| InputError::InvalidNumber {
            value: trimmed.to_string(),
        })?;

    let rest = rest.trim();
    if !rest.is_empty() {
        return Err(InputError::TrailingInput {
            rest: rest.to_string(),
        });
    }

    let value: f64 = digits.parse().map_err(|_| InputError::InvalidNumber {
        value: digits.to_string(),
    })?;

    match suffix {
        Some(u) => apply_unit(value, u),
        None => Ok(Quantity::Scalar(value)),
    }
}

/// Keystroke buffer for numeric override during a modal transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumericEntry {
    text: String,
}

impl NumericEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a typed character. Returns false for characters that can never
    /// appear in a value.
    pub fn push(&mut self, c: char) -> bool {
        let accepted = c.is_ascii_digit()
            || c.is_alphabetic()
            || matches!(c, '.' | '+' | '\'' | '"' | '°' | 'µ' | ' ');
        if accepted {
            self.text.push(c);
        } else if c == '-' {
            self.negate();
            return true;
        }
        accepted
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    /// Flip the sign of the typed value.
    pub fn negate(&mut self) {
        if let Some(stripped) = self.text.strip_prefix('-') {
            self.text = stripped.to_string();
        } else {
            self.text.insert(0, '-');
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim_start_matches('-').trim().is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self, kind: QuantityKind) -> Result<f64, InputError> {
        parse_quantity(&self.text)?.as_kind(kind)
    }
}
