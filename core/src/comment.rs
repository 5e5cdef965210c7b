//! The per-row control annotation grammar: conditional/unconditional jumps
//! and input-literal bindings, in two parallel alphabets (`SPEC_FULL.md`
//! §4.5). Grounded directly in the original editor's `NextWord`/`ParseComment`/
//! `ParseInput` routines.

use nom::character::complete::{char as nom_char, one_of};
use nom::combinator::map;
use nom::multi::many_m_n;
use nom::sequence::{preceded, tuple};
use nom::IResult;

use crate::error::ControlError;

/// The twelve output-flag bits the `IF` directive can name, in the order
/// they occupy bits 0..11 of [`crate::flags::OutFlags`].
///
/// Four parallel spellings are accepted for each: primary Russian, alternate
/// Russian, primary English, alternate English.
const FLAG_NAMES: [&str; 12] = [
    "ПАЛУ3", "!СДЛ1", "!СДП1", "!СДЛ2", "!СДП2", "РРР0", "РРР3", "A15", "B15", "ПАЛУ0", "ПАЛУ1",
    "ПАЛУ2",
];
const ALT_FLAG_NAMES: [&str; 12] = [
    "П", "!СДЛ1", "!СДП1", "!СДЛ2", "!СДП2", "РРР0", "РРР3", "А15", "В15", "П0", "П1", "П2",
];
const ENG_FLAG_NAMES: [&str; 12] = [
    "CO3", "!SL1", "!SR1", "!SL2", "!SR2", "XWR0", "XWR3", "A15", "B15", "CO0", "CO1", "CO2",
];
const ENG_ALT_FLAG_NAMES: [&str; 12] = [
    "C", "!SL1", "!SR1", "!SL2", "!SR2", "XWR0", "XWR3", "A15", "B15", "C0", "C1", "C2",
];

/// The number of addressable rows in the microprogram store.
const MAX_ADDR: i32 = 1024;

/// A successfully parsed control annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `IF <flag> THEN <true_addr> [ELSE <false_addr>]`.
    If {
        /// Index (0..=11) of the queried output-flag bit.
        flag_bit: usize,
        /// Target row when the flag is set.
        true_addr: u16,
        /// Target row when the flag is clear.
        false_addr: u16,
    },
    /// `GOTO <addr>`.
    Goto {
        /// Unconditional target row.
        addr: u16,
    },
}

fn uppercase_word(w: &str) -> String {
    w.to_uppercase()
}

/// Split `text` into whitespace-separated, uppercased tokens, mirroring the
/// original `NextWord` loop (which skips runs of spaces and folds case).
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(uppercase_word).collect()
}

fn flag_bit(token: &str) -> Option<usize> {
    (0..12).find(|&i| {
        token == FLAG_NAMES[i]
            || token == ALT_FLAG_NAMES[i]
            || token == ENG_FLAG_NAMES[i]
            || token == ENG_ALT_FLAG_NAMES[i]
    })
}

fn parse_addr(token: &str) -> Option<u16> {
    let n: i32 = token.parse().ok()?;
    if (0..MAX_ADDR).contains(&n) {
        Some(n as u16)
    } else {
        None
    }
}

/// Parse a row's control annotation as a jump directive.
///
/// Returns `Ok(None)` when `text` is not directive-shaped at all (an
/// ordinary comment); this is the expected outcome for most rows and is not
/// an error. Returns `Err` only once the leading keyword commits to a
/// grammar that the rest of the text then fails to complete.
///
/// # Errors
///
/// Returns [`ControlError::Malformed`] if the text starts with a recognized
/// keyword but the remainder doesn't satisfy that keyword's grammar.
pub fn parse(text: &str) -> Result<Option<Directive>, ControlError> {
    let tokens = tokenize(text);
    let mut it = tokens.iter();
    let Some(head) = it.next() else {
        return Ok(None);
    };

    match head.as_str() {
        "IF" | "ЕСЛИ" => parse_if(&mut it).map(Some),
        "GOTO" | "ИДИ_НА" => parse_goto(&mut it).map(Some),
        _ => Ok(None),
    }
}

fn malformed(keyword: &'static str, reason: &'static str) -> ControlError {
    ControlError::Malformed { keyword, reason }
}

fn parse_if<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<Directive, ControlError> {
    let flag_tok = it.next().ok_or_else(|| malformed("if", "missing flag name"))?;
    let flag_bit = flag_bit(flag_tok).ok_or_else(|| malformed("if", "unrecognized flag name"))?;

    let then_tok = it.next().ok_or_else(|| malformed("if", "missing THEN"))?;
    if then_tok != "THEN" && then_tok != "ТО" {
        return Err(malformed("if", "expected THEN/ТО"));
    }

    let true_tok = it.next().ok_or_else(|| malformed("if", "missing true address"))?;
    let true_addr = parse_addr(true_tok).ok_or_else(|| malformed("if", "true address out of range"))?;

    match it.next() {
        None => Ok(Directive::If {
            flag_bit,
            true_addr,
            false_addr: true_addr.wrapping_add(1),
        }),
        Some(tok) if tok == "ELSE" || tok == "ИНАЧЕ" => {
            let false_tok = it.next().ok_or_else(|| malformed("if", "missing false address"))?;
            let false_addr =
                parse_addr(false_tok).ok_or_else(|| malformed("if", "false address out of range"))?;
            if it.next().is_some() {
                return Err(malformed("if", "trailing tokens after ELSE clause"));
            }
            Ok(Directive::If {
                flag_bit,
                true_addr,
                false_addr,
            })
        }
        Some(_) => Err(malformed("if", "expected ELSE/ИНАЧЕ or end of text")),
    }
}

fn parse_goto<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<Directive, ControlError> {
    let addr_tok = it.next().ok_or_else(|| malformed("goto", "missing address"))?;
    let addr = parse_addr(addr_tok).ok_or_else(|| malformed("goto", "address out of range"))?;
    if it.next().is_some() {
        return Err(malformed("goto", "trailing tokens after address"));
    }
    Ok(Directive::Goto { addr })
}

fn bit01(input: &str) -> IResult<&str, char> {
    one_of("01")(input)
}

fn binary_group(n: usize) -> impl Fn(&str) -> IResult<&str, String> {
    move |input| map(many_m_n(n, n, bit01), |chars| chars.into_iter().collect())(input)
}

fn binary_to_u16(bits: &str) -> u16 {
    bits.bytes().fold(0u16, |acc, b| (acc << 1) | u16::from(b - b'0'))
}

fn parse_binary16(input: &str) -> IResult<&str, u16> {
    map(binary_group(16), |s| binary_to_u16(&s))(input)
}

fn parse_binary_4x4(input: &str) -> IResult<&str, u16> {
    map(
        tuple((
            binary_group(4),
            preceded(nom_char(' '), binary_group(4)),
            preceded(nom_char(' '), binary_group(4)),
            preceded(nom_char(' '), binary_group(4)),
        )),
        |(a, b, c, d)| {
            let mut v = 0u16;
            for nibble in [a, b, c, d] {
                v = (v << 4) | binary_to_u16(&nibble);
            }
            v
        },
    )(input)
}

/// Parse `INPUT <value>` / `ВВОД <value>`, returning the bound 16-bit datum.
///
/// `value` is accepted in three shapes, first match wins: sixteen contiguous
/// `0`/`1` characters; four groups of four `0`/`1` characters separated by
/// single spaces; or a signed decimal in `[-32768, 65535]` (auto-wrapped
/// modulo 2^16). Once a shape's own pattern matches, any further trailing
/// tokens invalidate the whole annotation -- parsing does not fall back to
/// trying a later shape.
///
/// Returns `None` when `text` doesn't start with the `INPUT`/`ВВОД` keyword,
/// or when the value after it matches none of the three shapes, or matches
/// one but leaves trailing tokens.
#[must_use]
pub fn parse_input(text: &str) -> Option<u16> {
    let first_space = text.find(' ').unwrap_or(text.len());
    let head = text[..first_space].to_uppercase();
    if head != "INPUT" && head != "ВВОД" {
        return None;
    }
    let rest = text[first_space..].trim_start();

    if let Ok((remainder, value)) = parse_binary16(rest) {
        return remainder.trim().is_empty().then_some(value);
    }
    if let Ok((remainder, value)) = parse_binary_4x4(rest) {
        return remainder.trim().is_empty().then_some(value);
    }

    let mut words = rest.split_whitespace();
    let number_tok = words.next()?;
    if words.next().is_some() {
        return None;
    }
    let signed: i32 = number_tok.parse().ok()?;
    if !(-32768..=65535).contains(&signed) {
        return None;
    }
    Some(i64::from(signed).rem_euclid(65536) as u16)
}

/// Canonicalize alternate-language flag names to the primary set, matching
/// the original editor's `FixControlComment` (used when the native codec
/// writes the single-byte legacy annotation).
#[must_use]
pub fn canonicalize(text: &str) -> String {
    let mut result = text.to_string();
    for i in 0..12 {
        result = replace_word_ci(&result, ENG_FLAG_NAMES[i], FLAG_NAMES[i]);
        if ENG_ALT_FLAG_NAMES[i] != "A15" && ENG_ALT_FLAG_NAMES[i] != "B15" {
            result = replace_word_ci(&result, ENG_ALT_FLAG_NAMES[i], ALT_FLAG_NAMES[i]);
        }
    }
    result
}

fn replace_word_ci(haystack: &str, from: &str, to: &str) -> String {
    let padded_from = format!(" {from} ");
    let padded_to = format!(" {to} ");
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    loop {
        let upper_rest = rest.to_uppercase();
        let upper_from = padded_from.to_uppercase();
        match upper_rest.find(&upper_from) {
            Some(idx) => {
                out.push_str(&rest[..idx]);
                out.push_str(&padded_to);
                rest = &rest[idx + padded_from.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}
