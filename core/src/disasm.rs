//! Renders a decoded microinstruction word as a Cyrillic assembly-like
//! expression, the way the editor's hierarchical tree view wants it
//! (`SPEC_FULL.md` §4.3).
//!
//! The core only exposes the three rendering knobs; the tree-view widget
//! itself lives outside this crate.

use crate::catalog::{self, CatalogEntry, Class, Family, Operand};

/// The fixed literal the formatter returns for a word with no catalog match.
pub const NOP_TEXT: &str = "<НОП>";

const CARRY_USED_BIT: u16 = 1 << 13;
const CARRY_VALUE_BIT: u16 = 1 << 14;

/// Rendering depth knobs for [`format`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Render the ALU function symbolically (`and`, `xor`, `+`, ...) instead
    /// of a neutral placeholder glyph.
    pub format_alu: bool,
    /// Substitute the concrete register index (`РОН3`) instead of the
    /// generic `РОН`.
    pub format_reg: bool,
    /// Append the carry-used/value annotation (`(П=1)`/`(П=0)`) when the
    /// entry actually consumes a carry operand and the word's
    /// carry-attribute-used bit is set.
    pub show_carry: bool,
}

fn reg_name(opcode: u16, format_reg: bool) -> String {
    if format_reg {
        format!("РОН{}", catalog::reg_index(opcode))
    } else {
        "РОН".to_string()
    }
}

fn operand_name(op: Operand, opcode: u16, format_reg: bool) -> String {
    match op.class {
        Class::Wr => "РР".to_string(),
        Class::Xwr => "РРР".to_string(),
        Class::Reg => reg_name(opcode, format_reg),
        Class::In => "ШИНвх".to_string(),
        Class::Out => "ШИНвых".to_string(),
        Class::Carry => "П".to_string(),
        Class::WrXwr => "(РР, РРР)".to_string(),
        Class::One => "1".to_string(),
    }
}

fn dest_name(entry: &CatalogEntry, opcode: u16, format_reg: bool) -> String {
    match entry.result {
        Class::Wr => "РР".to_string(),
        Class::Xwr => "РРР".to_string(),
        Class::Reg => reg_name(opcode, format_reg),
        Class::Out => "ШИНвых".to_string(),
        Class::WrXwr => "(РР, РРР)".to_string(),
        Class::In | Class::Carry | Class::One => unreachable!("not a valid destination class"),
    }
}

/// Render one of the sixteen ALU functions as a full `A op B` expression,
/// per the function table in `SPEC_FULL.md` §4.2. The incoming-carry term is
/// deliberately left out (it is covered separately by the carry annotation).
fn alu_expr(func: u8, a: &str, b: &str) -> String {
    let lo = func & 0x7;
    if func & 0x8 != 0 {
        match lo {
            0 => format!("{a} and {b}"),
            1 => format!("{a} xor {b}"),
            2 => format!("~({a} xor {b})"),
            3 => format!("~{a} and {b}"),
            4 => format!("{a} and ~{b}"),
            5 => format!("{a} or ~{b}"),
            6 => format!("~{a} or {b}"),
            7 => format!("{a} or {b}"),
            _ => unreachable!(),
        }
    } else {
        match lo {
            0 => "0/mask".to_string(),
            1 => format!("~{a} + {b}"),
            2 => format!("{a} + ~{b}"),
            3 => format!("{a} + {b}"),
            4 => b.to_string(),
            5 => format!("~{b}"),
            6 => a.to_string(),
            7 => format!("~{a}"),
            _ => unreachable!(),
        }
    }
}

fn shift_prefix(family: Family) -> &'static str {
    match family {
        Family::Sal => "SAL(",
        Family::Sar => "SAR(",
        Family::Sll => "SLL(",
        Family::Slr => "SLR(",
        Family::Scl => "SCL(",
        Family::Scr => "SCR(",
        Family::Sum | Family::Alu => unreachable!("not a shift family"),
    }
}

fn render_operand_list(entry: &CatalogEntry, opcode: u16, format_reg: bool) -> String {
    let mut out = String::new();
    for op in entry.operands.iter().filter(|o| o.class != Class::Carry) {
        if out.is_empty() {
            if op.minus {
                out.push('−');
            }
        } else {
            out.push_str(if op.minus { " − " } else { " + " });
        }
        out.push_str(&operand_name(*op, opcode, format_reg));
    }
    out
}

/// Render `mi` (the full 16-bit editor word) as a destination-assignment
/// expression, per the three rendering knobs in `opts`. Only the lower 9
/// bits participate in catalog decode; bits 13-15 carry the editor
/// attributes consulted for the carry annotation. Returns [`NOP_TEXT`] if no
/// catalog entry matches.
#[must_use]
pub fn format(mi: u16, opts: FormatOptions) -> String {
    let opcode = mi & 0x1ff;
    let Some((_idx, entry)) = catalog::decode(opcode) else {
        return NOP_TEXT.to_string();
    };

    let dest = dest_name(entry, opcode, opts.format_reg);
    let body = match entry.family {
        Family::Sum => render_operand_list(entry, opcode, opts.format_reg),
        Family::Alu => {
            let a = entry
                .operands
                .first()
                .map(|o| operand_name(*o, opcode, opts.format_reg))
                .unwrap_or_default();
            let b = entry
                .operands
                .get(1)
                .map(|o| operand_name(*o, opcode, opts.format_reg))
                .unwrap_or_default();
            if opts.format_alu {
                let func = catalog::alu_function(opcode);
                alu_expr(func, &a, &b)
            } else {
                format!("{a} ? {b}")
            }
        }
        _ => {
            let mut s = shift_prefix(entry.family).to_string();
            s.push_str(&render_operand_list(entry, opcode, opts.format_reg));
            s.push_str(if entry.result == Class::WrXwr { ", РРР)" } else { ")" });
            s
        }
    };

    let mut rendered = format!("{dest} := {body}");

    if opts.show_carry
        && entry.operands.iter().any(|o| o.class == Class::Carry)
        && mi & CARRY_USED_BIT != 0
    {
        let carry_value = u8::from(mi & CARRY_VALUE_BIT != 0);
        rendered.push_str(&format!(" (П={carry_value})"));
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::{format, FormatOptions, CARRY_USED_BIT, CARRY_VALUE_BIT, NOP_TEXT};
    use crate::catalog::{self, CATALOG, NOP};

    #[test]
    fn no_match_renders_nop_literal() {
        assert_eq!(format(NOP, FormatOptions::default()), NOP_TEXT);
    }

    #[test]
    fn sum_entry_renders_destination_and_operands() {
        // entry 0: "WR := WR + DI + C"
        let rendered = format(0b000000000, FormatOptions::default());
        assert_eq!(rendered, "РР := РР + ШИНвх");
    }

    #[test]
    fn sum_minus_renders_with_dash() {
        // entry 7: "WR := WR - REG + C"
        let rendered = format(0b011000000, FormatOptions::default());
        assert_eq!(rendered, "РР := РР − РОН");
    }

    #[test]
    fn reg_destination_honors_format_reg_knob() {
        // entry 4: "REG := REG + DI + C", register field = 3
        let opcode = 0b001100_011u16;
        let with_index = format(
            opcode,
            FormatOptions {
                format_reg: true,
                ..Default::default()
            },
        );
        assert!(with_index.starts_with("РОН3"));
        let without_index = format(opcode, FormatOptions::default());
        assert!(without_index.starts_with("РОН :="));
    }

    #[test]
    fn alu_entry_renders_symbolic_when_requested() {
        // entry 17: "WR := ALU(WR, DI)", func=9 (logical xor, bit3 set)
        let opcode = 0b0001_0000u16 | (9 << 5);
        let symbolic = format(
            opcode,
            FormatOptions {
                format_alu: true,
                ..Default::default()
            },
        );
        assert_eq!(symbolic, "РР := РР xor ШИНвх");
        let neutral = format(opcode, FormatOptions::default());
        assert_eq!(neutral, "РР := РР ? ШИНвх");
    }

    #[test]
    fn shift_entry_renders_family_prefix_and_dual_suffix() {
        // index 33: "SAL(WR, XWR)"
        let opcode = CATALOG[33].bit_value;
        let rendered = format(opcode, FormatOptions::default());
        assert_eq!(rendered, "SAL(РР + РРР, РРР)");
    }

    #[test]
    fn carry_annotation_appended_only_when_used_bit_set() {
        // entry 0 consumes CARRY.
        let base = 0b000000000u16;
        let used_and_true = base | CARRY_USED_BIT | CARRY_VALUE_BIT;
        let shown = format(
            used_and_true,
            FormatOptions {
                show_carry: true,
                ..Default::default()
            },
        );
        assert!(shown.ends_with("(П=1)"), "{shown}");

        let used_and_false = base | CARRY_USED_BIT;
        let shown_false = format(
            used_and_false,
            FormatOptions {
                show_carry: true,
                ..Default::default()
            },
        );
        assert!(shown_false.ends_with("(П=0)"), "{shown_false}");

        let not_used = base | CARRY_VALUE_BIT;
        let hidden = format(
            not_used,
            FormatOptions {
                show_carry: true,
                ..Default::default()
            },
        );
        assert!(!hidden.contains('П'), "{hidden}");
    }

    #[test]
    fn disassembler_round_trip_matches_own_index() {
        // Two wildcard-register rows (idx 3 and 24) deliberately overlap
        // more specific rows placed earlier in the catalog; their raw
        // zero-filled `bit_value` collides with those rows (this is the
        // overlap the catalog comments document), so they're probed here at
        // a representative opcode from their actually-reachable domain
        // instead of at `entry.bit_value` directly.
        for (idx, entry) in CATALOG.iter().enumerate() {
            let probe = match idx {
                3 => 0b001000_101u16,  // SUM wildcard register row, reg=5
                24 => 0b0000_1_0010u16, // ALU group A wildcard row, low3=010
                _ => entry.bit_value,
            };
            let rendered = format(probe, FormatOptions::default());
            assert_ne!(rendered, NOP_TEXT, "entry {idx} ({})", entry.help);
            let (found_idx, _) = catalog::decode(probe).unwrap();
            assert_eq!(found_idx, idx, "entry {idx} ({})", entry.help);
        }
    }
}
