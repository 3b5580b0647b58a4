//! Byte-walking disassembler producing human-readable bytecode listings.

use super::keys::{KEY_NAMES, MODIFIER_NAMES};
use super::opcodes::*;

fn format_modifiers(mask: u8) -> String {
    MODIFIER_NAMES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_keys(keys: &[u8]) -> String {
    keys.iter()
        .map(|&k| {
            KEY_NAMES
                .get(&k)
                .copied()
                .map(String::from)
                .unwrap_or_else(|| format!("0x{k:02X}"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Disassembles `bytecode` into one listing line per instruction, of the
/// form `0x{offset:04X}: MNEMONIC operands`.
///
/// Truncated instructions are rendered as `MNEMONIC (incomplete)` at the
/// offset of their opcode byte, and the walk stops there since there is no
/// way to know how many bytes the missing operands would have consumed. An
/// unrecognized opcode byte is rendered as `UNKNOWN_OPCODE 0x{byte:02X}` and
/// the walk continues from the next byte.
pub fn disassemble(bytecode: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pc = 0usize;
    let len = bytecode.len();

    while pc < len {
        let start = pc;
        let opcode = bytecode[pc];
        pc += 1;

        match opcode {
            KEYDN | KEYUP => {
                let mnemonic = if opcode == KEYDN { "KEYDN" } else { "KEYUP" };
                if pc + 2 > len {
                    lines.push(format!("0x{start:04X}: {mnemonic} (incomplete)"));
                    break;
                }
                let modifiers = bytecode[pc];
                let count = bytecode[pc + 1] as usize;
                if pc + 2 + count > len {
                    lines.push(format!("0x{start:04X}: {mnemonic} (incomplete)"));
                    break;
                }
                let keys = &bytecode[pc + 2..pc + 2 + count];
                pc += 2 + count;
                let mods = format_modifiers(modifiers);
                let keystr = format_keys(keys);
                let operands = [mods, keystr]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if operands.is_empty() {
                    lines.push(format!("0x{start:04X}: {mnemonic}"));
                } else {
                    lines.push(format!("0x{start:04X}: {mnemonic} {operands}"));
                }
            }
            KEYUP_ALL => {
                lines.push(format!("0x{start:04X}: KEYUP_ALL"));
            }
            WAIT => {
                if pc + 2 > len {
                    lines.push(format!("0x{start:04X}: WAIT (incomplete)"));
                    break;
                }
                let ms = u16::from_le_bytes([bytecode[pc], bytecode[pc + 1]]);
                pc += 2;
                lines.push(format!("0x{start:04X}: WAIT {ms}"));
            }
            SET_COUNTER => {
                if pc + 3 > len {
                    lines.push(format!("0x{start:04X}: SET_COUNTER (incomplete)"));
                    break;
                }
                let counter = bytecode[pc];
                let value = u16::from_le_bytes([bytecode[pc + 1], bytecode[pc + 2]]);
                pc += 3;
                lines.push(format!("0x{start:04X}: SET_COUNTER {counter} {value}"));
            }
            DEC => {
                if pc + 1 > len {
                    lines.push(format!("0x{start:04X}: DEC (incomplete)"));
                    break;
                }
                let counter = bytecode[pc];
                pc += 1;
                lines.push(format!("0x{start:04X}: DEC {counter}"));
            }
            JNZ => {
                if pc + 4 > len {
                    lines.push(format!("0x{start:04X}: JNZ (incomplete)"));
                    break;
                }
                let target = u32::from_le_bytes(bytecode[pc..pc + 4].try_into().unwrap());
                pc += 4;
                lines.push(format!("0x{start:04X}: JNZ 0x{target:04X}"));
            }
            other => {
                lines.push(format!("0x{start:04X}: UNKNOWN_OPCODE 0x{other:02X}"));
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::compiler::compile;

    #[test]
    fn disassembles_press() {
        let code = compile("press A").unwrap();
        let lines = disassemble(&code);
        assert_eq!(lines[0], "0x0000: KEYDN A");
        assert!(lines[1].starts_with("0x0004: WAIT"));
        assert!(lines[2].starts_with("0x0007: KEYUP A"));
    }

    #[test]
    fn reports_incomplete_trailing_instruction() {
        let lines = disassemble(&[KEYDN, 0x00]);
        assert_eq!(lines, vec!["0x0000: KEYDN (incomplete)"]);
    }

    #[test]
    fn reports_unknown_opcode_and_continues() {
        let lines = disassemble(&[0xFF, KEYUP_ALL]);
        assert_eq!(
            lines,
            vec!["0x0000: UNKNOWN_OPCODE 0xFF", "0x0001: KEYUP_ALL"]
        );
    }

    #[test]
    fn formats_multiple_keys_and_modifiers_space_separated() {
        let code = compile("keydn M_LEFTSHIFT M_LEFTCTRL A B").unwrap();
        let lines = disassemble(&code);
        assert_eq!(lines[0], "0x0000: KEYDN M_LEFTCTRL M_LEFTSHIFT A B");
    }

    #[test]
    fn formats_repeat_loop() {
        let code = compile("repeat 2 { keyup }").unwrap();
        let lines = disassemble(&code);
        assert!(lines[0].starts_with("0x0000: SET_COUNTER 0 2"));
        assert!(lines.iter().any(|l| l.contains("DEC 0")));
        assert!(lines.iter().any(|l| l.contains("JNZ 0x0004")));
    }

    #[test]
    fn round_trips_opcode_and_operand_values() {
        let code = compile("press A\nrepeat 2 { keydn M_LEFTSHIFT B }").unwrap();
        let lines = disassemble(&code);
        assert!(!lines.iter().any(|l| l.contains("incomplete") || l.contains("UNKNOWN")));
    }
}
