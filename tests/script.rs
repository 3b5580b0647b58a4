use odkeyscript::script::{compile, disassemble};
use odkeyscript::ScriptError;

#[test]
fn byte_exact_press_fixture() {
    let code = compile("press A").unwrap();
    assert_eq!(
        code,
        vec![0x10, 0x00, 0x01, 0x04, 0x13, 0x1E, 0x00, 0x11, 0x00, 0x01, 0x04, 0x13, 0x1E, 0x00]
    );
}

#[test]
fn disassembly_round_trips_a_compiled_program() {
    let source = r#"
        press_time 50
        keydn M_LEFTSHIFT A
        pause 5
        keyup
        type "Go!"
        repeat 4 {
            press SPACE
        }
    "#;
    let code = compile(source).unwrap();
    let lines = disassemble(&code);
    assert!(!lines.is_empty());
    assert!(!lines.iter().any(|l| l.contains("incomplete")));
    assert!(!lines.iter().any(|l| l.contains("UNKNOWN")));
    assert!(lines[0].contains("KEYDN"));
    assert!(lines[0].contains("M_LEFTSHIFT"));
    assert!(lines[0].contains('A'));
}

#[test]
fn rejects_unknown_key() {
    let err = compile("press UNKNOWN_KEY").unwrap_err();
    assert!(matches!(err, ScriptError::Semantic { .. }));
}

#[test]
fn rejects_seventh_simultaneous_key() {
    assert!(compile("keydn A B C D E F G").is_err());
}

#[test]
fn rejects_unclosed_repeat_block() {
    assert!(compile("repeat 3 { press A").is_err());
}

#[test]
fn rejects_repeat_count_overflow() {
    assert!(compile("repeat 65536 { press A }").is_err());
}

#[test]
fn rejects_interkey_time_overflow() {
    assert!(compile("interkey_time 65536").is_err());
}

#[test]
fn rejects_deeply_nested_repeats() {
    let mut source = "repeat 1 { ".repeat(257);
    source.push_str("press A");
    source.push_str(&"}".repeat(257));
    assert!(compile(&source).is_err());
}

#[test]
fn disassembler_reports_incomplete_instructions() {
    let lines = disassemble(&[0x10, 0x00]);
    assert_eq!(lines, vec!["0x0000: KEYDN (incomplete)"]);
}

#[test]
fn disassembler_continues_past_unknown_opcodes() {
    let lines = disassemble(&[0xAA, 0x12]);
    assert_eq!(
        lines,
        vec!["0x0000: UNKNOWN_OPCODE 0xAA", "0x0001: KEYUP_ALL"]
    );
}
