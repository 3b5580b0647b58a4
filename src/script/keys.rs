//! Static key, modifier and printable-character lookup tables.
//!
//! The codes match the USB HID Keyboard/Keypad usage page (letters
//! 0x04-0x1D, digits 0x1E-0x27, punctuation 0x2D-0x38, function keys
//! 0x3A-0x45, navigation 0x47-0x52, keypad 0x53-0x63, modifiers 0xE0-0xE7),
//! extended with the vendor's media/consumer-control codes used by the
//! firmware.

use phf::phf_map;

/// Textual key name to HID usage code, used by the lexer/parser.
pub static KEY_CODES: phf::Map<&'static str, u8> = phf_map! {
    "A" => 0x04, "B" => 0x05, "C" => 0x06, "D" => 0x07, "E" => 0x08,
    "F" => 0x09, "G" => 0x0A, "H" => 0x0B, "I" => 0x0C, "J" => 0x0D,
    "K" => 0x0E, "L" => 0x0F, "M" => 0x10, "N" => 0x11, "O" => 0x12,
    "P" => 0x13, "Q" => 0x14, "R" => 0x15, "S" => 0x16, "T" => 0x17,
    "U" => 0x18, "V" => 0x19, "W" => 0x1A, "X" => 0x1B, "Y" => 0x1C,
    "Z" => 0x1D,
    "1" => 0x1E, "2" => 0x1F, "3" => 0x20, "4" => 0x21, "5" => 0x22,
    "6" => 0x23, "7" => 0x24, "8" => 0x25, "9" => 0x26, "0" => 0x27,
    "ENTER" => 0x28, "ESCAPE" => 0x29, "BACKSPACE" => 0x2A, "TAB" => 0x2B,
    "SPACE" => 0x2C, "MINUS" => 0x2D, "EQUAL" => 0x2E, "LEFTBRACE" => 0x2F,
    "RIGHTBRACE" => 0x30, "BACKSLASH" => 0x31, "NONUS_HASH" => 0x32,
    "SEMICOLON" => 0x33, "APOSTROPHE" => 0x34, "GRAVE" => 0x35,
    "COMMA" => 0x36, "DOT" => 0x37, "SLASH" => 0x38, "CAPSLOCK" => 0x39,
    "F1" => 0x3A, "F2" => 0x3B, "F3" => 0x3C, "F4" => 0x3D, "F5" => 0x3E,
    "F6" => 0x3F, "F7" => 0x40, "F8" => 0x41, "F9" => 0x42, "F10" => 0x43,
    "F11" => 0x44, "F12" => 0x45,
    "SCROLLLOCK" => 0x47, "PAUSE" => 0x48, "INSERT" => 0x49, "HOME" => 0x4A,
    "PAGEUP" => 0x4B, "DELETE" => 0x4C, "END" => 0x4D, "PAGEDOWN" => 0x4E,
    "RIGHT" => 0x4F, "LEFT" => 0x50, "DOWN" => 0x51, "UP" => 0x52,
    "NUMLOCK" => 0x53, "KP_SLASH" => 0x54, "KP_ASTERISK" => 0x55,
    "KP_MINUS" => 0x56, "KP_PLUS" => 0x57, "KP_ENTER" => 0x58,
    "KP_1" => 0x59, "KP_2" => 0x5A, "KP_3" => 0x5B, "KP_4" => 0x5C,
    "KP_5" => 0x5D, "KP_6" => 0x5E, "KP_7" => 0x5F, "KP_8" => 0x60,
    "KP_9" => 0x61, "KP_0" => 0x62, "KP_DOT" => 0x63,
    "APPLICATION" => 0x65, "MENU" => 0x76,
    "HENKAN" => 0x8A, "MUHENKAN" => 0x8B, "KATAKANAHIRAGANA" => 0x8C,
    "HANGEUL" => 0x90, "HANJA" => 0x91,
    "POWER" => 0x81, "SLEEP" => 0x82, "WAKE" => 0x83,
    "LEFTCTRL" => 0xE0, "LEFTSHIFT" => 0xE1, "LEFTALT" => 0xE2,
    "LEFTMETA" => 0xE3, "RIGHTCTRL" => 0xE4, "RIGHTSHIFT" => 0xE5,
    "RIGHTALT" => 0xE6, "RIGHTMETA" => 0xE7,
    "MEDIA_PLAY_PAUSE" => 0xE8, "MEDIA_STOP" => 0xE9,
    "MEDIA_PREVIOUS" => 0xEA, "MEDIA_NEXT" => 0xEB,
    "MEDIA_VOLUME_UP" => 0xEC, "MEDIA_VOLUME_DOWN" => 0xED,
    "MEDIA_MUTE" => 0xEE, "MEDIA_EJECT" => 0xB3, "MEDIA_RECORD" => 0xB4,
    "MEDIA_REWIND" => 0xB5, "MEDIA_FAST_FORWARD" => 0xB6,
    "CALCULATOR" => 0xA1, "MYCOMPUTER" => 0xA2, "WWW_SEARCH" => 0xA3,
    "WWW_HOME" => 0xA4, "WWW_BACK" => 0xA5, "WWW_FORWARD" => 0xA6,
    "WWW_STOP" => 0xA7, "WWW_REFRESH" => 0xA8, "WWW_FAVORITES" => 0xA9,
    "MAIL" => 0xAA, "COMPOSE" => 0xAB, "BROWSER_BACK" => 0xAC,
    "BROWSER_FORWARD" => 0xAD, "BROWSER_REFRESH" => 0xAE,
    "BROWSER_STOP" => 0xAF, "BROWSER_SEARCH" => 0xB0,
    "BROWSER_FAVORITES" => 0xB1, "BROWSER_HOME" => 0xB2,
    "GAME" => 0xB7, "CHAT" => 0xB8, "ZOOM" => 0xB9, "PRESENTATION" => 0xBA,
    "SPREADSHEET" => 0xBB, "LANGUAGE" => 0xBC,
};

/// HID usage code to textual key name, used by the disassembler. Codes with
/// more than one name in [`KEY_CODES`] (there are none currently) would
/// render using whichever wins `phf`'s build-time dedup; the tables are kept
/// in sync by hand and exercised by a round-trip test.
pub static KEY_NAMES: phf::Map<u8, &'static str> = phf_map! {
    4u8 => "A", 5u8 => "B", 6u8 => "C", 7u8 => "D", 8u8 => "E",
    9u8 => "F", 10u8 => "G", 11u8 => "H", 12u8 => "I", 13u8 => "J",
    14u8 => "K", 15u8 => "L", 16u8 => "M", 17u8 => "N", 18u8 => "O",
    19u8 => "P", 20u8 => "Q", 21u8 => "R", 22u8 => "S", 23u8 => "T",
    24u8 => "U", 25u8 => "V", 26u8 => "W", 27u8 => "X", 28u8 => "Y",
    29u8 => "Z",
    30u8 => "1", 31u8 => "2", 32u8 => "3", 33u8 => "4", 34u8 => "5",
    35u8 => "6", 36u8 => "7", 37u8 => "8", 38u8 => "9", 39u8 => "0",
    40u8 => "ENTER", 41u8 => "ESCAPE", 42u8 => "BACKSPACE", 43u8 => "TAB",
    44u8 => "SPACE", 45u8 => "MINUS", 46u8 => "EQUAL", 47u8 => "LEFTBRACE",
    48u8 => "RIGHTBRACE", 49u8 => "BACKSLASH", 50u8 => "NONUS_HASH",
    51u8 => "SEMICOLON", 52u8 => "APOSTROPHE", 53u8 => "GRAVE",
    54u8 => "COMMA", 55u8 => "DOT", 56u8 => "SLASH", 57u8 => "CAPSLOCK",
    58u8 => "F1", 59u8 => "F2", 60u8 => "F3", 61u8 => "F4", 62u8 => "F5",
    63u8 => "F6", 64u8 => "F7", 65u8 => "F8", 66u8 => "F9", 67u8 => "F10",
    68u8 => "F11", 69u8 => "F12",
    71u8 => "SCROLLLOCK", 72u8 => "PAUSE", 73u8 => "INSERT", 74u8 => "HOME",
    75u8 => "PAGEUP", 76u8 => "DELETE", 77u8 => "END", 78u8 => "PAGEDOWN",
    79u8 => "RIGHT", 80u8 => "LEFT", 81u8 => "DOWN", 82u8 => "UP",
    83u8 => "NUMLOCK", 84u8 => "KP_SLASH", 85u8 => "KP_ASTERISK",
    86u8 => "KP_MINUS", 87u8 => "KP_PLUS", 88u8 => "KP_ENTER",
    89u8 => "KP_1", 90u8 => "KP_2", 91u8 => "KP_3", 92u8 => "KP_4",
    93u8 => "KP_5", 94u8 => "KP_6", 95u8 => "KP_7", 96u8 => "KP_8",
    97u8 => "KP_9", 98u8 => "KP_0", 99u8 => "KP_DOT",
    101u8 => "APPLICATION", 118u8 => "MENU",
    129u8 => "POWER", 130u8 => "SLEEP", 131u8 => "WAKE",
    138u8 => "HENKAN", 139u8 => "MUHENKAN", 140u8 => "KATAKANAHIRAGANA",
    144u8 => "HANGEUL", 145u8 => "HANJA",
    224u8 => "LEFTCTRL", 225u8 => "LEFTSHIFT", 226u8 => "LEFTALT",
    227u8 => "LEFTMETA", 228u8 => "RIGHTCTRL", 229u8 => "RIGHTSHIFT",
    230u8 => "RIGHTALT", 231u8 => "RIGHTMETA",
    232u8 => "MEDIA_PLAY_PAUSE", 233u8 => "MEDIA_STOP",
    234u8 => "MEDIA_PREVIOUS", 235u8 => "MEDIA_NEXT",
    236u8 => "MEDIA_VOLUME_UP", 237u8 => "MEDIA_VOLUME_DOWN",
    238u8 => "MEDIA_MUTE",
};

/// Modifier name to bitmask bit.
pub static MODIFIER_BITS: phf::Map<&'static str, u8> = phf_map! {
    "M_LEFTCTRL" => 0x01,
    "M_LEFTSHIFT" => 0x02,
    "M_LEFTALT" => 0x04,
    "M_LEFTGUI" => 0x08,
    "M_RIGHTCTRL" => 0x10,
    "M_RIGHTSHIFT" => 0x20,
    "M_RIGHTALT" => 0x40,
    "M_RIGHTGUI" => 0x80,
};

/// Modifier bits in ascending order with their names, for the disassembler.
pub static MODIFIER_NAMES: &[(u8, &str)] = &[
    (0x01, "M_LEFTCTRL"),
    (0x02, "M_LEFTSHIFT"),
    (0x04, "M_LEFTALT"),
    (0x08, "M_LEFTGUI"),
    (0x10, "M_RIGHTCTRL"),
    (0x20, "M_RIGHTSHIFT"),
    (0x40, "M_RIGHTALT"),
    (0x80, "M_RIGHTGUI"),
];

/// Maps a printable ASCII character (as typed in a `type "..."` statement)
/// to the `(keycode, modifier_mask)` pair the device should press, following
/// the fallback rule in [`char_to_keycode`] for anything not listed here.
static CHAR_MAP: phf::Map<char, (u8, u8)> = phf_map! {
    '\t' => (0x2B, 0), // TAB
    '\n' => (0x28, 0), // ENTER
    '!' => (0x1E, 0x02), '@' => (0x1F, 0x02), '#' => (0x20, 0x02),
    '$' => (0x21, 0x02), '%' => (0x22, 0x02), '^' => (0x23, 0x02),
    '&' => (0x24, 0x02), '*' => (0x25, 0x02), '(' => (0x26, 0x02),
    ')' => (0x27, 0x02),
    '_' => (0x2D, 0x02), '+' => (0x2E, 0x02), '{' => (0x2F, 0x02),
    '}' => (0x30, 0x02), '|' => (0x31, 0x02), ':' => (0x33, 0x02),
    '<' => (0x36, 0x02), '>' => (0x37, 0x02), '?' => (0x38, 0x02),
    '~' => (0x35, 0x02), '"' => (0x34, 0x02),
    '-' => (0x2D, 0), '=' => (0x2E, 0), '[' => (0x2F, 0), ']' => (0x30, 0),
    '\\' => (0x31, 0), ';' => (0x33, 0), '\'' => (0x34, 0), '`' => (0x35, 0),
    ',' => (0x36, 0), '.' => (0x37, 0), '/' => (0x38, 0),
    ' ' => (0x2C, 0), // SPACE
};

/// Converts a character typed by a `type "..."` statement into a
/// `(keycode, modifier_mask)` pair.
///
/// Lowercase letters map to the letter code with no modifier; uppercase
/// letters map to the same code with `M_LEFTSHIFT`; digits map directly. Any
/// character with no entry falls back to `SPACE` with no modifier — a
/// deliberate, documented choice preserved from the original implementation
/// (see the strict-typing redesign flag on [`crate::script::Compiler`]).
pub fn char_to_keycode(c: char) -> (u8, u8) {
    lookup_keycode(c).unwrap_or((KEY_CODES["SPACE"], 0))
}

/// Looks up a character's `(keycode, modifier_mask)` pair without applying
/// the `SPACE` fallback, so callers can distinguish "maps to space" from
/// "has no mapping at all".
pub fn lookup_keycode(c: char) -> Option<(u8, u8)> {
    if c.is_ascii_alphabetic() {
        let upper = c.to_ascii_uppercase();
        let code = KEY_CODES[upper.to_string().as_str()];
        return Some(if c.is_uppercase() { (code, 0x02) } else { (code, 0) });
    }

    if c.is_ascii_digit() {
        return Some((KEY_CODES[c.to_string().as_str()], 0));
    }

    CHAR_MAP.get(&c).copied()
}
