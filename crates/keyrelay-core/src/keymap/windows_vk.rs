//! Windows Virtual-Key (VK) codes watched by the standard catalog.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code",
//! defined in `<winuser.h>` as `VK_*` (e.g. `VK_RETURN = 0x0D`).  Letters and
//! digits use their ASCII values: `VK_A = 0x41`, `VK_0 = 0x30`.
//!
//! The table order is significant: it is the order in which keys are
//! polled, and so the order of events emitted within a single tick.

use super::{KeyCode, KeyEntry};

/// Standard watched keys in polling order.
pub const STANDARD_KEYS: &[KeyEntry] = &[
    // ── Modifiers and control keys ──────────────────────────────────────────
    (KeyCode(0x10), "Shift"),           // VK_SHIFT
    (KeyCode(0x11), "Ctrl"),            // VK_CONTROL
    (KeyCode(0x12), "Alt"),             // VK_MENU
    (KeyCode(0x14), "Caps Lock"),       // VK_CAPITAL
    (KeyCode(0x09), "Tab"),             // VK_TAB
    (KeyCode(0x26), "Up"),              // VK_UP
    (KeyCode(0x28), "Down"),            // VK_DOWN
    (KeyCode(0x25), "Left"),            // VK_LEFT
    (KeyCode(0x27), "Right"),           // VK_RIGHT
    (KeyCode(0x1B), "Esc"),             // VK_ESCAPE
    (KeyCode(0x0D), "Enter"),           // VK_RETURN
    (KeyCode(0x20), "Space"),           // VK_SPACE
    (KeyCode(0x08), "Backspace"),       // VK_BACK
    (KeyCode(0x2E), "Delete"),          // VK_DELETE
    (KeyCode(0x5B), "Win"),             // VK_LWIN

    // ── Function keys (VK_F1=0x70 … VK_F12=0x7B) ─────────────────────────────
    (KeyCode(0x70), "F1"),
    (KeyCode(0x71), "F2"),
    (KeyCode(0x72), "F3"),
    (KeyCode(0x73), "F4"),
    (KeyCode(0x74), "F5"),
    (KeyCode(0x75), "F6"),
    (KeyCode(0x76), "F7"),
    (KeyCode(0x77), "F8"),
    (KeyCode(0x78), "F9"),
    (KeyCode(0x79), "F10"),
    (KeyCode(0x7A), "F11"),
    (KeyCode(0x7B), "F12"),

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ───────────────────────────────────
    (KeyCode(0x30), "0"),
    (KeyCode(0x31), "1"),
    (KeyCode(0x32), "2"),
    (KeyCode(0x33), "3"),
    (KeyCode(0x34), "4"),
    (KeyCode(0x35), "5"),
    (KeyCode(0x36), "6"),
    (KeyCode(0x37), "7"),
    (KeyCode(0x38), "8"),
    (KeyCode(0x39), "9"),

    // ── Alphabet keys (VK_A=0x41 … VK_Z=0x5A) ────────────────────────────────
    (KeyCode(0x41), "A"),
    (KeyCode(0x42), "B"),
    (KeyCode(0x43), "C"),
    (KeyCode(0x44), "D"),
    (KeyCode(0x45), "E"),
    (KeyCode(0x46), "F"),
    (KeyCode(0x47), "G"),
    (KeyCode(0x48), "H"),
    (KeyCode(0x49), "I"),
    (KeyCode(0x4A), "J"),
    (KeyCode(0x4B), "K"),
    (KeyCode(0x4C), "L"),
    (KeyCode(0x4D), "M"),
    (KeyCode(0x4E), "N"),
    (KeyCode(0x4F), "O"),
    (KeyCode(0x50), "P"),
    (KeyCode(0x51), "Q"),
    (KeyCode(0x52), "R"),
    (KeyCode(0x53), "S"),
    (KeyCode(0x54), "T"),
    (KeyCode(0x55), "U"),
    (KeyCode(0x56), "V"),
    (KeyCode(0x57), "W"),
    (KeyCode(0x58), "X"),
    (KeyCode(0x59), "Y"),
    (KeyCode(0x5A), "Z"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_keys_has_no_duplicate_codes() {
        let unique: HashSet<KeyCode> = STANDARD_KEYS.iter().map(|(code, _)| *code).collect();
        assert_eq!(unique.len(), STANDARD_KEYS.len());
    }

    #[test]
    fn test_standard_keys_covers_letters_digits_and_function_keys() {
        // 15 control keys + 12 function keys + 10 digits + 26 letters
        assert_eq!(STANDARD_KEYS.len(), 63);
    }

    #[test]
    fn test_letters_and_digits_use_ascii_codes() {
        for (code, name) in STANDARD_KEYS {
            if name.len() == 1 {
                let ch = name.as_bytes()[0];
                assert_eq!(code.0, u16::from(ch), "{name} must map to its ASCII code");
            }
        }
    }

    #[test]
    fn test_modifiers_come_first() {
        let first: Vec<&str> = STANDARD_KEYS.iter().take(3).map(|(_, name)| *name).collect();
        assert_eq!(first, vec!["Shift", "Ctrl", "Alt"]);
    }
}
