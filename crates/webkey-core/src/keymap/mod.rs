//! Key symbol translation table for browser keyboard clients.
//!
//! The browser sends each key as a symbolic name: a printable character
//! (`"A"`, `"7"`, `"="`), a bracketed name (`"{enter}"`,
//! `"{shiftleft}"`, `"{arrowup}"`) or a bare word (`"f1"`, `"esc"`).
//! This module owns the one table that maps those symbols to Linux
//! input event key codes.
//!
//! The table is immutable and built once on first use.  Lookups are
//! exact, case-sensitive string matches: the client sends letters
//! uppercase (they name the keycap, not the typed character), so no
//! normalisation happens here.

use std::collections::HashMap;
use std::sync::LazyLock;

pub mod codes;

use codes::*;

/// Symbol → Linux key code, the full set of keys the virtual keyboard
/// can ever emit.  Entries mirror the on-screen keyboard layout served
/// to the browser.
static SYMBOL_TABLE: LazyLock<HashMap<&'static str, u16>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Digit row
    m.insert("0", KEY_0);
    m.insert("1", KEY_1);
    m.insert("2", KEY_2);
    m.insert("3", KEY_3);
    m.insert("4", KEY_4);
    m.insert("5", KEY_5);
    m.insert("6", KEY_6);
    m.insert("7", KEY_7);
    m.insert("8", KEY_8);
    m.insert("9", KEY_9);

    // Letters
    m.insert("A", KEY_A);
    m.insert("B", KEY_B);
    m.insert("C", KEY_C);
    m.insert("D", KEY_D);
    m.insert("E", KEY_E);
    m.insert("F", KEY_F);
    m.insert("G", KEY_G);
    m.insert("H", KEY_H);
    m.insert("I", KEY_I);
    m.insert("J", KEY_J);
    m.insert("K", KEY_K);
    m.insert("L", KEY_L);
    m.insert("M", KEY_M);
    m.insert("N", KEY_N);
    m.insert("O", KEY_O);
    m.insert("P", KEY_P);
    m.insert("Q", KEY_Q);
    m.insert("R", KEY_R);
    m.insert("S", KEY_S);
    m.insert("T", KEY_T);
    m.insert("U", KEY_U);
    m.insert("V", KEY_V);
    m.insert("W", KEY_W);
    m.insert("X", KEY_X);
    m.insert("Y", KEY_Y);
    m.insert("Z", KEY_Z);

    // Punctuation keys.  The on-screen keyboard labels these with their
    // shifted glyphs, so the symbol is the shifted character while the
    // code is the unshifted physical key.
    m.insert("<", KEY_COMMA);
    m.insert(">", KEY_DOT);
    m.insert("-", KEY_MINUS);
    m.insert(":", KEY_SEMICOLON);
    m.insert("\"", KEY_APOSTROPHE);
    m.insert("?", KEY_SLASH);
    m.insert("=", KEY_EQUAL);
    m.insert("`", KEY_GRAVE);
    m.insert("|", KEY_BACKSLASH);
    m.insert("{", KEY_LEFTBRACE);
    m.insert("}", KEY_RIGHTBRACE);

    // Named keys
    m.insert("{enter}", KEY_ENTER);
    m.insert("{space}", KEY_SPACE);
    m.insert("{backspace}", KEY_BACKSPACE);
    m.insert("{shiftleft}", KEY_LEFTSHIFT);
    m.insert("{arrowup}", KEY_UP);
    m.insert("{arrowdown}", KEY_DOWN);
    m.insert("{arrowleft}", KEY_LEFT);
    m.insert("{arrowright}", KEY_RIGHT);
    m.insert("{altleft}", KEY_LEFTALT);
    m.insert("{altright}", KEY_RIGHTALT);
    m.insert("{controlleft}", KEY_LEFTCTRL);
    m.insert("{controlright}", KEY_RIGHTCTRL);
    m.insert("{meta}", KEY_LEFTMETA);
    m.insert("{tab}", KEY_TAB);
    m.insert("{capslock}", KEY_CAPSLOCK);
    m.insert("esc", KEY_ESC);

    // Function row
    m.insert("f1", KEY_F1);
    m.insert("f2", KEY_F2);
    m.insert("f3", KEY_F3);
    m.insert("f4", KEY_F4);
    m.insert("f5", KEY_F5);
    m.insert("f6", KEY_F6);
    m.insert("f7", KEY_F7);
    m.insert("f8", KEY_F8);
    m.insert("f9", KEY_F9);
    m.insert("f10", KEY_F10);
    m.insert("f11", KEY_F11);
    m.insert("f12", KEY_F12);

    m
});

/// Resolves a key symbol to its Linux key code.
///
/// Returns `None` for symbols outside the table; the caller decides
/// what to do with unmapped keys (the session loop drops them).
pub fn lookup(symbol: &str) -> Option<u16> {
    SYMBOL_TABLE.get(symbol).copied()
}

/// All key codes reachable through the table, for declaring device
/// capabilities before the virtual keyboard is created.
///
/// A code not declared here can never be injected, so the device setup
/// must consume this iterator in full.
pub fn mapped_codes() -> impl Iterator<Item = u16> {
    SYMBOL_TABLE.values().copied()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_letter() {
        assert_eq!(lookup("A"), Some(codes::KEY_A));
        assert_eq!(lookup("Z"), Some(codes::KEY_Z));
    }

    #[test]
    fn test_lookup_digit() {
        assert_eq!(lookup("0"), Some(codes::KEY_0));
        assert_eq!(lookup("9"), Some(codes::KEY_9));
    }

    #[test]
    fn test_lookup_bracketed_names() {
        assert_eq!(lookup("{enter}"), Some(codes::KEY_ENTER));
        assert_eq!(lookup("{shiftleft}"), Some(codes::KEY_LEFTSHIFT));
        assert_eq!(lookup("{arrowup}"), Some(codes::KEY_UP));
        assert_eq!(lookup("{meta}"), Some(codes::KEY_LEFTMETA));
    }

    #[test]
    fn test_lookup_function_row() {
        assert_eq!(lookup("f1"), Some(codes::KEY_F1));
        assert_eq!(lookup("f11"), Some(codes::KEY_F11));
        assert_eq!(lookup("f12"), Some(codes::KEY_F12));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        // Lowercase letters are not valid symbols; the client sends
        // keycap names, which are uppercase.
        assert_eq!(lookup("a"), None);
        assert_eq!(lookup("{ENTER}"), None);
    }

    #[test]
    fn test_lookup_unknown_symbol_returns_none() {
        assert_eq!(lookup("Ω"), None);
        assert_eq!(lookup(""), None);
        assert_eq!(lookup("{bogus}"), None);
    }

    #[test]
    fn test_shifted_punctuation_maps_to_unshifted_key() {
        assert_eq!(lookup("<"), Some(codes::KEY_COMMA));
        assert_eq!(lookup("?"), Some(codes::KEY_SLASH));
        assert_eq!(lookup("\""), Some(codes::KEY_APOSTROPHE));
    }

    #[test]
    fn test_mapped_codes_covers_every_table_entry() {
        let codes: HashSet<u16> = mapped_codes().collect();
        assert!(codes.contains(&codes::KEY_A));
        assert!(codes.contains(&codes::KEY_F12));
        assert!(codes.contains(&codes::KEY_LEFTMETA));
        // Distinct symbols can share a code, but every code must be
        // declared at most once per device setup pass.
        assert!(codes.len() <= SYMBOL_TABLE.len());
    }
}
