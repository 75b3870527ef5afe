//! The string literal pool.
//!
//! Every distinct literal in the source is emitted exactly once as a
//! `private unnamed_addr constant` byte array; call sites reference it
//! through `str_from_literal`, which wraps the raw bytes in a `%String`
//! record so literals and runtime-built strings share one representation.

use rustc_hash::FxHashMap;
use std::fmt::Write as _;

#[derive(Default)]
pub struct StringPool {
    /// Literal text -> global name, in first-sight order so emission is
    /// deterministic across identical inputs.
    order: Vec<String>,
    names: FxHashMap<String, String>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning its global constant name (e.g. `@.str.0`).
    pub fn intern(&mut self, text: &str) -> String {
        if let Some(name) = self.names.get(text) {
            return name.clone();
        }
        let name = format!("@.str.{}", self.order.len());
        self.order.push(text.to_string());
        self.names.insert(text.to_string(), name.clone());
        name
    }

    /// Render every interned literal's backing byte array global.
    pub fn render_globals(&self) -> String {
        let mut out = String::new();
        for (i, text) in self.order.iter().enumerate() {
            let name = &self.names[text];
            debug_assert_eq!(name, &format!("@.str.{i}"));
            let escaped = escape_bytes(text);
            let len = text.as_bytes().len() + 1;
            let _ = writeln!(
                out,
                "{name} = private unnamed_addr constant [{len} x i8] c\"{escaped}\\00\""
            );
        }
        out
    }
}

/// Escape a literal's bytes the way an LLVM-style string constant expects:
/// non-printable and `"`/`\` bytes become `\XX` hex escapes.
fn escape_bytes(text: &str) -> String {
    let mut out = String::new();
    for byte in text.as_bytes() {
        match byte {
            b'"' | b'\\' => {
                out.push('\\');
                out.push_str(&format!("{byte:02X}"));
            }
            0x20..=0x7e => out.push(*byte as char),
            _ => out.push_str(&format!("\\{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_literal_twice_reuses_the_global() {
        let mut pool = StringPool::new();
        let a = pool.intern("hi");
        let b = pool.intern("hi");
        assert_eq!(a, b);
        let c = pool.intern("bye");
        assert_ne!(a, c);
    }

    #[test]
    fn renders_one_global_per_distinct_literal() {
        let mut pool = StringPool::new();
        pool.intern("a");
        pool.intern("b");
        pool.intern("a");
        let rendered = pool.render_globals();
        assert_eq!(rendered.matches("constant").count(), 2);
    }
}
