//! The fixed C-style runtime this compiler's output leans on: a small set
//! of externs every emitted module declares up front.
//!
//! `%String` is `{ i8* data, i32 len }`: an immutable-by-default, pointer
//! plus length pair. Every binding of type `string` additionally owns a
//! private `i1` "has this binding been written through" flag (strings
//! support read by index; write triggers copy-on-write), kept next to the
//! binding's pointer slot rather than on the `%String` itself, since two
//! bindings can share one backing buffer until one of them writes.

/// The struct layout and external declarations every emitted module opens
/// with, before any struct type or function the source declares.
///
/// `debug_mode` additionally declares the runtime's assertion builtins
/// (`-d`/`--debug-mode`); without it the driver's output never references
/// them, so the downstream toolchain never needs to link a debug runtime
/// for a release build.
pub fn prelude(debug_mode: bool) -> String {
    let mut out = String::new();
    out.push_str("%String = type { i8*, i32 }\n\n");
    for line in EXTERNALS {
        out.push_str(line);
        out.push('\n');
    }
    if debug_mode {
        for line in DEBUG_EXTERNALS {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

const EXTERNALS: &[&str] = &[
    "declare i32 @printf(i8*, ...)",
    "declare i8* @malloc(i32)",
    "declare i8* @memcpy(i8*, i8*, i32)",
    "declare i8* @memset(i8*, i32, i32)",
    // String construction and conversion.
    "declare %String* @str_from_bytes(i8*, i32)",
    "declare %String* @strconv_int(i32)",
    "declare %String* @strconv_double(double)",
    "declare %String* @strconv_bool(i1)",
    // `+` on strings, one helper per operand-type permutation — a
    // concatenation of a String with a non-String inserts a canonical
    // conversion call first, which runs before these.
    "declare %String* @strcat_str_str(%String*, %String*)",
    // Copy-on-write support for index-assignment.
    "declare %String* @str_cow_clone(%String*)",
    "declare i32 @str_len(%String*)",
    "declare i8* @str_data(%String*)",
    "declare i32 @str_cmp(%String*, %String*)",
    // console.log's per-type printers; each takes the value and prints it
    // with no trailing newline, the call site emits one newline per call.
    "declare void @print_int(i32)",
    "declare void @print_double(double)",
    "declare void @print_bool(i1)",
    "declare void @print_string(%String*)",
    "declare void @print_newline()",
];

/// Bounds- and invariant-checking helpers only declared under `-d`.
/// `assert_bounds` is what a debug build's array/string index lowering
/// would call before the `getelementptr`; `assert_fail` aborts with a
/// message when a check fails.
const DEBUG_EXTERNALS: &[&str] = &[
    "declare void @assert_bounds(i32, i32)",
    "declare void @assert_fail(i8*)",
];
