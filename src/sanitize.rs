//! Prompt → identifier sanitization.
//!
//! The synthesized module names each factory after its prompt, and the
//! client resolver looks factories up by the same derived name, so both
//! sides must go through [`sanitize`].

/// Derive a programmatic identifier from arbitrary prompt text.
///
/// Every UTF-16 code unit outside `[A-Za-z0-9_]` becomes `_`, a leading digit is
/// prefixed with `_`, and one leading `a_` or `an_` article is stripped.
///
/// ```rust
/// use ai_gen::sanitize::sanitize;
///
/// assert_eq!(sanitize("a blue button"), "blue_button");
/// assert_eq!(sanitize("5 widgets"), "_5_widgets");
/// ```
pub fn sanitize(prompt: &str) -> String {
    // One `_` per UTF-16 code unit, matching what the JavaScript side
    // produces for characters outside the Basic Multilingual Plane.
    let mut ident = String::with_capacity(prompt.len());
    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            ident.push(c);
        } else {
            ident.extend(std::iter::repeat_n('_', c.len_utf16()));
        }
    }

    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }

    if let Some(rest) = ident.strip_prefix("a_") {
        return rest.to_string();
    }
    if let Some(rest) = ident.strip_prefix("an_") {
        return rest.to_string();
    }
    ident
}

/// Whether `name` can be emitted as a binding name in generated source.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
