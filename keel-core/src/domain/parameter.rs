//! Parameter value references
//!
//! Parameter values may point at other parameters with `%name%`; the engine
//! resolves them when the stage runs. `%%` is a literal percent sign.

/// Names referenced by `%name%` in a parameter value, in order of appearance
pub fn references(value: &str) -> Vec<&str> {
    let mut refs = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            break;
        };
        let name = &after[..end];

        if name.is_empty() {
            rest = &after[end + 1..];
        } else if name.chars().any(char::is_whitespace) {
            // Not a reference; the closing '%' may open the next one
            rest = &after[end..];
        } else {
            refs.push(name);
            rest = &after[end + 1..];
        }
    }

    refs
}
