//! CSS Custom Properties for Cascading Variables Module Level 1: CSS variables.
//! Spec: <https://www.w3.org/TR/css-variables-1/>

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// The two-character marker every custom property name starts with.
pub const CUSTOM_PROPERTY_PREFIX: &str = "--";

/// A set of custom properties keyed by name (including the leading `--`).
///
/// Sorted so that iteration and serialization are deterministic.
pub type CustomProperties = BTreeMap<String, String>;

/// True when `name` is a custom property name: `--` followed by at least one character.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#custom-property>
pub fn is_custom_property_name(name: &str) -> bool {
    name.len() > CUSTOM_PROPERTY_PREFIX.len() && name.starts_with(CUSTOM_PROPERTY_PREFIX)
}

/// Keep only the custom properties out of a `(name, value)` sequence.
///
/// Later entries win for duplicate names, matching source order.
pub fn extract_custom_properties<'decl>(
    declarations: impl IntoIterator<Item = (&'decl str, &'decl str)>,
) -> CustomProperties {
    declarations
        .into_iter()
        .filter(|(name, _)| is_custom_property_name(name))
        .map(|(name, value)| (name.to_owned(), value.trim().to_owned()))
        .collect()
}

/// Why a value could not be substituted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarError {
    /// A `var()` referenced an undefined or cyclic property and had no usable fallback.
    InvalidReference,
}

/// Substitute every `var()` in `value_text` using `environment`.
///
/// References are resolved recursively. A reference that is missing or part of
/// a cycle falls back to its fallback argument when present; otherwise the
/// whole value is invalid at computed-value time.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#substitute-a-var>
///
/// # Errors
/// Returns [`VarError::InvalidReference`] when a reference cannot be resolved.
pub fn substitute_vars(value_text: &str, environment: &CustomProperties) -> Result<String, VarError> {
    substitute_internal(value_text, environment, &mut Vec::new())
}

/// Compute every custom property of `environment` with references substituted.
///
/// Properties that are invalid at computed-value time (including cycles)
/// compute to the empty string.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#cycles>
pub fn compute_custom_properties(environment: &CustomProperties) -> CustomProperties {
    environment
        .iter()
        .map(|(name, raw)| {
            let mut stack = vec![name.clone()];
            let computed = substitute_internal(raw, environment, &mut stack).unwrap_or_default();
            (name.clone(), computed.trim().to_owned())
        })
        .collect()
}

fn substitute_internal(
    value_text: &str,
    environment: &CustomProperties,
    stack: &mut Vec<String>,
) -> Result<String, VarError> {
    let mut out = String::with_capacity(value_text.len());
    let mut rest = value_text;
    while let Some(start) = find_var_call(rest) {
        let (head, after) = rest.split_at(start);
        out.push_str(head);
        let args_start = "var(".len();
        let Some(args_len) = matching_paren(after.get(args_start..).unwrap_or("")) else {
            // Unterminated `var(`: keep the tail verbatim.
            out.push_str(after);
            return Ok(out);
        };
        let args = after.get(args_start..args_start + args_len).unwrap_or("");
        out.push_str(&resolve_reference(args, environment, stack)?);
        rest = after.get(args_start + args_len + 1..).unwrap_or("");
    }
    out.push_str(rest);
    Ok(out)
}

/// Resolve `--name` or `--name, fallback`.
fn resolve_reference(
    args: &str,
    environment: &CustomProperties,
    stack: &mut Vec<String>,
) -> Result<String, VarError> {
    let (name, fallback) = match args.split_once(',') {
        Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
        None => (args.trim(), None),
    };
    let use_fallback = |stack: &mut Vec<String>| match fallback {
        Some(fallback_text) => substitute_internal(fallback_text, environment, stack),
        None => Err(VarError::InvalidReference),
    };
    if !is_custom_property_name(name) || stack.iter().any(|seen| seen == name) {
        return use_fallback(stack);
    }
    let Some(raw) = environment.get(name).filter(|raw| !raw.trim().is_empty()) else {
        return use_fallback(stack);
    };
    stack.push(name.to_owned());
    let resolved = substitute_internal(raw, environment, stack);
    stack.pop();
    match resolved {
        Ok(value) => Ok(value.trim().to_owned()),
        Err(_) => use_fallback(stack),
    }
}

/// Byte offset of the next `var(` call, matched ASCII case-insensitively.
fn find_var_call(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(4)
        .position(|window| window.eq_ignore_ascii_case(b"var("))
}

/// Length of the argument text up to the `)` balancing an already consumed `(`.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    for (index, byte) in text.bytes().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' if depth == 0 => return Some(index),
            b')' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> CustomProperties {
        extract_custom_properties(pairs.iter().copied())
    }

    #[test]
    fn recognizes_custom_property_names() {
        assert!(is_custom_property_name("--primary-color"));
        assert!(!is_custom_property_name("--"));
        assert!(!is_custom_property_name("color"));
        assert_eq!(env(&[("color", "red"), ("--a", " 1 ")]).len(), 1);
    }

    #[test]
    fn substitutes_nested_references_and_fallbacks() {
        let vars = env(&[("--base", "4px"), ("--gap", "calc(var(--base) * 2)")]);
        assert_eq!(substitute_vars("var(--gap)", &vars), Ok("calc(4px * 2)".to_owned()));
        assert_eq!(
            substitute_vars("var(--missing, rgb(0, 0, 0))", &vars),
            Ok("rgb(0, 0, 0)".to_owned())
        );
        assert_eq!(substitute_vars("var(--missing)", &vars), Err(VarError::InvalidReference));
    }

    #[test]
    fn cycles_compute_to_empty() {
        let vars = env(&[("--a", "var(--b)"), ("--b", "var(--a)"), ("--c", "var(--a, 1px)")]);
        let computed = compute_custom_properties(&vars);
        assert_eq!(computed["--a"], "");
        assert_eq!(computed["--b"], "");
        assert_eq!(computed["--c"], "1px");
    }
}
