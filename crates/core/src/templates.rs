//! Message template rendering over `{{variable}}` placeholders.
//!
//! Targets carry an arbitrary variable bag, so rendering scans the template
//! rather than iterating a fixed variable-definition list. Missing variables
//! render as an empty string; malformed placeholders pass through literally.

use std::collections::HashMap;

/// Substitute `{{name}}` placeholders from the variable bag.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some((name, end)) = parse_placeholder(template, i + 2) {
                out.push_str(variables.get(name).map(String::as_str).unwrap_or(""));
                i = end;
                continue;
            }
            // Malformed: emit the braces and keep scanning after them.
            out.push_str("{{");
            i += 2;
        } else {
            let ch = template[i..].chars().next().unwrap_or('\u{FFFD}');
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    out
}

/// Parse a placeholder body starting at `start` (just past `{{`). Returns the
/// variable name and the index past the closing `}}`, or None if the body is
/// unterminated or not a plain identifier.
fn parse_placeholder(template: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &template[start..];
    let close = rest.find("}}")?;
    let name = rest[..close].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some((name, start + close + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_variables() {
        let v = vars(&[("name", "Alice"), ("city", "Lisbon")]);
        assert_eq!(
            render("Hi {{name}}, welcome to {{city}}!", &v),
            "Hi Alice, welcome to Lisbon!"
        );
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let v = vars(&[("name", "Alice")]);
        assert_eq!(render("Hi {{name}}{{title}}!", &v), "Hi Alice!");
    }

    #[test]
    fn test_malformed_placeholder_passes_through() {
        let v = vars(&[("name", "Alice")]);
        assert_eq!(render("Hi {{name", &v), "Hi {{name");
        assert_eq!(render("Open {{ brace }", &v), "Open {{ brace }");
        assert_eq!(render("{{bad name}} x", &v), "{{bad name}} x");
    }

    #[test]
    fn test_whitespace_inside_placeholder() {
        let v = vars(&[("name", "Alice")]);
        assert_eq!(render("Hi {{ name }}", &v), "Hi Alice");
    }

    #[test]
    fn test_unicode_text_preserved() {
        let v = vars(&[("name", "José")]);
        assert_eq!(render("Olá {{name}} ☀", &v), "Olá José ☀");
    }
}
