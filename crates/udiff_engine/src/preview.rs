use similar::TextDiff;

/// Renders a three-line-context unified diff of `original` against `updated`.
#[must_use]
pub fn render_unified(original: &str, updated: &str, label: &str) -> String {
    let old_header = if original.is_empty() {
        "/dev/null".to_string()
    } else {
        format!("a/{label}")
    };
    let new_header = format!("b/{label}");

    TextDiff::from_lines(original, updated)
        .unified_diff()
        .context_radius(3)
        .header(&old_header, &new_header)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::render_unified;

    #[test]
    fn unified_output_names_both_sides() {
        let rendered = render_unified("a\nb\n", "a\nc\n", "src/lib.rs");

        assert!(rendered.starts_with("--- a/src/lib.rs\n+++ b/src/lib.rs\n"));
        assert!(rendered.contains("-b\n"));
        assert!(rendered.contains("+c\n"));
    }

    #[test]
    fn new_file_uses_dev_null() {
        let rendered = render_unified("", "fresh\n", "notes.md");
        assert!(rendered.starts_with("--- /dev/null\n"));
    }

    #[test]
    fn identical_content_renders_nothing() {
        assert_eq!(render_unified("same\n", "same\n", "x"), "");
    }
}
