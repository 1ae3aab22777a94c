/// One `@@`-delimited unit of a diff, reduced to its search and replace blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    /// Context and deletion lines, in diff order.
    pub search: Vec<String>,
    /// Context and addition lines, in diff order.
    pub replace: Vec<String>,
}

impl Hunk {
    #[must_use]
    pub fn search_block(&self) -> String {
        self.search.join("\n")
    }

    #[must_use]
    pub fn replace_block(&self) -> String {
        self.replace.join("\n")
    }
}

/// Splits a diff into hunks.
///
/// Everything before the first `@@` line (including `---`/`+++` headers) is
/// skipped, as is any line inside a hunk without a recognised prefix.
#[must_use]
pub fn parse_hunks(diff: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in diff.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(Hunk::default());
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        if let Some(text) = line.strip_prefix(' ') {
            hunk.search.push(text.to_string());
            hunk.replace.push(text.to_string());
        } else if let Some(text) = line.strip_prefix('-') {
            hunk.search.push(text.to_string());
        } else if let Some(text) = line.strip_prefix('+') {
            hunk.replace.push(text.to_string());
        }
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }
    hunks
}

#[cfg(test)]
mod tests {
    use super::parse_hunks;

    #[test]
    fn headers_before_first_hunk_are_ignored() {
        let hunks = parse_hunks("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n");

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].search, vec!["old"]);
        assert_eq!(hunks[0].replace, vec!["new"]);
    }

    #[test]
    fn context_lines_land_in_both_blocks() {
        let hunks = parse_hunks("@@\n keep\n-drop\n+add\n tail");

        assert_eq!(hunks[0].search, vec!["keep", "drop", "tail"]);
        assert_eq!(hunks[0].replace, vec!["keep", "add", "tail"]);
    }

    #[test]
    fn hunks_preserve_relative_order() {
        let hunks = parse_hunks("@@ first\n-a\n+b\n@@ second\n-c\n+d\n");

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].search_block(), "a");
        assert_eq!(hunks[1].replace_block(), "d");
    }

    #[test]
    fn carriage_returns_and_unprefixed_lines_are_dropped() {
        let hunks = parse_hunks("@@\r\n-a\r\n\\ No newline at end of file\r\n+b\r\n");

        assert_eq!(hunks[0].search, vec!["a"]);
        assert_eq!(hunks[0].replace, vec!["b"]);
    }

    #[test]
    fn diff_without_header_has_no_hunks() {
        assert!(parse_hunks("-a\n+b\n").is_empty());
    }

    #[test]
    fn bare_header_yields_empty_hunk() {
        let hunks = parse_hunks("@@\n+created\n");

        assert!(hunks[0].search.is_empty());
        assert_eq!(hunks[0].replace, vec!["created"]);
    }
}
