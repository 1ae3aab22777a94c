/// Minimum line-match score a window must exceed to be suggested.
pub const FUZZY_THRESHOLD: f64 = 0.5;

/// Lines of surrounding file content shown around a suggested window.
const SNIPPET_MARGIN: usize = 5;

/// Near miss reported when a search block is not found verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 1-based first line of the snippet.
    pub start_line: usize,
    /// 1-based last line of the snippet, inclusive.
    pub end_line: usize,
    pub score: f64,
    pub snippet: String,
}

/// Slides a window the height of `search` over `file_lines` and returns the
/// best-scoring offset with its score, the fraction of lines that are equal
/// after trimming whitespace. Ties keep the earliest window.
#[must_use]
pub fn find_best_match(file_lines: &[&str], search: &[String]) -> Option<(usize, f64)> {
    if search.is_empty() || file_lines.len() < search.len() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for start in 0..=file_lines.len() - search.len() {
        let equal = file_lines[start..start + search.len()]
            .iter()
            .zip(search)
            .filter(|(file_line, search_line)| file_line.trim() == search_line.trim())
            .count();
        let score = equal as f64 / search.len() as f64;

        if score > best.map_or(0.0, |(_, best_score)| best_score) {
            best = Some((start, score));
        }
    }
    best
}

/// Returns a suggestion only when the best window clears [`FUZZY_THRESHOLD`].
pub(crate) fn suggest(content: &str, search: &[String]) -> Option<Candidate> {
    let file_lines: Vec<&str> = content.split('\n').collect();
    let (index, score) = find_best_match(&file_lines, search)?;
    if score <= FUZZY_THRESHOLD {
        return None;
    }

    let start = index.saturating_sub(SNIPPET_MARGIN);
    let end = (index + search.len() + SNIPPET_MARGIN).min(file_lines.len());
    Some(Candidate {
        start_line: start + 1,
        end_line: end,
        score,
        snippet: file_lines[start..end].join("\n"),
    })
}
