use crate::error::HunkFailure;
use crate::fuzzy::suggest;
use crate::parse::Hunk;

/// Applies `hunks` in order to `content`, each against the result of the
/// previous one. Returns the new text or the first failing hunk; the input is
/// never partially modified because the caller only sees the final string.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, HunkFailure> {
    let mut working = content.to_string();

    for (index, hunk) in hunks.iter().enumerate() {
        let number = index + 1;
        let replace_block = hunk.replace_block();

        if hunk.search.is_empty() {
            if working.is_empty() {
                working = replace_block;
                continue;
            }
            return Err(HunkFailure::PureInsertion { hunk: number });
        }

        let search_block = hunk.search_block();
        match working.matches(search_block.as_str()).count() {
            1 => working = working.replacen(search_block.as_str(), &replace_block, 1),
            0 => {
                return Err(HunkFailure::NotFound {
                    hunk: number,
                    candidate: suggest(&working, &hunk.search),
                    search_block,
                });
            }
            matches => {
                return Err(HunkFailure::Ambiguous {
                    hunk: number,
                    matches,
                });
            }
        }
    }

    Ok(working)
}
