//! Markdown replies rendered as terminal lines.
//!
//! Block structure (headings, lists, quotes, tables, fences) becomes plain
//! lines; inline styling is ANSI escapes when color is on. Fenced code with a
//! known language is highlighted with syntect.

use markdown::{mdast, to_mdast, ParseOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};
use unicode_width::UnicodeWidthStr;

const CODE_THEME: &str = "base16-ocean.dark";

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";
const STRIKE: &str = "\x1b[9m";
const HEADING: &str = "\x1b[1;36m";
const CODE: &str = "\x1b[33m";
const BULLET: &str = "\x1b[36m";
const MUTED: &str = "\x1b[90m";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static THEME: Lazy<Theme> = Lazy::new(|| {
    ThemeSet::load_defaults()
        .themes
        .remove(CODE_THEME)
        .unwrap_or_default()
});

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern compiles"));

/// Renders `text` for the console. Unparseable input comes back unchanged.
#[must_use]
pub fn render_markdown(text: &str, color: bool) -> String {
    MarkdownRenderer { color }.document(text).join("\n")
}

struct MarkdownRenderer {
    color: bool,
}

impl MarkdownRenderer {
    fn document(&self, text: &str) -> Vec<String> {
        let source = text.replace('\t', "   ");
        match to_mdast(&source, &ParseOptions::gfm()) {
            Ok(mdast::Node::Root(root)) => self.blocks(&root.children, 0),
            Ok(other) => self.block(&other, 0),
            Err(_) => split_lines(&source),
        }
    }

    /// Sibling blocks separated by one blank line.
    fn blocks(&self, nodes: &[mdast::Node], depth: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if index > 0 {
                lines.push(String::new());
            }
            lines.extend(self.block(node, depth));
        }
        lines
    }

    fn block(&self, node: &mdast::Node, depth: usize) -> Vec<String> {
        match node {
            mdast::Node::Heading(heading) => {
                let text = self.inline(&heading.children, HEADING);
                let text = if heading.depth <= 2 {
                    text
                } else {
                    format!("{} {text}", "#".repeat(usize::from(heading.depth)))
                };
                vec![self.styled(HEADING, &text, "")]
            }
            mdast::Node::Paragraph(paragraph) => split_lines(&self.inline(&paragraph.children, "")),
            mdast::Node::Code(code) => self.code_block(&code.value, code.lang.as_deref()),
            mdast::Node::List(list) => self.list(list, depth),
            mdast::Node::Blockquote(quote) => {
                let border = self.styled(MUTED, "│ ", "");
                self.blocks(&quote.children, depth)
                    .into_iter()
                    .map(|line| format!("{border}{line}"))
                    .collect()
            }
            mdast::Node::Table(table) => self.table(table),
            mdast::Node::ThematicBreak(_) => vec![self.styled(MUTED, &"─".repeat(40), "")],
            mdast::Node::Html(html) => split_lines(html.value.trim()),
            mdast::Node::Math(math) => split_lines(&math.value),
            mdast::Node::Text(text) => split_lines(&text.value),
            _ => Vec::new(),
        }
    }

    /// Inline content as one string. `active` is the style in effect around
    /// these nodes; it is re-applied after every nested reset.
    fn inline(&self, nodes: &[mdast::Node], active: &str) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                mdast::Node::Text(text) => out.push_str(&text.value),
                mdast::Node::Strong(strong) => out.push_str(&self.span(BOLD, &strong.children, active)),
                mdast::Node::Emphasis(emphasis) => {
                    out.push_str(&self.span(ITALIC, &emphasis.children, active));
                }
                mdast::Node::Delete(delete) => out.push_str(&self.span(STRIKE, &delete.children, active)),
                mdast::Node::InlineCode(code) => {
                    if self.color {
                        out.push_str(&self.styled(CODE, &code.value, active));
                    } else {
                        out.push('`');
                        out.push_str(&code.value);
                        out.push('`');
                    }
                }
                mdast::Node::Link(link) => {
                    out.push_str(&self.span(UNDERLINE, &link.children, active));
                    let label = plain_text(&link.children);
                    let href = link.url.strip_prefix("mailto:").unwrap_or(&link.url);
                    if label != link.url && label != href {
                        out.push_str(&self.styled(MUTED, &format!(" ({})", link.url), active));
                    }
                }
                mdast::Node::Break(_) => out.push('\n'),
                mdast::Node::Html(html) => out.push_str(&html.value),
                mdast::Node::InlineMath(math) => out.push_str(&math.value),
                mdast::Node::Image(image) => {
                    out.push_str(if image.alt.is_empty() { &image.url } else { &image.alt });
                }
                mdast::Node::Paragraph(paragraph) => {
                    out.push_str(&self.inline(&paragraph.children, active));
                }
                _ => {}
            }
        }
        out
    }

    fn span(&self, code: &str, children: &[mdast::Node], active: &str) -> String {
        if !self.color {
            return self.inline(children, active);
        }
        let nested = format!("{active}{code}");
        format!("{code}{}{RESET}{active}", self.inline(children, &nested))
    }

    fn styled(&self, code: &str, text: &str, active: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("{code}{text}{RESET}{active}")
    }

    fn list(&self, list: &mdast::List, depth: usize) -> Vec<String> {
        let indent = "  ".repeat(depth);
        let start = list.start.unwrap_or(1) as usize;
        let mut lines = Vec::new();

        for (offset, item) in list.children.iter().enumerate() {
            let mdast::Node::ListItem(item) = item else {
                continue;
            };
            let bullet = if list.ordered {
                format!("{}.", start + offset)
            } else {
                "-".to_string()
            };
            let bullet = self.styled(BULLET, &bullet, "");
            let task = match item.checked {
                Some(true) => "[x] ",
                Some(false) => "[ ] ",
                None => "",
            };

            let mut first = true;
            for child in &item.children {
                if let mdast::Node::List(nested) = child {
                    lines.extend(self.list(nested, depth + 1));
                    continue;
                }
                for line in self.block(child, depth + 1) {
                    if first {
                        lines.push(format!("{indent}{bullet} {task}{line}"));
                        first = false;
                    } else {
                        lines.push(format!("{indent}  {line}"));
                    }
                }
            }
            if first {
                lines.push(format!("{indent}{bullet}"));
            }
        }
        lines
    }

    fn code_block(&self, code: &str, lang: Option<&str>) -> Vec<String> {
        let fence = format!("```{}", lang.unwrap_or_default());
        let mut lines = vec![self.styled(MUTED, &fence, "")];
        let body = lang
            .filter(|_| self.color)
            .and_then(|lang| highlight(code, lang))
            .unwrap_or_else(|| split_lines(code));
        lines.extend(body.into_iter().map(|line| format!("  {line}")));
        lines.push(self.styled(MUTED, "```", ""));
        lines
    }

    fn table(&self, table: &mdast::Table) -> Vec<String> {
        let rows: Vec<Vec<String>> = table
            .children
            .iter()
            .filter_map(|row| match row {
                mdast::Node::TableRow(row) => Some(
                    row.children
                        .iter()
                        .map(|cell| match cell {
                            mdast::Node::TableCell(cell) => self.inline(&cell.children, ""),
                            other => self.inline(std::slice::from_ref(other), ""),
                        })
                        .collect(),
                ),
                _ => None,
            })
            .collect();
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|column| {
                rows.iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| visible_width(cell))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let border = |text: &str| self.styled(MUTED, text, "");
        let mut lines = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(column, width)| {
                    let cell = row.get(column).map(String::as_str).unwrap_or_default();
                    let padding = width.saturating_sub(visible_width(cell));
                    format!(" {cell}{} ", " ".repeat(padding))
                })
                .collect();
            lines.push(format!("{}{}{}", border("│"), cells.join(&border("│")), border("│")));

            if index == 0 {
                let rule: Vec<String> = widths.iter().map(|width| "─".repeat(width + 2)).collect();
                lines.push(border(&format!("├{}┤", rule.join("┼"))));
            }
        }
        lines
    }
}

/// Highlights `code` as `lang`; `None` when no grammar matches.
fn highlight(code: &str, lang: &str) -> Option<Vec<String>> {
    let syntax = SYNTAXES.find_syntax_by_token(lang)?;
    let mut highlighter = HighlightLines::new(syntax, &THEME);
    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, &SYNTAXES).ok()?;
        let escaped = as_24_bit_terminal_escaped(&ranges, false);
        lines.push(format!("{}{RESET}", escaped.trim_end_matches(&['\n', '\r'][..])));
    }
    Some(lines)
}

fn plain_text(nodes: &[mdast::Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            mdast::Node::Text(text) => out.push_str(&text.value),
            mdast::Node::InlineCode(code) => out.push_str(&code.value),
            mdast::Node::Strong(strong) => out.push_str(&plain_text(&strong.children)),
            mdast::Node::Emphasis(emphasis) => out.push_str(&plain_text(&emphasis.children)),
            mdast::Node::Delete(delete) => out.push_str(&plain_text(&delete.children)),
            _ => {}
        }
    }
    out
}

fn visible_width(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").width()
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}
