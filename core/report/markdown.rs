//! Markdown text helpers: anchors, fences, inline code and heading demotion.

use std::collections::HashSet;

const MAX_HEADING_LEVEL: usize = 6;
const MIN_FENCE_LEN: usize = 3;

/// Base anchor for a path: characters outside `[A-Za-z0-9_./-]` collapse to
/// `-`, edges are trimmed, then `/` becomes `-`.
pub fn slugify(path: &str) -> String {
    let mut slug = String::with_capacity(path.len());
    let mut in_run = false;
    for c in path.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-') {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    let slug = slug.trim_matches('-').replace('/', "-");
    if slug.is_empty() {
        "file".to_string()
    } else {
        slug
    }
}

/// One unique anchor per path, in input order. A taken anchor gets the
/// first free `-2`, `-3`, ... suffix.
pub fn assign_anchors<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    paths
        .into_iter()
        .map(|path| {
            let base = slugify(path);
            let mut anchor = base.clone();
            let mut suffix = 2;
            while used.contains(&anchor) {
                anchor = format!("{}-{}", base, suffix);
                suffix += 1;
            }
            used.insert(anchor.clone());
            anchor
        })
        .collect()
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Backtick fence that cannot be closed by anything inside `content`.
pub fn fence_for(content: &str) -> String {
    "`".repeat((longest_run(content, '`') + 1).max(MIN_FENCE_LEN))
}

pub fn fenced_block(content: &str, info: &str) -> String {
    let fence = fence_for(content);
    let body = content.trim_end_matches(['\r', '\n']);
    let mut out = format!("{}{}\n", fence, info);
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    out.push_str(&fence);
    out.push('\n');
    out
}

/// Code span safe for any text, including text with backticks.
pub fn inline_code(text: &str) -> String {
    let ticks = "`".repeat(longest_run(text, '`') + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{} {} {}", ticks, text, ticks)
    } else {
        format!("{}{}{}", ticks, text, ticks)
    }
}

struct FenceState {
    marker: char,
    len: usize,
}

/// Parses a fence opener or closer: up to three spaces, then three or more
/// backticks or tildes.
fn fence_marker(line: &str) -> Option<(char, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.len() - rest.trim_start_matches(marker).len();
    (len >= MIN_FENCE_LEN).then(|| (marker, len, &rest[len..]))
}

/// ATX heading level and the remainder after the `#` run.
fn atx_heading(line: &str) -> Option<(usize, &str, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let level = rest.len() - rest.trim_start_matches('#').len();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }
    let after = &rest[level..];
    if !(after.is_empty() || after.starts_with([' ', '\t'])) {
        return None;
    }
    Some((level, &line[..indent], after))
}

/// Setext underline level: `=` runs are level 1, `-` runs level 2.
fn setext_underline(line: &str) -> Option<usize> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let body = line.trim();
    let marker = body.chars().next()?;
    if !body.chars().all(|c| c == marker) {
        return None;
    }
    match marker {
        '=' => Some(1),
        '-' => Some(2),
        _ => None,
    }
}

/// Text that can carry a setext underline.
fn is_paragraph_line(line: &str) -> bool {
    let indent = line.len() - line.trim_start_matches(' ').len();
    !line.trim().is_empty()
        && indent <= 3
        && fence_marker(line).is_none()
        && atx_heading(line).is_none()
        && setext_underline(line).is_none()
}

fn push_heading(out: &mut String, indent: &str, level: usize, after: &str) {
    out.push_str(indent);
    out.push_str(&"#".repeat(level));
    out.push_str(after);
}

/// Pushes every heading outside fenced code down by `offset` levels, capped
/// at level 6. Setext headings become ATX headings and lose their underline.
/// An unterminated fence is closed so that text appended afterwards is not
/// swallowed.
pub fn demote_headings(text: &str, offset: usize) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let mut open: Option<FenceState> = None;
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        match &open {
            Some(state) => {
                if let Some((marker, len, tail)) = fence_marker(line) {
                    if marker == state.marker && len >= state.len && tail.trim().is_empty() {
                        open = None;
                    }
                }
                out.push_str(line);
            }
            None => {
                if let Some((marker, len, tail)) = fence_marker(line) {
                    if !(marker == '`' && tail.contains('`')) {
                        open = Some(FenceState { marker, len });
                    }
                    out.push_str(line);
                } else if let Some((level, indent, after)) = atx_heading(line) {
                    push_heading(&mut out, indent, (level + offset).min(MAX_HEADING_LEVEL), after);
                } else if let Some(level) = lines
                    .peek()
                    .filter(|_| is_paragraph_line(line))
                    .and_then(|next| setext_underline(next))
                {
                    lines.next();
                    let title = format!(" {}", line.trim());
                    push_heading(&mut out, "", (level + offset).min(MAX_HEADING_LEVEL), &title);
                } else {
                    out.push_str(line);
                }
            }
        }
        out.push('\n');
    }
    if let Some(state) = open {
        out.push_str(&state.marker.to_string().repeat(state.len));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_follow_path_text() {
        assert_eq!(slugify("src/main.py"), "src-main.py");
        assert_eq!(slugify("docs/My File (v2).md"), "docs-My-File-v2-.md");
        assert_eq!(slugify("日本"), "file");
    }

    #[test]
    fn colliding_anchors_get_suffixes() {
        let anchors = assign_anchors(["a/b.md", "a-b.md", "a b.md", "a-b.md-2"]);
        assert_eq!(anchors, vec!["a-b.md", "a-b.md-2", "a-b.md-3", "a-b.md-2-2"]);
    }

    #[test]
    fn fences_outgrow_embedded_backticks() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("```rust\nx\n```"), "````");
        assert_eq!(
            fenced_block("a ````` b\n\n", "text"),
            "``````text\na ````` b\n``````\n"
        );
        assert_eq!(fenced_block("", "py"), "```py\n```\n");
    }

    #[test]
    fn inline_code_handles_backticks() {
        assert_eq!(inline_code("src/a.rs"), "`src/a.rs`");
        assert_eq!(inline_code("a`b"), "``a`b``");
        assert_eq!(inline_code("`x"), "`` `x ``");
    }

    #[test]
    fn headings_are_demoted_outside_fences() {
        let text = "# H1\n## H2\n```md\n# not a heading\n```\n#hashtag\n###### deep\n";
        assert_eq!(
            demote_headings(text, 3),
            "#### H1\n##### H2\n```md\n# not a heading\n```\n#hashtag\n###### deep\n"
        );
    }

    #[test]
    fn tilde_fences_and_long_closers() {
        let text = "~~~~\n# inside\n~~~\n# still inside\n~~~~~\n# out\n";
        assert_eq!(
            demote_headings(text, 1),
            "~~~~\n# inside\n~~~\n# still inside\n~~~~~\n## out\n"
        );
    }

    #[test]
    fn unterminated_fence_is_closed() {
        assert_eq!(demote_headings("# T\n````\ncode", 2), "### T\n````\ncode\n````\n");
    }

    #[test]
    fn setext_headings_become_atx() {
        assert_eq!(demote_headings("Title\n=====\nbody\n", 3), "#### Title\nbody\n");
        assert_eq!(demote_headings("  Part two  \n--\n", 1), "### Part two\n");
        assert_eq!(demote_headings("Deep\n===\n", 7), "###### Deep\n");
    }

    #[test]
    fn rules_and_fenced_underlines_stay_put() {
        assert_eq!(demote_headings("para\n\n---\n", 2), "para\n\n---\n");
        assert_eq!(demote_headings("```\ncode\n===\n```\n", 2), "```\ncode\n===\n```\n");
        assert_eq!(demote_headings("# A\n---\n", 1), "## A\n---\n");
        assert_eq!(demote_headings("---\n---\n", 1), "---\n---\n");
    }
}
