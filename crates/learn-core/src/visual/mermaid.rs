//! Mermaid source clean-up.
//!
//! Models produce diagram text that the Mermaid parser rejects: fenced
//! blocks, a missing diagram header, smart quotes, and unquoted labels
//! containing punctuation. [`sanitize`] repairs those without trying to
//! understand the diagram.

const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequencediagram",
    "classdiagram",
    "statediagram",
    "erdiagram",
    "journey",
    "gantt",
    "pie",
    "mindmap",
    "timeline",
];

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("mermaid").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.strip_suffix('\n').unwrap_or(rest)
}

fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text.strip_prefix(['"', '\'']).unwrap_or(text);
    text.strip_suffix(['"', '\'']).unwrap_or(text)
}

fn has_diagram_header(text: &str) -> bool {
    let head = text.trim_start().to_ascii_lowercase();
    DIAGRAM_KEYWORDS.iter().any(|k| head.starts_with(k))
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '[' => Some(']'),
        '{' => Some('}'),
        '(' => Some(')'),
        _ => None,
    }
}

/// Index of the `close` that balances an opener just before `from`.
/// Quoted text is skipped and labels never span lines.
fn find_close(chars: &[char], from: usize, open: char, close: char) -> Option<usize> {
    let mut level = 0usize;
    let mut in_quote = false;
    for (offset, &ch) in chars.get(from..)?.iter().enumerate() {
        match ch {
            '\n' => return None,
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            _ if ch == close && level == 0 => return Some(from + offset),
            _ if ch == close => level -= 1,
            _ if ch == open => level += 1,
            _ => {}
        }
    }
    None
}

/// Quote the label inside every `[..]`, `{..}` and `(..)` node shape that
/// is not already quoted. Doubled shapes such as `((..))` keep their
/// doubling.
fn quote_labels(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' {
            // Copy an existing quoted string untouched.
            let stop = chars[i + 1..]
                .iter()
                .position(|&ch| ch == '"' || ch == '\n')
                .map_or(chars.len(), |p| {
                    let at = i + 1 + p;
                    if chars[at] == '"' { at + 1 } else { at }
                });
            out.extend(&chars[i..stop]);
            i = stop;
            continue;
        }

        let Some(close) = closer_for(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let doubled = if chars.get(i + 1) == Some(&c) {
            find_close(&chars, i + 2, c, close).filter(|&e| chars.get(e + 1) == Some(&close))
        } else {
            None
        };
        let (depth, end) = match doubled {
            Some(end) => (2, end),
            None => match find_close(&chars, i + 1, c, close) {
                Some(end) => (1, end),
                None => {
                    out.push(c);
                    i += 1;
                    continue;
                }
            },
        };

        let label: String = chars[i + depth..end].iter().collect();
        let trimmed = label.trim();
        for _ in 0..depth {
            out.push(c);
        }
        let quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
        if trimmed.is_empty() || quoted {
            out.push_str(&label);
        } else {
            out.push('"');
            out.push_str(&trimmed.replace('"', "'"));
            out.push('"');
        }
        for _ in 0..depth {
            out.push(close);
        }
        i = end + depth;
    }
    out
}

/// Clean model-produced Mermaid source so the renderer accepts it.
pub fn sanitize(raw: &str) -> String {
    let text = raw.trim();
    let text = strip_fence(text).trim();
    let text = strip_wrapping_quotes(text).trim();

    let mut chart = if has_diagram_header(text) {
        text.to_owned()
    } else {
        format!("flowchart TD\n{text}")
    };

    chart = chart
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    quote_labels(&chart)
}
