use std::sync::OnceLock;

use regex::Regex;

/// A run of text with a single emphasis setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
}

impl Segment {
    fn plain(text: &str) -> Self {
        Self { text: text.to_string(), bold: false }
    }

    fn bold(text: &str) -> Self {
        Self { text: text.to_string(), bold: true }
    }
}

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    // `.` never crosses a newline, so emphasis cannot span lines
    BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold pattern"))
}

/// Convert help text into lines of segments: every `\n` starts a new line and
/// `**text**` becomes a bold segment. Unmatched markers stay literal.
pub fn help_lines(text: &str) -> Vec<Vec<Segment>> {
    text.split('\n').map(parse_line).collect()
}

/// Plain text keeps its markers; only the newlines split it.
pub fn plain_lines(text: &str) -> Vec<Vec<Segment>> {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                Vec::new()
            } else {
                vec![Segment::plain(line)]
            }
        })
        .collect()
}

fn parse_line(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in bold_pattern().captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::plain(&line[last..whole.start()]));
        }
        if !inner.as_str().is_empty() {
            segments.push(Segment::bold(inner.as_str()));
        }
        last = whole.end();
    }

    if last < line.len() {
        segments.push(Segment::plain(&line[last..]));
    }
    segments
}
