/// A piece of a completed response after fence splitting.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Prose between fences.
    Text(String),
    /// The body of a fenced region, with the language tag from the opening
    /// fence when one was given.
    Code {
        lang: Option<String>,
        body: String,
    },
}

/// Splits a completed response into prose and fenced code regions.
///
/// Parsing is line based: a line whose first non-blank characters are three
/// backticks opens or closes a fence, and an optional language tag may follow
/// the opening backticks. An unterminated fence runs to the end of the text.
pub fn split_fenced(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut code: Option<(Option<String>, String)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("```") {
            match code.take() {
                None => {
                    if !plain.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut plain)));
                    }
                    let tag = rest.trim();
                    let lang = if tag.is_empty() {
                        None
                    } else {
                        Some(tag.to_string())
                    };
                    code = Some((lang, String::new()));
                }
                Some((lang, body)) => segments.push(Segment::Code { lang, body }),
            }
        } else if let Some((_, body)) = code.as_mut() {
            body.push_str(line);
            body.push('\n');
        } else {
            plain.push_str(line);
            plain.push('\n');
        }
    }

    if let Some((lang, body)) = code {
        segments.push(Segment::Code { lang, body });
    }
    if !plain.is_empty() {
        segments.push(Segment::Text(plain));
    }
    segments
}

/// Escapes model output for safe terminal display by stripping control
/// characters that could move the cursor or recolor the screen. Newlines and
/// tabs survive.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
