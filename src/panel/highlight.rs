use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const THEME: &str = "base16-ocean.dark";

/// Highlights a fenced code body into styled terminal lines. The fence's
/// language tag selects the grammar; an unknown or missing tag falls back to
/// plain text so the body is still shown verbatim.
pub fn highlight_code(lang: Option<&str>, body: &str) -> Vec<Line<'static>> {
    let syntax = syntax_for(lang);
    let theme = &THEME_SET.themes[THEME];
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(body) {
        let spans = match highlighter.highlight_line(line, &SYNTAX_SET) {
            Ok(regions) => regions
                .into_iter()
                .map(|(style, text)| {
                    Span::styled(text.trim_end_matches('\n').to_string(), convert_style(style))
                })
                .collect(),
            // Grammar hiccups degrade to an unstyled line rather than
            // dropping output.
            Err(_) => vec![Span::raw(line.trim_end_matches('\n').to_string())],
        };
        lines.push(Line::from(spans));
    }
    lines
}

fn syntax_for(lang: Option<&str>) -> &'static SyntaxReference {
    lang.and_then(|token| SYNTAX_SET.find_syntax_by_token(token))
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

fn convert_style(style: syntect::highlighting::Style) -> Style {
    let mut converted = Style::default().fg(Color::Rgb(
        style.foreground.r,
        style.foreground.g,
        style.foreground.b,
    ));
    if style.font_style.contains(FontStyle::BOLD) {
        converted = converted.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        converted = converted.add_modifier(Modifier::ITALIC);
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn known_tag_selects_grammar() {
        assert_eq!(syntax_for(Some("rust")).name, "Rust");
        assert_eq!(syntax_for(Some("py")).name, "Python");
    }

    #[test]
    fn unknown_tag_falls_back_to_plain_text() {
        assert_eq!(syntax_for(Some("no-such-language")).name, "Plain Text");
        assert_eq!(syntax_for(None).name, "Plain Text");
    }

    #[test]
    fn highlighting_preserves_text() {
        let body = "fn main() {\n    let x = 1;\n}\n";
        let lines = highlight_code(Some("rust"), body);
        assert_eq!(lines.len(), 3);
        assert_eq!(line_text(&lines[0]), "fn main() {");
        assert_eq!(line_text(&lines[1]), "    let x = 1;");
        assert_eq!(line_text(&lines[2]), "}");
    }

    #[test]
    fn plain_text_fallback_preserves_text() {
        let lines = highlight_code(None, "just words\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "just words");
    }
}
