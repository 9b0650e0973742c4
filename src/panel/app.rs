use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::layout::{Constraint, Layout, Position};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph, Wrap};
use ratatui::{DefaultTerminal, Frame};
use tokio::sync::mpsc;

use super::{highlight, markdown};
use crate::ai::interaction::chat_completion::ChatState;
use crate::ai::traits::chat::{ChatResponse, MessageType};
use crate::error::Result;
use crate::settings::Settings;

/// Accumulator for the response currently streaming in.
struct Streaming {
    chat_id: String,
    text: String,
}

/// The chat panel: a transcript, a prompt line and a status line.
pub struct App {
    state: Arc<ChatState>,
    /// Rendered transcript lines, already styled.
    history: Vec<Line<'static>>,
    current: Option<Streaming>,
    input: String,
    scroll: u16,
    /// When set, the transcript stays pinned to the newest line.
    follow: bool,
    should_quit: bool,
    model: String,
}

impl App {
    pub fn new(state: Arc<ChatState>, settings: &Settings) -> Self {
        Self {
            state,
            history: Vec::new(),
            current: None,
            input: String::new(),
            scroll: 0,
            follow: true,
            should_quit: false,
            model: settings.model.clone(),
        }
    }

    pub async fn run(
        &mut self,
        terminal: &mut DefaultTerminal,
        mut rx: mpsc::Receiver<Arc<ChatResponse>>,
    ) -> Result<()> {
        let mut events = EventStream::new();
        loop {
            terminal.draw(|frame| self.draw(frame))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::warn!("terminal event error: {}", err);
                    }
                    None => break,
                },
                notification = rx.recv() => match notification {
                    Some(response) => self.handle_notification(&response),
                    None => break,
                },
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => {
                self.state.stop().await;
                self.should_quit = true;
            }
            (KeyCode::Esc, _) => {
                if self.state.is_busy().await {
                    self.state.stop().await;
                }
            }
            (KeyCode::Enter, _) => self.submit().await,
            (KeyCode::Backspace, _) => {
                self.input.pop();
            }
            (KeyCode::Up, _) => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(1);
            }
            (KeyCode::Down, _) => {
                self.scroll = self.scroll.saturating_add(1);
            }
            (KeyCode::PageUp, _) => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(10);
            }
            (KeyCode::PageDown, _) => {
                self.scroll = self.scroll.saturating_add(10);
            }
            (KeyCode::End, _) => {
                self.follow = true;
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    async fn submit(&mut self) {
        let prompt = self.input.trim().to_string();
        // Blank input is not a request.
        if prompt.is_empty() {
            return;
        }
        if let Some(chat_id) = self.state.submit(&prompt).await {
            self.input.clear();
            self.begin_request(&prompt, chat_id);
        }
    }

    /// Records the submitted prompt in the transcript and arms the
    /// accumulator for its response.
    fn begin_request(&mut self, prompt: &str, chat_id: String) {
        for line in markdown::sanitize(prompt).lines() {
            self.history.push(Line::styled(
                format!("> {}", line),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        self.history.push(Line::raw(""));
        self.current = Some(Streaming {
            chat_id,
            text: String::new(),
        });
        self.follow = true;
    }

    /// Applies one relay notification. Fragments grow the in-flight text;
    /// a terminal notification replaces it with the rendered transcript
    /// entry. Notifications for a superseded request are dropped.
    fn handle_notification(&mut self, response: &ChatResponse) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if response.chat_id != current.chat_id {
            return;
        }

        match response.r#type {
            MessageType::Text => current.text.push_str(&response.chunk),
            MessageType::Finished => {
                let text = response.chunk.clone();
                self.current = None;
                self.push_response(&text, None);
            }
            MessageType::Stopped => {
                let text = response.chunk.clone();
                self.current = None;
                self.push_response(&text, Some("[stopped]"));
            }
            MessageType::Error => {
                let message = response.chunk.clone();
                self.current = None;
                self.history.push(Line::styled(
                    format!("error: {}", markdown::sanitize(&message)),
                    Style::default().fg(Color::Red),
                ));
                self.history.push(Line::raw(""));
            }
        }
        if self.follow {
            self.scroll = u16::MAX;
        }
    }

    /// Renders a completed (or stopped) response into the transcript.
    fn push_response(&mut self, text: &str, notice: Option<&str>) {
        self.history.extend(render_response(text));
        if let Some(notice) = notice {
            self.history.push(Line::styled(
                notice.to_string(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        self.history.push(Line::raw(""));
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [transcript_area, input_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let mut lines = self.history.clone();
        if let Some(current) = &self.current {
            for line in markdown::sanitize(&current.text).lines() {
                lines.push(Line::raw(line.to_string()));
            }
            lines.push(Line::styled(
                "▌",
                Style::default().add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        let viewport = transcript_area.height.saturating_sub(2);
        let total = lines.len() as u16;
        let max_scroll = total.saturating_sub(viewport);
        if self.follow || self.scroll > max_scroll {
            self.scroll = max_scroll;
        }

        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::bordered().title(format!(" chatpane · {} ", self.model)))
                .wrap(Wrap { trim: false })
                .scroll((self.scroll, 0)),
            transcript_area,
        );

        frame.render_widget(
            Paragraph::new(self.input.as_str()).block(Block::bordered().title(" prompt ")),
            input_area,
        );
        frame.set_cursor_position(Position::new(
            input_area.x + 1 + self.input.chars().count() as u16,
            input_area.y + 1,
        ));

        let status = if self.current.is_some() {
            "streaming · Esc stops"
        } else {
            "Enter sends · Ctrl+C quits"
        };
        frame.render_widget(
            Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
            status_area,
        );
    }
}

/// Turns a completed response into styled transcript lines: prose is
/// sanitized, fenced regions are syntax highlighted with the fence tag as the
/// grammar hint.
fn render_response(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for segment in markdown::split_fenced(text) {
        match segment {
            markdown::Segment::Text(prose) => {
                for line in markdown::sanitize(&prose).lines() {
                    lines.push(Line::raw(line.to_string()));
                }
            }
            markdown::Segment::Code { lang, body } => {
                let fence_style = Style::default().fg(Color::DarkGray);
                let label = lang.as_deref().unwrap_or("");
                lines.push(Line::styled(format!("```{}", label), fence_style));
                lines.extend(highlight::highlight_code(
                    lang.as_deref(),
                    &markdown::sanitize(&body),
                ));
                lines.push(Line::styled("```".to_string(), fence_style));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::traits::chat::MessageType;

    fn test_app() -> App {
        let settings = Settings::default();
        let (tx, _rx) = mpsc::channel(8);
        let state = ChatState::new(settings.clone(), tx);
        App::new(state, &settings)
    }

    fn notification(chat_id: &str, chunk: &str, r#type: MessageType) -> ChatResponse {
        ChatResponse {
            chat_id: chat_id.to_string(),
            chunk: chunk.to_string(),
            r#type,
            metadata: None,
        }
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn fragments_grow_the_streaming_text() {
        let mut app = test_app();
        app.begin_request("hi", "id1".to_string());
        app.handle_notification(&notification("id1", "Hel", MessageType::Text));
        app.handle_notification(&notification("id1", "lo", MessageType::Text));
        assert_eq!(app.current.as_ref().unwrap().text, "Hello");
    }

    #[test]
    fn finished_moves_the_response_into_history() {
        let mut app = test_app();
        app.begin_request("hi", "id1".to_string());
        app.handle_notification(&notification("id1", "Hello there.\n", MessageType::Finished));
        assert!(app.current.is_none());
        assert!(app
            .history
            .iter()
            .any(|line| line_text(line) == "Hello there."));
    }

    #[test]
    fn finished_renders_fenced_code() {
        let mut app = test_app();
        app.begin_request("hi", "id1".to_string());
        app.handle_notification(&notification(
            "id1",
            "```rust\nlet x = 1;\n```\n",
            MessageType::Finished,
        ));
        let rendered: Vec<String> = app.history.iter().map(line_text).collect();
        assert!(rendered.contains(&"```rust".to_string()));
        assert!(rendered.contains(&"let x = 1;".to_string()));
    }

    #[test]
    fn stopped_keeps_partial_text_with_a_notice() {
        let mut app = test_app();
        app.begin_request("hi", "id1".to_string());
        app.handle_notification(&notification("id1", "partial", MessageType::Stopped));
        assert!(app.current.is_none());
        let rendered: Vec<String> = app.history.iter().map(line_text).collect();
        assert!(rendered.contains(&"partial".to_string()));
        assert!(rendered.contains(&"[stopped]".to_string()));
    }

    #[test]
    fn error_clears_the_request_and_shows_the_message() {
        let mut app = test_app();
        app.begin_request("hi", "id1".to_string());
        app.handle_notification(&notification("id1", "connection refused", MessageType::Error));
        assert!(app.current.is_none());
        assert!(app
            .history
            .iter()
            .any(|line| line_text(line).contains("connection refused")));
    }

    #[test]
    fn stale_notifications_are_dropped() {
        let mut app = test_app();
        app.begin_request("hi", "id2".to_string());
        app.handle_notification(&notification("id1", "old", MessageType::Text));
        app.handle_notification(&notification("id1", "old done", MessageType::Finished));
        assert_eq!(app.current.as_ref().unwrap().text, "");
        assert_eq!(app.current.as_ref().unwrap().chat_id, "id2");
    }

    #[test]
    fn notifications_without_a_request_are_dropped() {
        let mut app = test_app();
        app.handle_notification(&notification("id1", "orphan", MessageType::Text));
        assert!(app.current.is_none());
        assert!(app.history.is_empty());
    }
}
