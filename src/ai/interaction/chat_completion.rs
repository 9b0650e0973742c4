use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::ai::error::AiError;
use crate::ai::traits::{
    chat::{AiChatTrait, ChatResponse},
    stoppable::Stoppable,
};
use crate::ai::{chat::ollama::OllamaChat, chat::openai::OpenAIChat};
use crate::settings::Settings;

/// Macro to implement a method for different chat interfaces.
/// This macro matches the current chat interface and calls the specified method
/// with the provided arguments, returning the result.
macro_rules! impl_chat_method {
    ($self:expr, $method:ident, $($arg:expr),*) => {
        match $self {
            AiChatEnum::Ollama(chat) => chat.$method($($arg),*).await,
            AiChatEnum::OpenAI(chat) => chat.$method($($arg),*).await,
        }
    };
}

/// Enum representing the available chat backends.
#[derive(Clone)]
pub enum AiChatEnum {
    Ollama(OllamaChat),
    OpenAI(OpenAIChat),
}

impl AiChatEnum {
    /// Asynchronously sends a chat request to the selected backend.
    pub async fn chat(
        &self,
        api_url: &str,
        model: &str,
        api_key: Option<&str>,
        chat_id: String,
        messages: Vec<Value>,
        callback: impl Fn(Arc<ChatResponse>) + Send + 'static,
    ) -> Result<String, AiError> {
        impl_chat_method!(self, chat, api_url, model, api_key, chat_id, messages, callback)
    }

    /// Asynchronously sets the stop flag for the selected backend.
    pub async fn set_stop_flag(&self, value: bool) {
        impl_chat_method!(self, set_stop_flag, value)
    }
}

/// Wire protocol of the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProtocol {
    Ollama,
    OpenAI,
}

impl Display for ChatProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChatProtocol::Ollama => "ollama",
                ChatProtocol::OpenAI => "openai",
            }
        )
    }
}

impl FromStr for ChatProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(ChatProtocol::Ollama),
            "openai" => Ok(ChatProtocol::OpenAI),
            _ => Err(format!("Invalid chat protocol: {}", s)),
        }
    }
}

impl TryFrom<String> for ChatProtocol {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The current in-flight request.
struct ActiveChat {
    chat_id: String,
    chat: AiChatEnum,
}

/// State of the chat system: one mutable slot holding the current cancellable
/// request, replaced on new submit, cleared on completion.
pub struct ChatState {
    active: Mutex<Option<ActiveChat>>,
    sender: mpsc::Sender<Arc<ChatResponse>>,
    settings: Settings,
}

impl ChatState {
    /// Creates a new relay that forwards every notification through `sender`.
    pub fn new(settings: Settings, sender: mpsc::Sender<Arc<ChatResponse>>) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(None),
            sender,
            settings,
        })
    }

    /// Submits a prompt.
    ///
    /// The prompt is trimmed and nothing is forwarded when it is empty.
    /// A previous in-flight request is cancelled: its stop flag is set, it
    /// emits its own single `Stopped` terminal notification, and the slot is
    /// replaced with the new request.
    ///
    /// # Returns
    /// The chat id of the new request, or `None` when the prompt was empty.
    pub async fn submit(self: &Arc<Self>, prompt: &str) -> Option<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        let chat = match self.settings.protocol {
            ChatProtocol::Ollama => AiChatEnum::Ollama(OllamaChat::new()),
            ChatProtocol::OpenAI => AiChatEnum::OpenAI(OpenAIChat::new()),
        };
        let chat_id = Uuid::new_v4().to_string();

        // Reset before the task starts so a stop issued right after submit
        // cannot be clobbered.
        chat.set_stop_flag(false).await;

        {
            let mut active = self.active.lock().await;
            if let Some(previous) = active.take() {
                log::debug!("superseding in-flight chat {}", previous.chat_id);
                previous.chat.set_stop_flag(true).await;
            }
            *active = Some(ActiveChat {
                chat_id: chat_id.clone(),
                chat: chat.clone(),
            });
        }

        let messages = vec![json!({"role": "user", "content": prompt})];
        let tx = self.sender.clone();
        let callback = move |chunk: Arc<ChatResponse>| {
            if chunk.r#type.is_terminal() {
                log::debug!("chat {} ended with {:?}", chunk.chat_id, chunk.r#type);
            }
            if let Err(e) = tx.try_send(chunk) {
                log::error!("Failed to send chat response through channel: {}", e);
            }
        };

        let state = Arc::clone(self);
        let api_url = self.settings.api_url.clone();
        let model = self.settings.model.clone();
        let api_key = self.settings.api_key.clone();
        let task_chat_id = chat_id.clone();
        tokio::spawn(async move {
            if let Err(e) = chat
                .chat(
                    &api_url,
                    &model,
                    api_key.as_deref(),
                    task_chat_id.clone(),
                    messages,
                    callback,
                )
                .await
            {
                log::error!("chat {} failed: {}", task_chat_id, e);
            }

            // Clear the slot only if it still belongs to this request.
            let mut active = state.active.lock().await;
            if active
                .as_ref()
                .map(|a| a.chat_id == task_chat_id)
                .unwrap_or(false)
            {
                *active = None;
            }
        });

        Some(chat_id)
    }

    /// Requests a stop of the current in-flight request, if any.
    ///
    /// The streaming task observes the flag between fragments, stops
    /// forwarding and emits its single `Stopped` terminal notification.
    ///
    /// # Returns
    /// Whether a request was in flight.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(previous) => {
                log::debug!("stop requested for chat {}", previous.chat_id);
                previous.chat.set_stop_flag(true).await;
                true
            }
            None => false,
        }
    }

    /// Whether a request is currently in flight.
    pub async fn is_busy(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::traits::chat::MessageType;
    use crate::logger::setup_test_logger;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(10);

    /// Serves every accepted connection with the given NDJSON lines, one
    /// line per write, `delay_ms` apart, then closes the connection.
    async fn spawn_stream_server(lines: Vec<String>, delay_ms: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let lines = lines.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 8192];
                    let _ = socket.read(&mut buf).await;
                    let header = "HTTP/1.1 200 OK\r\n\
                                  content-type: application/x-ndjson\r\n\
                                  connection: close\r\n\r\n";
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.flush().await;
                    for line in &lines {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        let _ = socket.write_all(line.as_bytes()).await;
                        let _ = socket.write_all(b"\n").await;
                        let _ = socket.flush().await;
                    }
                });
            }
        });
        format!("http://{}", addr)
    }

    fn test_state(api_url: String) -> (Arc<ChatState>, mpsc::Receiver<Arc<ChatResponse>>) {
        let (tx, rx) = mpsc::channel(100);
        let settings = Settings {
            protocol: ChatProtocol::Ollama,
            api_url,
            model: "test-model".to_string(),
            api_key: None,
        };
        (ChatState::new(settings, tx), rx)
    }

    fn fragment(content: &str) -> String {
        format!(r#"{{"message":{{"content":"{}"}},"done":false}}"#, content)
    }

    fn done() -> String {
        r#"{"done":true,"prompt_eval_count":1,"eval_count":2,"eval_duration":200000000}"#
            .to_string()
    }

    /// A port with nothing listening on it.
    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn fragments_accumulate_to_completion() {
        let _ = setup_test_logger();
        let api_url =
            spawn_stream_server(vec![fragment("Hel"), fragment("lo"), done()], 20).await;
        let (state, mut rx) = test_state(api_url);

        let chat_id = state.submit("hi there").await.unwrap();

        let mut text = String::new();
        let finished = loop {
            let chunk = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(chunk.chat_id, chat_id);
            match &chunk.r#type {
                MessageType::Text => text.push_str(&chunk.chunk),
                MessageType::Finished => break chunk,
                other => panic!("unexpected notification: {:?}", other),
            }
        };

        assert_eq!(text, "Hello");
        assert_eq!(finished.chunk, "Hello");
        let tokens = finished.metadata.as_ref().unwrap()["tokens"].clone();
        assert_eq!(tokens["total"], 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(!state.is_busy().await);
    }

    #[tokio::test]
    async fn stop_yields_single_stopped_terminal() {
        let api_url =
            spawn_stream_server(vec![fragment("Hel"), fragment("lo"), done()], 300).await;
        let (state, mut rx) = test_state(api_url);

        let chat_id = state.submit("hi").await.unwrap();

        let first = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.r#type, MessageType::Text);
        assert_eq!(first.chunk, "Hel");

        assert!(state.stop().await);
        assert!(!state.is_busy().await);

        let terminal = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(terminal.chat_id, chat_id);
        assert_eq!(terminal.r#type, MessageType::Stopped);
        assert_eq!(terminal.chunk, "Hel");

        // the cancelled stream forwards nothing further
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_noop() {
        let (state, mut rx) = test_state("http://localhost:11434".to_string());
        assert!(!state.stop().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_prompt_supersedes_previous_request() {
        let lines: Vec<String> = std::iter::repeat_with(|| fragment("a"))
            .take(8)
            .chain(std::iter::once(done()))
            .collect();
        let api_url = spawn_stream_server(lines, 150).await;
        let (state, mut rx) = test_state(api_url);

        let first_id = state.submit("first").await.unwrap();
        let first_fragment = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(first_fragment.chat_id, first_id);

        let second_id = state.submit("second").await.unwrap();
        assert_ne!(first_id, second_id);

        let mut terminals: HashMap<String, MessageType> = HashMap::new();
        let mut first_stopped = false;
        while terminals.len() < 2 {
            let chunk = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
            match chunk.r#type {
                MessageType::Text => {
                    // no fragments from the old stream after its terminal
                    assert!(!(chunk.chat_id == first_id && first_stopped));
                }
                ref terminal => {
                    let previous = terminals.insert(chunk.chat_id.clone(), terminal.clone());
                    assert!(previous.is_none(), "second terminal for {}", chunk.chat_id);
                    if chunk.chat_id == first_id {
                        first_stopped = true;
                    }
                }
            }
        }

        assert_eq!(terminals.get(&first_id), Some(&MessageType::Stopped));
        assert_eq!(terminals.get(&second_id), Some(&MessageType::Finished));
        assert!(!state.is_busy().await);
    }

    #[tokio::test]
    async fn empty_prompt_forwards_nothing() {
        let (state, mut rx) = test_state("http://localhost:11434".to_string());
        assert!(state.submit("   \n\t  ").await.is_none());
        assert!(!state.is_busy().await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_failure_yields_single_error_terminal() {
        let (state, mut rx) = test_state(closed_port_url().await);
        let chat_id = state.submit("hello").await.unwrap();

        let terminal = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(terminal.chat_id, chat_id);
        assert_eq!(terminal.r#type, MessageType::Error);
        assert!(!terminal.chunk.is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(!state.is_busy().await);
    }

    #[test]
    fn protocol_parsing() {
        assert_eq!("ollama".parse::<ChatProtocol>(), Ok(ChatProtocol::Ollama));
        assert_eq!("OpenAI".parse::<ChatProtocol>(), Ok(ChatProtocol::OpenAI));
        assert!("gopher".parse::<ChatProtocol>().is_err());
    }
}
