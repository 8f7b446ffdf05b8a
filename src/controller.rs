use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{SearchBackend, SearchResponse};
use crate::config::Config;
use crate::error::ApiError;
use crate::input::InputLine;
use crate::state::{ChatMessage, MessageFormat, Transcript};
use crate::suggestions::SuggestionTray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse,
}

/// Which part of the chat receives keystrokes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Suggestions,
    Transcript,
}

/// Texts shown when an exchange does not produce a server message.
#[derive(Debug, Clone)]
pub struct FallbackMessages {
    pub error: String,
    pub failure: String,
}

impl From<&Config> for FallbackMessages {
    fn from(config: &Config) -> Self {
        Self {
            error: config.error_message.clone(),
            failure: config.failure_message.clone(),
        }
    }
}

type PendingSearch = JoinHandle<Result<SearchResponse, ApiError>>;

/// Owns the conversation: takes the user's input, runs one search at a time
/// and turns each outcome into transcript entries.
pub struct ChatController {
    backend: Arc<dyn SearchBackend>,
    fallback: FallbackMessages,
    transcript: Transcript,
    pub input: InputLine,
    pub suggestions: SuggestionTray,
    phase: Phase,
    focus: Focus,
    input_enabled: bool,
    send_enabled: bool,
    pending: Option<PendingSearch>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn SearchBackend>, fallback: FallbackMessages) -> Self {
        Self {
            backend,
            fallback,
            transcript: Transcript::new(),
            input: InputLine::default(),
            suggestions: SuggestionTray::default(),
            phase: Phase::Idle,
            focus: Focus::Input,
            input_enabled: true,
            send_enabled: true,
            pending: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_awaiting(&self) -> bool {
        self.phase == Phase::AwaitingResponse
    }

    /// Whether the loading placeholder should be drawn
    pub fn is_loading(&self) -> bool {
        self.is_awaiting()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Send whatever is in the input box. Returns `false` when nothing was
    /// sent: blank input, or a search is already running.
    pub fn submit_query(&mut self) -> bool {
        if self.is_awaiting() || !self.input_enabled {
            debug!("submit ignored, request in flight");
            return false;
        }

        let query = self.input.text().trim().to_string();
        if query.is_empty() {
            return false;
        }

        self.transcript.push(ChatMessage::user(query.clone()));
        self.input.clear();
        self.input_enabled = false;
        self.send_enabled = false;
        self.suggestions.visible = false;
        self.phase = Phase::AwaitingResponse;

        info!(query = %query, "submitting query");
        let backend = Arc::clone(&self.backend);
        self.pending = Some(tokio::spawn(async move { backend.search(&query).await }));
        true
    }

    /// Fill the input with a suggestion chip's query and send it. The tray
    /// stays hidden afterwards.
    pub fn choose_suggestion(&mut self, index: usize) -> bool {
        if self.is_awaiting() {
            return false;
        }
        let Some(chip) = self.suggestions.chips().get(index) else {
            return false;
        };

        self.input.set(chip.query);
        let sent = self.submit_query();
        self.suggestions.visible = false;
        sent
    }

    /// Called after every edit of the input box.
    pub fn on_input_changed(&mut self) {
        if !self.is_awaiting() {
            self.send_enabled = !self.input.text().trim().is_empty();
        }
    }

    /// Give the input box focus. The suggestion tray comes back while the
    /// user has not sent anything yet.
    pub fn focus_input(&mut self) {
        self.focus = Focus::Input;
        if !self.transcript.has_user_message() {
            self.suggestions.visible = true;
        }
    }

    pub fn set_focus(&mut self, focus: Focus) {
        match focus {
            Focus::Input => self.focus_input(),
            Focus::Suggestions if !self.suggestions.visible => {}
            other => self.focus = other,
        }
    }

    pub fn cycle_focus(&mut self) {
        match self.focus {
            Focus::Input if self.suggestions.visible => self.focus = Focus::Suggestions,
            Focus::Input | Focus::Suggestions => self.focus = Focus::Transcript,
            Focus::Transcript => self.focus_input(),
        }
    }

    /// Apply the outcome of the in-flight search if it has settled. Returns
    /// `true` when the transcript changed.
    pub async fn poll_response(&mut self) -> bool {
        let finished = self.pending.as_ref().is_some_and(|handle| handle.is_finished());
        if !finished {
            return false;
        }
        self.wait_for_response().await
    }

    /// Wait for the in-flight search, however long it takes.
    pub async fn wait_for_response(&mut self) -> bool {
        let Some(handle) = self.pending.take() else {
            return false;
        };

        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(ApiError::from(join_err)),
        };
        self.apply_outcome(outcome);
        true
    }

    /// Turn a settled search into a bot message and return to idle.
    pub fn apply_outcome(&mut self, outcome: Result<SearchResponse, ApiError>) {
        let message = match outcome {
            Ok(response) if response.success => {
                let format = if response.is_help {
                    MessageFormat::Help
                } else {
                    MessageFormat::Plain
                };
                let text = response.message.clone().unwrap_or_default();
                ChatMessage::bot(text, format, response.into_grants())
            }
            Ok(response) => {
                let text = response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| self.fallback.failure.clone());
                info!(message = %text, "search reported failure");
                ChatMessage::bot(text, MessageFormat::Plain, Vec::new())
            }
            Err(err) => {
                warn!(error = %err, "search request failed");
                ChatMessage::bot(self.fallback.error.clone(), MessageFormat::Plain, Vec::new())
            }
        };
        self.transcript.push(message);

        self.phase = Phase::Idle;
        self.input_enabled = true;
        self.send_enabled = true;
        self.focus_input();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Grant;
    use crate::config::{DEFAULT_ERROR_MESSAGE, DEFAULT_FAILURE_MESSAGE};
    use crate::state::Sender;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    enum Reply {
        Response(SearchResponse),
        BadBody,
        Panic,
    }

    struct FakeBackend {
        reply: Reply,
        calls: AtomicUsize,
        queries: std::sync::Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                queries: std::sync::Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(reply: Reply, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                queries: std::sync::Mutex::new(Vec::new()),
                gate: Some(gate),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn search(&self, query: &str) -> Result<SearchResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.reply {
                Reply::Response(resp) => Ok(resp.clone()),
                Reply::BadBody => {
                    let source = serde_json::from_str::<SearchResponse>("<html>").unwrap_err();
                    Err(ApiError::Decode {
                        status: reqwest::StatusCode::BAD_GATEWAY,
                        source,
                    })
                }
                Reply::Panic => panic!("backend blew up"),
            }
        }
    }

    fn fallback() -> FallbackMessages {
        FallbackMessages::from(&Config::default())
    }

    fn controller(backend: Arc<FakeBackend>) -> ChatController {
        ChatController::new(backend, fallback())
    }

    fn grant(title: &str) -> Grant {
        Grant {
            title: title.to_string(),
            description: format!("{title} description"),
            amount: "$1,000".to_string(),
            deadline: "2025-01-01".to_string(),
            category: "Research".to_string(),
            eligibility: None,
            link: None,
        }
    }

    fn type_text(chat: &mut ChatController, text: &str) {
        for c in text.chars() {
            chat.input.insert(c);
        }
        chat.on_input_changed();
    }

    fn assert_ready(chat: &ChatController) {
        assert_eq!(chat.phase(), Phase::Idle);
        assert!(chat.input_enabled());
        assert!(chat.send_enabled());
        assert_eq!(chat.focus(), Focus::Input);
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::default()));
        let mut chat = controller(backend.clone());

        assert!(!chat.submit_query());
        type_text(&mut chat, "   \t ");
        assert!(!chat.send_enabled());
        assert!(!chat.submit_query());

        assert!(chat.transcript().is_empty());
        assert!(!chat.wait_for_response().await);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_ignored() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend::gated(
            Reply::Response(SearchResponse::new(true, "ok", vec![], false)),
            gate.clone(),
        );
        let mut chat = controller(backend.clone());

        type_text(&mut chat, "research");
        assert!(chat.submit_query());
        assert!(chat.is_awaiting());
        assert!(chat.is_loading());
        assert!(!chat.input_enabled());
        assert!(!chat.send_enabled());
        assert_eq!(chat.input.text(), "");

        type_text(&mut chat, "again");
        assert!(!chat.submit_query());
        assert!(!chat.choose_suggestion(0));
        assert!(!chat.poll_response().await);

        gate.notify_one();
        assert!(chat.wait_for_response().await);

        assert_eq!(backend.calls(), 1);
        assert_eq!(*backend.queries.lock().unwrap(), vec!["research".to_string()]);
        assert_eq!(chat.transcript().len(), 2);
        assert_ready(&chat);
    }

    #[tokio::test]
    async fn test_success_renders_message_and_grants_in_order() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::new(
            true,
            "Found 2 grants",
            vec![grant("g1"), grant("g2")],
            false,
        )));
        let mut chat = controller(backend.clone());

        type_text(&mut chat, "  research  ");
        assert!(chat.submit_query());
        assert!(chat.wait_for_response().await);

        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "research");
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].text, "Found 2 grants");
        assert_eq!(messages[1].format, MessageFormat::Plain);
        let titles: Vec<&str> = messages[1].grants.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["g1", "g2"]);
        assert_ready(&chat);
    }

    #[tokio::test]
    async fn test_help_response_uses_help_format() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::new(
            true,
            "**Search Tips:**\n• Be specific",
            vec![],
            true,
        )));
        let mut chat = controller(backend);

        type_text(&mut chat, "help");
        chat.submit_query();
        chat.wait_for_response().await;

        let bot = &chat.transcript().messages()[1];
        assert_eq!(bot.format, MessageFormat::Help);
        assert!(bot.grants.is_empty());
    }

    #[tokio::test]
    async fn test_failure_shows_server_message_without_cards() {
        let mut resp = SearchResponse::new(false, "No match", vec![grant("ignored")], false);
        resp.is_help = true;
        let backend = FakeBackend::new(Reply::Response(resp));
        let mut chat = controller(backend);

        type_text(&mut chat, "zzz");
        chat.submit_query();
        chat.wait_for_response().await;

        let bot = &chat.transcript().messages()[1];
        assert_eq!(bot.text, "No match");
        assert_eq!(bot.format, MessageFormat::Plain);
        assert!(bot.grants.is_empty());
        assert_ready(&chat);
    }

    #[tokio::test]
    async fn test_failure_without_message_uses_fallback() {
        let resp: SearchResponse = serde_json::from_str(r#"{"success": false, "message": ""}"#).unwrap();
        let backend = FakeBackend::new(Reply::Response(resp));
        let mut chat = controller(backend);

        type_text(&mut chat, "zzz");
        chat.submit_query();
        chat.wait_for_response().await;

        assert_eq!(chat.transcript().messages()[1].text, DEFAULT_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_transport_failure_shows_generic_error() {
        let backend = FakeBackend::new(Reply::BadBody);
        let mut chat = controller(backend);

        type_text(&mut chat, "education");
        chat.submit_query();
        chat.wait_for_response().await;

        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, DEFAULT_ERROR_MESSAGE);
        assert!(messages[1].grants.is_empty());
        assert_ready(&chat);
    }

    #[tokio::test]
    async fn test_panicking_request_recovers() {
        let backend = FakeBackend::new(Reply::Panic);
        let mut chat = controller(backend);

        type_text(&mut chat, "education");
        chat.submit_query();
        chat.wait_for_response().await;

        assert_eq!(chat.transcript().messages()[1].text, DEFAULT_ERROR_MESSAGE);
        assert_ready(&chat);
    }

    #[tokio::test]
    async fn test_configured_error_text() {
        let backend = FakeBackend::new(Reply::BadBody);
        let fallback = FallbackMessages {
            error: "API unreachable".to_string(),
            failure: "nope".to_string(),
        };
        let mut chat = ChatController::new(backend, fallback);

        type_text(&mut chat, "education");
        chat.submit_query();
        chat.wait_for_response().await;
        assert_eq!(chat.transcript().messages()[1].text, "API unreachable");
    }

    #[tokio::test]
    async fn test_suggestion_submits_and_hides_tray() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::new(true, "ok", vec![], false)));
        let mut chat = controller(backend.clone());
        assert!(chat.suggestions.visible);

        assert!(chat.choose_suggestion(1));
        assert!(!chat.suggestions.visible);
        chat.wait_for_response().await;

        let expected = chat.suggestions.chips()[1].query;
        assert_eq!(*backend.queries.lock().unwrap(), vec![expected.to_string()]);
        assert_eq!(chat.transcript().messages()[0].text, expected);

        // Focus returned to the input after the exchange, but a user message exists
        assert!(!chat.suggestions.visible);
        chat.focus_input();
        assert!(!chat.suggestions.visible);
    }

    #[tokio::test]
    async fn test_out_of_range_suggestion() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::default()));
        let mut chat = controller(backend.clone());
        assert!(!chat.choose_suggestion(99));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_tray_returns_on_focus_before_first_message() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::default()));
        let mut chat = controller(backend);

        chat.suggestions.visible = false;
        chat.cycle_focus();
        assert_eq!(chat.focus(), Focus::Transcript);
        chat.cycle_focus();
        assert_eq!(chat.focus(), Focus::Input);
        assert!(chat.suggestions.visible);

        chat.cycle_focus();
        assert_eq!(chat.focus(), Focus::Suggestions);
    }

    #[test]
    fn test_apply_outcome_without_request() {
        let backend = FakeBackend::new(Reply::Response(SearchResponse::default()));
        let mut chat = controller(backend);
        chat.apply_outcome(Err(ApiError::Join("cancelled".into())));
        assert_eq!(chat.transcript().len(), 1);
        assert_ready(&chat);
    }
}
