use std::sync::Arc;

use ratatui::layout::Rect;
use tracing::warn;

use crate::api::{SearchBackend, SearchClient};
use crate::config::Config;
use crate::controller::{ChatController, FallbackMessages};
use crate::links;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub chat: ChatController,
    pub api_base_url: String,

    // Transcript view
    pub transcript_scroll: u16,
    pub max_scroll: u16,
    pub follow_bottom: bool,
    pub selected_card: Option<usize>,
    pub visible_rows: u16,
    // (first row, height) of each card in the wrapped transcript
    pub card_rows: Vec<(u16, u16)>,
    reveal_selected: bool,

    // One-line notice in the footer (link opened, link refused, ...)
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub transcript_area: Option<Rect>,
    pub suggestions_area: Option<Rect>,
    pub input_area: Option<Rect>,
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = SearchClient::new(&config.api_base_url, config.request_timeout())?;
        let base_url = client.base_url().to_string();
        Ok(Self::with_backend(Arc::new(client), FallbackMessages::from(config), base_url))
    }

    pub fn with_backend(
        backend: Arc<dyn SearchBackend>,
        fallback: FallbackMessages,
        api_base_url: String,
    ) -> Self {
        Self {
            should_quit: false,
            chat: ChatController::new(backend, fallback),
            api_base_url,
            transcript_scroll: 0,
            max_scroll: 0,
            follow_bottom: true,
            selected_card: None,
            visible_rows: 0,
            card_rows: Vec::new(),
            reveal_selected: false,
            status: None,
            animation_frame: 0,
            transcript_area: None,
            suggestions_area: None,
            input_area: None,
        }
    }

    /// Send the input box contents; the view jumps to the newest message.
    pub fn submit(&mut self) {
        if self.chat.submit_query() {
            self.status = None;
            self.follow_bottom = true;
        }
    }

    pub fn choose_suggestion(&mut self, index: usize) {
        if self.chat.choose_suggestion(index) {
            self.status = None;
            self.follow_bottom = true;
        }
    }

    /// Apply a settled search, if any.
    pub async fn poll_response(&mut self) {
        if self.chat.poll_response().await {
            self.follow_bottom = true;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(self.max_scroll);
        self.follow_bottom = self.transcript_scroll >= self.max_scroll;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.transcript_scroll = self.max_scroll;
    }

    /// Record how tall the rendered transcript is and keep it pinned to the
    /// bottom while following.
    pub fn set_content_height(&mut self, total_lines: u16, visible_lines: u16) {
        self.visible_rows = visible_lines;
        self.max_scroll = total_lines.saturating_sub(visible_lines);
        if self.follow_bottom || self.transcript_scroll > self.max_scroll {
            self.transcript_scroll = self.max_scroll;
        }
    }

    /// Record where each card landed after wrapping. A card selected since
    /// the last frame is scrolled into view.
    pub fn set_card_rows(&mut self, rows: Vec<(u16, u16)>) {
        self.card_rows = rows;
        if std::mem::take(&mut self.reveal_selected) {
            self.scroll_to_selected_card();
        }
    }

    fn scroll_to_selected_card(&mut self) {
        let Some(&(top, height)) = self.selected_card.and_then(|i| self.card_rows.get(i)) else {
            return;
        };

        let bottom = top.saturating_add(height);
        if top < self.transcript_scroll {
            self.transcript_scroll = top;
        } else if bottom > self.transcript_scroll.saturating_add(self.visible_rows) {
            // Cards taller than the view show their top
            self.transcript_scroll = bottom.saturating_sub(self.visible_rows).min(top);
        }
        self.transcript_scroll = self.transcript_scroll.min(self.max_scroll);
        self.follow_bottom = self.transcript_scroll >= self.max_scroll;
    }

    fn card_count(&self) -> usize {
        self.chat.transcript().grants().count()
    }

    pub fn select_next_card(&mut self) {
        let count = self.card_count();
        if count == 0 {
            return;
        }
        self.selected_card = Some(match self.selected_card {
            Some(i) => (i + 1).min(count - 1),
            None => 0,
        });
        self.reveal_selected = true;
    }

    pub fn select_prev_card(&mut self) {
        let count = self.card_count();
        if count == 0 {
            return;
        }
        self.selected_card = Some(match self.selected_card {
            Some(i) => i.saturating_sub(1),
            None => count - 1,
        });
        self.reveal_selected = true;
    }

    /// Open the highlighted grant's link in the browser.
    pub fn open_selected_link(&mut self) {
        let Some(index) = self.selected_card else {
            return;
        };
        let Some(grant) = self.chat.transcript().grants().nth(index) else {
            return;
        };

        let Some(link) = grant.link.clone() else {
            self.status = Some(format!("\"{}\" has no link", grant.title));
            return;
        };

        self.status = Some(match links::open_link(&link) {
            Ok(()) => format!("Opened {}", link),
            Err(e) => {
                warn!(error = %e, "could not open link");
                e.to_string()
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Grant, SearchResponse};
    use crate::error::ApiError;

    fn app() -> App {
        let client = SearchClient::new("http://localhost:5000/api", None).unwrap();
        App::with_backend(
            Arc::new(client),
            FallbackMessages::from(&Config::default()),
            "http://localhost:5000/api".to_string(),
        )
    }

    fn grants(n: usize) -> Vec<Grant> {
        (0..n)
            .map(|i| Grant {
                title: format!("grant {i}"),
                ..Grant::default()
            })
            .collect()
    }

    #[test]
    fn test_card_selection_bounds() {
        let mut app = app();
        app.select_next_card();
        assert_eq!(app.selected_card, None);

        app.chat.apply_outcome(Ok(SearchResponse::new(true, "two", grants(2), false)));
        app.select_prev_card();
        assert_eq!(app.selected_card, Some(1));
        app.select_next_card();
        assert_eq!(app.selected_card, Some(1));
        app.select_prev_card();
        app.select_prev_card();
        assert_eq!(app.selected_card, Some(0));
    }

    #[test]
    fn test_open_link_without_link_sets_status() {
        let mut app = app();
        app.chat.apply_outcome(Ok(SearchResponse::new(true, "one", grants(1), false)));
        app.select_next_card();
        app.open_selected_link();
        assert_eq!(app.status.as_deref(), Some("\"grant 0\" has no link"));
    }

    #[test]
    fn test_scroll_follows_bottom() {
        let mut app = app();
        app.set_content_height(50, 20);
        assert_eq!(app.transcript_scroll, 30);

        app.scroll_up(5);
        assert!(!app.follow_bottom);
        app.set_content_height(60, 20);
        assert_eq!(app.transcript_scroll, 25);

        app.scroll_down(100);
        assert_eq!(app.transcript_scroll, 40);
        assert!(app.follow_bottom);
    }

    #[test]
    fn test_selected_card_is_scrolled_into_view() {
        let mut app = app();
        app.chat.apply_outcome(Ok(SearchResponse::new(true, "three", grants(3), false)));
        app.set_content_height(100, 10);
        assert_eq!(app.transcript_scroll, 90);

        let rows = vec![(5, 4), (40, 4), (92, 4)];

        // Above the view: its top row becomes the first visible row
        app.select_next_card();
        app.set_card_rows(rows.clone());
        assert_eq!(app.transcript_scroll, 5);
        assert!(!app.follow_bottom);

        // Below the view: scroll just far enough to show its last row
        app.select_next_card();
        app.set_card_rows(rows.clone());
        assert_eq!(app.transcript_scroll, 34);

        // A later frame without a new selection leaves the scroll alone
        app.scroll_up(20);
        app.set_card_rows(rows.clone());
        assert_eq!(app.transcript_scroll, 14);

        app.select_next_card();
        app.set_card_rows(rows);
        assert_eq!(app.transcript_scroll, 86);
        assert!(!app.follow_bottom);
    }

    #[test]
    fn test_animation_only_while_loading() {
        let mut app = app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.chat.apply_outcome(Err(ApiError::Join("x".into())));
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
    }
}
