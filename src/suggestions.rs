/// A predefined query shown before the first user message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub label: &'static str,
    pub query: &'static str,
}

pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion { label: "🎓 Education", query: "education grants" },
    Suggestion { label: "💼 Small business", query: "small business funding" },
    Suggestion { label: "🔬 Research", query: "research grants for universities" },
    Suggestion { label: "🏥 Healthcare", query: "healthcare innovation grants" },
    Suggestion { label: "🤝 Nonprofit", query: "nonprofit grants" },
    Suggestion { label: "❓ Help", query: "help" },
];

/// The tray of suggestion chips and which one is highlighted.
#[derive(Debug)]
pub struct SuggestionTray {
    pub visible: bool,
    pub selected: usize,
}

impl Default for SuggestionTray {
    fn default() -> Self {
        Self { visible: true, selected: 0 }
    }
}

impl SuggestionTray {
    pub fn chips(&self) -> &'static [Suggestion] {
        SUGGESTIONS
    }

    pub fn next(&mut self) {
        self.selected = (self.selected + 1) % SUGGESTIONS.len();
    }

    pub fn prev(&mut self) {
        self.selected = (self.selected + SUGGESTIONS.len() - 1) % SUGGESTIONS.len();
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&'static Suggestion> {
        SUGGESTIONS.get(self.selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_wraps() {
        let mut tray = SuggestionTray::default();
        tray.prev();
        assert_eq!(tray.selected, SUGGESTIONS.len() - 1);
        tray.next();
        assert_eq!(tray.selected, 0);
        assert_eq!(tray.current().map(|s| s.query), Some("education grants"));
    }

    #[test]
    fn test_queries_are_not_blank() {
        assert!(SUGGESTIONS.iter().all(|s| !s.query.trim().is_empty()));
    }
}
