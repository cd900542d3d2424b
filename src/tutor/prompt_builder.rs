use tracing::debug;

use super::conversation::Turn;

/// Policy text sent ahead of every transcript.
pub const DATA_SCIENCE_INSTRUCTION: &str = "You are a Data Science tutor. Answer ONLY data science-related questions.
If the user asks something unrelated, politely decline.";

/// How much of the stored history is rendered into each prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    Unbounded,
    LastTurns(usize),
}

impl HistoryWindow {
    /// `0` means unbounded.
    pub fn from_turn_count(turns: usize) -> Self {
        if turns == 0 {
            HistoryWindow::Unbounded
        } else {
            HistoryWindow::LastTurns(turns)
        }
    }

    fn apply<'a>(&self, history: &'a [Turn]) -> &'a [Turn] {
        match *self {
            HistoryWindow::Unbounded => history,
            HistoryWindow::LastTurns(n) => &history[history.len().saturating_sub(n)..],
        }
    }
}

/// Render the instruction, every turn of `history` as `<role>: <text>`, and
/// a trailing `User: <new_user_text>` line.
pub fn render(history: &[Turn], new_user_text: &str, domain_instruction: &str) -> String {
    let mut prompt = String::with_capacity(
        domain_instruction.len()
            + new_user_text.len()
            + history.iter().map(|t| t.text().len() + 12).sum::<usize>()
            + 8,
    );

    prompt.push_str(domain_instruction);
    prompt.push('\n');

    for turn in history {
        prompt.push_str(&format!("{}: {}\n", turn.role(), turn.text()));
    }

    prompt.push_str("User: ");
    prompt.push_str(new_user_text);
    prompt
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
    window: HistoryWindow,
}

impl PromptBuilder {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            window: HistoryWindow::Unbounded,
        }
    }

    pub fn with_window(mut self, window: HistoryWindow) -> Self {
        self.window = window;
        self
    }

    pub fn build(&self, history: &[Turn], new_user_text: &str) -> String {
        let visible = self.window.apply(history);
        if visible.len() < history.len() {
            debug!(
                dropped = history.len() - visible.len(),
                kept = visible.len(),
                "History window trimmed prompt transcript"
            );
        }
        render(visible, new_user_text, &self.instruction)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DATA_SCIENCE_INSTRUCTION)
    }
}
