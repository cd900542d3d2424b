pub mod prompt;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use color_print::cformat;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;
use prompt::generate_prompt;
use tracing::debug;

use crate::error::{ErrorKind, TutorError};
use crate::tutor::conversation::Role;
use crate::tutor::TutorSession;

const WELCOME_TEXT: &str = "
Hi, I'm your Data Science tutor. Ask me anything about statistics,
machine learning, data wrangling or visualization.

Things to try
• What is a p-value?
• Explain the bias-variance tradeoff.
• When should I use a random forest instead of logistic regression?

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Data Science Tutor

/clear        Clear the conversation history
/history      Show the conversation so far
/help         Show this help dialogue
/quit         Quit the application
";

/// Shown in place of a reply when the model produced no usable text.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    session: Arc<TutorSession>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        session: Arc<TutorSession>,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            session,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Single query
        if let Some(input) = self.input.take() {
            let ok = self.process_chat_input(&input).await?;
            return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = generate_prompt(None);
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if self.handle_input(&line).await? == Flow::Quit {
                        break;
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted)
                | Err(rustyline::error::ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<Flow> {
        match input.trim() {
            "" => {}
            "/quit" => return Ok(Flow::Quit),
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.session.reset().await;
                if self.interactive {
                    execute!(self.output, Clear(ClearType::All), MoveTo(0, 0))?;
                }
                writeln!(self.output, "Conversation cleared.")?;
            }
            "/history" => {
                self.print_history().await?;
            }
            _ => {
                self.process_chat_input(input).await?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Ask the tutor and print the reply or the failure. Returns whether a
    /// reply was produced.
    async fn process_chat_input(&mut self, input: &str) -> Result<bool> {
        if input.trim().is_empty() {
            return Ok(false);
        }

        match self.session.ask(input).await {
            Ok(reply) => {
                writeln!(self.output, "{}", reply)?;
                Ok(true)
            }
            Err(err) => {
                debug!(kind = ?err.kind(), "Rendering failed ask");
                writeln!(self.output, "{}", failure_message(&err))?;
                Ok(false)
            }
        }
    }

    async fn print_history(&mut self) -> Result<()> {
        let transcript = self.session.transcript().await;
        if transcript.is_empty() {
            writeln!(self.output, "No messages yet.")?;
            return Ok(());
        }

        for turn in &transcript {
            let line = match turn.role() {
                Role::User => cformat!("<cyan,bold>{}</>: {}", turn.role(), turn.text()),
                Role::Assistant => cformat!("<green,bold>{}</>: {}", turn.role(), turn.text()),
            };
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }
}

fn failure_message(err: &TutorError) -> String {
    match err.kind() {
        ErrorKind::EmptyResponse => FALLBACK_REPLY.to_string(),
        ErrorKind::TransportFailure | ErrorKind::Configuration => format!("Error: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::tutor::model::{InvokeOptions, ModelClient, ModelResponse};
    use crate::tutor::prompt_builder::PromptBuilder;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct QueuedClient(Mutex<VecDeque<crate::error::Result<ModelResponse>>>);

    #[async_trait]
    impl ModelClient for QueuedClient {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvokeOptions,
        ) -> crate::error::Result<ModelResponse> {
            self.0.lock().unwrap().pop_front().expect("unexpected model call")
        }
    }

    fn context(
        replies: Vec<crate::error::Result<ModelResponse>>,
        input: Option<&str>,
    ) -> (ChatContext, SharedBuffer, Arc<TutorSession>) {
        let client = Arc::new(QueuedClient(Mutex::new(replies.into())));
        let options = InvokeOptions {
            model: "gemini-1.5-pro".to_string(),
            temperature: 0.7,
        };
        let session = Arc::new(TutorSession::new(client, PromptBuilder::default(), options));
        let buffer = SharedBuffer::default();
        let chat = ChatContext::new(
            Box::new(buffer.clone()),
            input.map(str::to_string),
            false,
            session.clone(),
        );
        (chat, buffer, session)
    }

    #[tokio::test]
    async fn single_query_prints_reply() {
        let (mut chat, buffer, session) = context(
            vec![ModelResponse::from_text("A p-value measures...")],
            Some("What is a p-value?"),
        );

        let code = chat.run().await.unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(buffer.contents(), "A p-value measures...\n");
        assert_eq!(session.transcript().await.len(), 2);
    }

    #[tokio::test]
    async fn empty_response_shows_fallback_reply() {
        let (mut chat, buffer, _session) =
            context(vec![Err(TutorError::EmptyResponse)], Some("What is a p-value?"));

        let code = chat.run().await.unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(buffer.contents().trim(), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn transport_failure_is_rendered_as_error_line() {
        let (mut chat, buffer, session) = context(
            vec![Err(TutorError::transport("Gemini API returned 401 Unauthorized"))],
            None,
        );

        chat.handle_input("What is a p-value?").await.unwrap();

        assert!(buffer.contents().starts_with("Error: Transport failure: Gemini API returned 401"));
        assert_eq!(session.transcript().await.len(), 1);
    }

    #[tokio::test]
    async fn commands_drive_the_session() {
        let (mut chat, buffer, session) = context(
            vec![ModelResponse::from_text("Overfitting is...")],
            None,
        );

        assert_eq!(chat.handle_input("Explain overfitting").await.unwrap(), Flow::Continue);
        assert_eq!(chat.handle_input("/history").await.unwrap(), Flow::Continue);
        let out = buffer.contents();
        assert!(out.contains("Explain overfitting"));
        assert!(out.matches("Overfitting is...").count() == 2);

        chat.handle_input("/clear").await.unwrap();
        assert!(session.transcript().await.is_empty());
        assert!(buffer.contents().contains("Conversation cleared."));

        chat.handle_input("/history").await.unwrap();
        assert!(buffer.contents().ends_with("No messages yet.\n"));

        assert_eq!(chat.handle_input("/quit").await.unwrap(), Flow::Quit);
    }

    #[tokio::test]
    async fn blank_input_does_not_reach_the_model() {
        let (mut chat, buffer, session) = context(Vec::new(), None);

        assert_eq!(chat.handle_input("   ").await.unwrap(), Flow::Continue);
        assert!(buffer.contents().is_empty());
        assert!(session.transcript().await.is_empty());
    }
}
