pub mod command;
pub mod context;
pub mod prompt;

use std::io::Write;
use std::process::ExitCode;

use admatch_client::{AdClient, BatchOutcome, ClientConfig, Dispatch, QueueReason, Role};
use color_print::cformat;
use command::Command;
use context::ContextManager;
use eyre::Result;
use prompt::generate_prompt;
use tracing::error;

const WELCOME_TEXT: &str = "
Ad matching chat. Every line you type is sent as a user message.

/assistant {text}  Record an assistant reply (queued, never triggers a batch)
/help              Show the help dialogue
/quit              Quit the application
";

const HELP_TEXT: &str = "
Ad matching chat

/assistant {text}  Record an assistant reply
/flush             Submit everything queued now
/status            Show queue and circuit breaker state
/reset             Close the circuit breaker
/help              Show this help dialogue
/quit              Quit the application
";

/// Options the chat loop needs to build its client.
pub struct ChatOptions {
    pub user_id: Option<String>,
    pub platform: String,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    options: ChatOptions,
    client: Option<AdClient>,
}

impl ChatContext {
    pub fn new(output: Box<dyn Write>, input: Option<String>, interactive: bool, options: ChatOptions) -> Self {
        Self {
            output,
            input,
            interactive,
            options,
            client: None,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        let session = ContextManager::new().session_info(self.options.user_id.as_deref(), &self.options.platform);
        let client = ClientConfig::from_env(session).and_then(AdClient::new);
        self.client = match client {
            Ok(client) => Some(client),
            Err(e) => {
                writeln!(self.output, "Failed to initialize ad client: {}", e)?;
                return Ok(ExitCode::FAILURE);
            }
        };

        // Non-interactive mode (single message)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            writeln!(self.output, "{}", WELCOME_TEXT)?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let healthy = self.client.as_ref().map_or(false, AdClient::is_healthy);
            let readline = rl.readline(&generate_prompt(healthy));

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if Command::parse(&line) == Command::Quit {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        let Some(client) = self.client.as_ref() else {
            eyre::bail!("ad client not initialized");
        };

        match Command::parse(input) {
            Command::Help => writeln!(self.output, "{}", HELP_TEXT)?,
            Command::Quit => {}
            Command::Invalid(reason) => writeln!(self.output, "{}", reason)?,
            Command::Status => {
                let status = client.status();
                writeln!(self.output, "{}", serde_json::to_string_pretty(&status)?)?;
            }
            Command::Reset => {
                client.reset_circuit_breaker();
                writeln!(self.output, "Circuit breaker reset.")?;
            }
            Command::Flush => {
                let dispatch = client.flush().await;
                self.report(dispatch)?;
            }
            Command::Assistant(reply) => {
                let dispatch = client.submit_message(Role::Assistant, reply).await;
                self.report(dispatch)?;
            }
            Command::User(text) => {
                let dispatch = client.submit_message(Role::User, text).await;
                self.report(dispatch)?;
            }
        }

        Ok(())
    }

    fn report(&mut self, dispatch: admatch_client::Result<Dispatch>) -> Result<()> {
        let Some(client) = self.client.as_ref() else {
            return Ok(());
        };

        let line = match dispatch {
            Ok(Dispatch::Submitted(BatchOutcome::Matched(_))) => match client.take_formatted_context() {
                Some(context) => cformat!("<green,bold>Ad context:</> {}", context),
                None => cformat!("<dim>Ad already consumed.</>"),
            },
            Ok(Dispatch::Submitted(BatchOutcome::NoMatch)) => cformat!("<dim>No matching ad.</>"),
            Ok(Dispatch::Submitted(BatchOutcome::Malformed(reason))) => {
                cformat!("<yellow>Service sent an unusable response:</> {}", reason)
            }
            Ok(Dispatch::Queued(QueueReason::AssistantMessage)) => cformat!("<dim>Assistant reply queued.</>"),
            Ok(Dispatch::Queued(QueueReason::CircuitOpen)) => {
                cformat!("<yellow>Service paused after repeated failures; message queued.</>")
            }
            Ok(Dispatch::Queued(QueueReason::Busy)) => cformat!("<dim>Batch in flight; message queued.</>"),
            Ok(Dispatch::Queued(QueueReason::Empty)) => cformat!("<dim>Nothing to submit.</>"),
            Err(e) => {
                error!("Submission failed: {}", e);
                cformat!("<red>Submission failed:</> {} (messages kept for retry)", e)
            }
        };
        writeln!(self.output, "{}", line)?;
        Ok(())
    }
}
