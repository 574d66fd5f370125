use std::sync::Arc;

use {
    tokio::sync::Semaphore,
    tracing::{error, info, trace, warn},
    wagpt_channels::{ChatSession, InboundMessage, InboundReceiver, Result as SessionResult},
    wagpt_providers::{CompletionProvider, CompletionRequest},
};

#[cfg(feature = "metrics")]
use wagpt_metrics::{auto_reply as auto_reply_metrics, counter, gauge, histogram, labels};

use crate::{
    command::{APOLOGY, Command, PROCESSING_NOTICE, USAGE_HINT, parse_command},
    error::Result,
};

/// Answers `!chatgpt` commands arriving on a session's inbound stream.
pub struct Dispatcher {
    session: Arc<dyn ChatSession>,
    provider: Arc<dyn CompletionProvider>,
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(session: Arc<dyn ChatSession>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            session,
            provider,
            limit: None,
        }
    }

    /// Cap the number of messages handled at once. `0` removes the cap.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limit = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    /// Handle one inbound message.
    ///
    /// Failures while answering are logged and turned into the apology
    /// reply. Only a failure to send that apology (or the usage hint) is
    /// returned.
    pub async fn dispatch(&self, msg: &InboundMessage) -> SessionResult<()> {
        #[cfg(feature = "metrics")]
        counter!(auto_reply_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

        let prompt = match parse_command(&msg.body) {
            None => {
                trace!(sender_id = %msg.sender_id, "ignoring message without command");
                return Ok(());
            },
            Some(Command::Empty) => {
                #[cfg(feature = "metrics")]
                counter!(auto_reply_metrics::EMPTY_PROMPTS_TOTAL).increment(1);
                return self.session.send_message(&msg.sender_id, USAGE_HINT).await;
            },
            Some(Command::Prompt(prompt)) => prompt,
        };

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();
        #[cfg(feature = "metrics")]
        counter!(
            auto_reply_metrics::COMMANDS_TOTAL,
            labels::GROUP => msg.is_group_chat.to_string()
        )
        .increment(1);

        let outcome = self.answer(msg, &prompt).await;

        #[cfg(feature = "metrics")]
        histogram!(auto_reply_metrics::PROCESSING_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    sender_id = %msg.sender_id,
                    is_group = msg.is_group_chat,
                    error = %e,
                    error_type = e.kind(),
                    "failed to answer chatgpt command"
                );
                #[cfg(feature = "metrics")]
                counter!(auto_reply_metrics::FAILURES_TOTAL, labels::ERROR_TYPE => e.kind())
                    .increment(1);
                self.session.send_message(&msg.sender_id, APOLOGY).await
            },
        }
    }

    async fn answer(&self, msg: &InboundMessage, prompt: &str) -> Result<()> {
        self.session
            .send_message(&msg.sender_id, PROCESSING_NOTICE)
            .await?;

        let request = CompletionRequest::new(prompt)?;
        let result = self.provider.generate(&request).await?;

        self.session.send_message(&msg.sender_id, &result.text).await?;

        info!(
            sender_id = %msg.sender_id,
            is_group = msg.is_group_chat,
            group_name = msg.group_name.as_deref(),
            prompt_length = prompt.chars().count(),
            response_length = result.text.chars().count(),
            prompt_tokens = result.usage.prompt_tokens,
            completion_tokens = result.usage.completion_tokens,
            total_tokens = result.usage.total_tokens,
            "answered chatgpt command"
        );
        Ok(())
    }

    /// Consume the inbound stream until it closes, one task per message.
    ///
    /// Messages from the same sender are not serialized, so their replies
    /// may interleave.
    pub async fn run(self: Arc<Self>, mut inbound: InboundReceiver) {
        info!(
            session = self.session.id(),
            provider = self.provider.name(),
            model = self.provider.id(),
            "dispatch loop started"
        );
        while let Some(msg) = inbound.recv().await {
            let permit = match &self.limit {
                Some(limit) => match Arc::clone(limit).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                None => None,
            };
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                #[cfg(feature = "metrics")]
                gauge!(auto_reply_metrics::IN_FLIGHT).increment(1.0);
                if let Err(e) = dispatcher.dispatch(&msg).await {
                    warn!(
                        sender_id = %msg.sender_id,
                        error = %e,
                        "could not deliver reply"
                    );
                }
                #[cfg(feature = "metrics")]
                gauge!(auto_reply_metrics::IN_FLIGHT).decrement(1.0);
            });
        }
        info!("inbound stream closed, dispatch loop stopped");
    }
}
