//! Metric name and label definitions.
//!
//! Every metric wagpt records is named here so the set stays documented in
//! one place.

/// Inbound message dispatch
pub mod auto_reply {
    /// Inbound messages seen by the dispatcher
    pub const MESSAGES_RECEIVED_TOTAL: &str = "wagpt_auto_reply_messages_received_total";
    /// Messages that carried the command prefix
    pub const COMMANDS_TOTAL: &str = "wagpt_auto_reply_commands_total";
    /// Command messages with nothing after the prefix
    pub const EMPTY_PROMPTS_TOTAL: &str = "wagpt_auto_reply_empty_prompts_total";
    /// Dispatches that ended in the apology reply
    pub const FAILURES_TOTAL: &str = "wagpt_auto_reply_failures_total";
    /// End-to-end command processing duration in seconds
    pub const PROCESSING_DURATION_SECONDS: &str = "wagpt_auto_reply_processing_duration_seconds";
    /// Dispatches currently running
    pub const IN_FLIGHT: &str = "wagpt_auto_reply_in_flight";
}

/// LLM provider calls
pub mod llm {
    /// Total number of completions requested
    pub const COMPLETIONS_TOTAL: &str = "wagpt_llm_completions_total";
    /// Duration of completion requests in seconds
    pub const COMPLETION_DURATION_SECONDS: &str = "wagpt_llm_completion_duration_seconds";
    /// Completion errors
    pub const COMPLETION_ERRORS_TOTAL: &str = "wagpt_llm_completion_errors_total";
    /// Prompt tokens billed
    pub const INPUT_TOKENS_TOTAL: &str = "wagpt_llm_input_tokens_total";
    /// Completion tokens billed
    pub const OUTPUT_TOKENS_TOTAL: &str = "wagpt_llm_output_tokens_total";
    /// Responses replaced by the fallback text
    pub const EMPTY_RESPONSES_TOTAL: &str = "wagpt_llm_empty_responses_total";
}

/// WhatsApp session
pub mod whatsapp {
    /// Inbound messages received from the sidecar
    pub const MESSAGES_RECEIVED_TOTAL: &str = "wagpt_whatsapp_messages_received_total";
    /// Outbound messages acknowledged by the sidecar
    pub const MESSAGES_SENT_TOTAL: &str = "wagpt_whatsapp_messages_sent_total";
    /// Outbound messages that failed
    pub const SEND_ERRORS_TOTAL: &str = "wagpt_whatsapp_send_errors_total";
    /// Session state changes, labelled by the new state
    pub const STATE_CHANGES_TOTAL: &str = "wagpt_whatsapp_state_changes_total";
}

/// Common label keys
pub mod labels {
    pub const PROVIDER: &str = "provider";
    pub const MODEL: &str = "model";
    pub const ERROR_TYPE: &str = "error_type";
    pub const STATE: &str = "state";
    pub const GROUP: &str = "group";
}

/// Histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// LLM completion duration buckets (in seconds)
    /// Covers 100ms to 5 minutes
    pub static LLM_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0,
        ]
    });

    /// Dispatch duration buckets (in seconds), provider time plus sends
    pub static DISPATCH_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
        ]
    });
}
