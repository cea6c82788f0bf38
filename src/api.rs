use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct QuestionInput {
    pub question: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct AnswerOutput {
    pub answer: String,
}

/// One completed question/answer pair in the endpoint's history schema.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub inputs: QuestionInput,
    pub outputs: AnswerOutput,
}

impl HistoryEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        HistoryEntry {
            inputs: QuestionInput {
                question: question.into(),
            },
            outputs: AnswerOutput {
                answer: answer.into(),
            },
        }
    }
}

/// Request body for the flow endpoint. Built fresh per call, never mutated
/// after send.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct FlowRequest {
    pub chat_input: String,

    pub chat_history: Vec<HistoryEntry>,
}

/// Reply body. Endpoints attach extra fields next to `chat_output`; keep them
/// so callers can log the full payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlowReply {
    #[serde(default)]
    pub chat_output: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Value,
}
