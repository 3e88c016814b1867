use serde::{Deserialize, Serialize};

use crate::domain::Category;

use super::{EscalationError, EscalationRequest, EscalationVerdict};

const SYSTEM_PROMPT: &str = r#"You classify emails from a job seeker's inbox.
Pick exactly one category:
- application_received: confirmation that an application was submitted or received
- application_rejected: the employer declines to continue
- interview_invite: invitation to schedule or attend an interview or call
- assessment_invite: online assessment, coding challenge or take-home task
- offer_letter: a job offer or offer paperwork
- follow_up: a follow-up or status check on an existing application
- general_hr: other recruiter or HR correspondence about a specific job
- not_job_related: newsletters, marketing, job-board digests, anything else
- unknown: you cannot tell

Mass mailings listing many candidates are not_job_related unless addressed to the reader.
Return JSON only: {"category": "<one of the names above>", "confidence": <number between 0 and 1>, "justification": "<one short sentence>"}"#;

pub fn build_request(
    model: String,
    max_tokens: u32,
    request: &EscalationRequest,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: format!("Subject: {}\n\nBody:\n{}", request.subject, request.excerpt),
            },
        ],
        temperature: 0.1,
        max_tokens,
        response_format: ResponseFormat {
            r#type: "json_object".into(),
        },
    }
}

pub fn parse_completion(
    completion: ChatCompletionResponse,
) -> Result<EscalationVerdict, EscalationError> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| EscalationError::Malformed("completion had no message content".into()))?;
    parse_verdict(&content)
}

pub fn parse_verdict(content: &str) -> Result<EscalationVerdict, EscalationError> {
    let raw: RawVerdict = serde_json::from_str(content.trim())
        .map_err(|err| EscalationError::Malformed(format!("verdict is not valid JSON: {err}")))?;

    let category = raw
        .category
        .parse::<Category>()
        .map_err(|err| EscalationError::Malformed(err.to_string()))?;

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(EscalationError::Malformed(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    Ok(EscalationVerdict {
        category,
        confidence: raw.confidence,
        justification: raw.justification.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    category: String,
    confidence: f64,
    #[serde(default)]
    justification: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}
