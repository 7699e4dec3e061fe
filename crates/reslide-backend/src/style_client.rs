// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-style inference through an OpenAI-compatible vision chat endpoint.
//
// One request covers every queried element of an image: the image goes in as a
// data URL, the element list as JSON, and the model answers with a JSON object
// `{"styles": [StyleVerdict, ..]}`.

use async_trait::async_trait;
use image::DynamicImage;
use reslide_core::config::EndpointSettings;
use reslide_core::error::{ReslideError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec::png_data_url;
use crate::http::HttpBackend;
use crate::traits::{StyleBackend, StyleQuery, StyleVerdict};

const SERVICE: &str = "style";
const DEFAULT_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "You inspect text in images. For every element in the list, \
report the text colour as #RRGGBB, whether it is bold, italic or underlined, and its \
horizontal alignment (left, center, right, justify) inside its box. When one element mixes \
colours or slants, add a `runs` array of {text, color, bold, italic} segments in reading \
order. Answer with a JSON object {\"styles\": [{\"id\", \"color\", \"bold\", \"italic\", \
\"underline\", \"alignment\", \"runs\"}]} and nothing else.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Content>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct StyleAnswer {
    #[serde(default)]
    styles: Vec<StyleVerdict>,
}

/// Vision-model style backend.
#[derive(Debug, Clone)]
pub struct VisionStyleBackend {
    http: HttpBackend,
}

impl VisionStyleBackend {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new(SERVICE, settings)?,
        })
    }
}

fn build_request<'a>(model: &'a str, image_url: String, queries: &[StyleQuery]) -> Result<ChatRequest<'a>> {
    let elements = serde_json::to_string(queries)?;
    Ok(ChatRequest {
        model,
        temperature: 0.0,
        response_format: ResponseFormat { r#type: "json_object" },
        messages: vec![
            Message {
                role: "system",
                content: vec![Content::Text {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            Message {
                role: "user",
                content: vec![
                    Content::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                    Content::Text {
                        text: format!("Elements (pixel boxes): {elements}"),
                    },
                ],
            },
        ],
    })
}

/// Pull the JSON object out of a reply, tolerating a fenced code block.
fn parse_answer(content: &str) -> Result<Vec<StyleVerdict>> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    let answer: StyleAnswer = serde_json::from_str(body.trim())
        .map_err(|e| ReslideError::backend(SERVICE, format!("unparseable style answer: {e}")))?;
    Ok(answer.styles)
}

#[async_trait]
impl StyleBackend for VisionStyleBackend {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip_all, fields(queries = queries.len()))]
    async fn analyze(&self, image: &DynamicImage, queries: &[StyleQuery]) -> Result<Vec<StyleVerdict>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.http.model().unwrap_or(DEFAULT_MODEL);
        let request = build_request(model, png_data_url(image)?, queries)?;
        let response: ChatResponse = self.http.post_json("chat/completions", &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReslideError::backend(SERVICE, "response has no choices"))?;
        let verdicts = parse_answer(&content)?;
        debug!(verdicts = verdicts.len(), "style answer parsed");
        Ok(verdicts)
    }
}
