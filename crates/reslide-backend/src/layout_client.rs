// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP client for a batch layout-analysis service.
//
// Protocol:
//   POST {base}/tasks        {"file_name", "image": <base64>}   -> {"task_id"}
//   GET  {base}/tasks/{id}                                      -> {"state", "error"?, "result"?}
//
// `result` carries the page structure plus an `assets` map of base64 rasters
// referenced by image spans.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reslide_core::config::EndpointSettings;
use reslide_core::error::{ReslideError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::HttpBackend;
use crate::traits::{LayoutBackend, LayoutDocument, LayoutPoll};

const SERVICE: &str = "layout";

#[derive(Serialize)]
struct SubmitRequest<'a> {
    file_name: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    state: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<TaskResult>,
}

#[derive(Deserialize)]
struct TaskResult {
    #[serde(flatten)]
    document: LayoutDocument,
    #[serde(default)]
    assets: BTreeMap<String, String>,
}

/// Layout backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLayoutBackend {
    http: HttpBackend,
}

impl HttpLayoutBackend {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new(SERVICE, settings)?,
        })
    }
}

fn decode_result(result: TaskResult) -> Result<LayoutDocument> {
    let mut document = result.document;
    for (name, encoded) in result.assets {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ReslideError::backend(SERVICE, format!("asset {name} is not base64: {e}")))?;
        document.assets.insert(name, bytes);
    }
    Ok(document)
}

fn interpret(task: TaskResponse) -> Result<LayoutPoll> {
    match task.state.as_str() {
        "pending" | "queued" | "running" => Ok(LayoutPoll::Pending),
        "done" | "completed" | "success" => {
            let result = task
                .result
                .ok_or_else(|| ReslideError::backend(SERVICE, "completed task has no result"))?;
            Ok(LayoutPoll::Done(decode_result(result)?))
        }
        "failed" | "error" => Ok(LayoutPoll::Failed(
            task.error.unwrap_or_else(|| "task failed without a message".into()),
        )),
        other => Err(ReslideError::backend(SERVICE, format!("unknown task state '{other}'"))),
    }
}

#[async_trait]
impl LayoutBackend for HttpLayoutBackend {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self, image_bytes), fields(bytes = image_bytes.len()))]
    async fn submit(&self, file_name: &str, image_bytes: Vec<u8>) -> Result<String> {
        let request = SubmitRequest {
            file_name,
            image: STANDARD.encode(&image_bytes),
        };
        let response: SubmitResponse = self.http.post_json("tasks", &request).await?;
        debug!(task_id = %response.task_id, "layout task submitted");
        Ok(response.task_id)
    }

    async fn poll(&self, task_id: &str) -> Result<LayoutPoll> {
        let task: TaskResponse = self.http.get_json(&format!("tasks/{task_id}")).await?;
        interpret(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<LayoutPoll> {
        interpret(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn running_task_is_pending() {
        assert!(matches!(parse(r#"{"state":"running"}"#), Ok(LayoutPoll::Pending)));
    }

    #[test]
    fn failed_task_carries_message() {
        match parse(r#"{"state":"failed","error":"bad page"}"#) {
            Ok(LayoutPoll::Failed(msg)) => assert_eq!(msg, "bad page"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn finished_task_decodes_blocks_and_assets() {
        let asset = STANDARD.encode(b"png-bytes");
        let json = format!(
            r#"{{"state":"done","result":{{
                "page_width":100.0,"page_height":50.0,
                "blocks":[{{"type":"image","bbox":[1,2,30,40],"blocks":[
                    {{"type":"image_body","bbox":[1,2,30,35],"lines":[{{"spans":[
                        {{"type":"image","image_path":"a.png"}}]}}]}}]}}],
                "assets":{{"a.png":"{asset}"}}}}}}"#
        );
        match parse(&json) {
            Ok(LayoutPoll::Done(doc)) => {
                assert_eq!(doc.page_width, 100.0);
                assert_eq!(doc.blocks.len(), 1);
                assert_eq!(doc.blocks[0].blocks[0].kind, "image_body");
                assert_eq!(doc.assets.get("a.png").map(Vec::as_slice), Some(&b"png-bytes"[..]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn done_without_result_is_an_error() {
        assert!(parse(r#"{"state":"done"}"#).is_err());
        assert!(parse(r#"{"state":"exploded"}"#).is_err());
    }
}
