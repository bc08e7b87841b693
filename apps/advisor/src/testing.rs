//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use crate::chat::messages::Message;
use crate::chat::params::GenerationParams;
use crate::config::{Config, DEFAULT_INFERENCE_BASE_URL, DEFAULT_INFERENCE_MODEL};
use crate::llm_client::{ChatBackend, FragmentStream, LlmError};
use crate::session::SessionStore;
use crate::state::AppState;

pub fn test_config() -> Config {
    Config {
        port: 0,
        rust_log: "debug".to_string(),
        inference_base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
        inference_model: DEFAULT_INFERENCE_MODEL.to_string(),
        hf_token: None,
        inference_timeout: Duration::from_secs(5),
        inference_idle_timeout: Duration::from_secs(5),
        max_upload_bytes: 1024 * 1024,
        session_idle_ttl: Duration::from_secs(3600),
        session_sweep_interval: Duration::from_secs(60),
    }
}

/// One scripted element of a stub completion.
#[derive(Debug, Clone)]
pub enum Scripted {
    Fragment(&'static str),
    Fail(&'static str),
}

/// A `ChatBackend` that replays a fixed script and records every request.
#[derive(Default)]
pub struct StubBackend {
    script: Vec<Scripted>,
    pub requests: Mutex<Vec<(Vec<Message>, GenerationParams)>>,
}

impl StubBackend {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fragments(parts: &[&'static str]) -> Arc<Self> {
        Self::new(parts.iter().copied().map(Scripted::Fragment).collect())
    }

    pub fn last_request(&self) -> Option<(Vec<Message>, GenerationParams)> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for StubBackend {
    async fn stream_chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<FragmentStream, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), *params));

        let items: Vec<Result<String, LlmError>> = self
            .script
            .iter()
            .map(|step| match step {
                Scripted::Fragment(text) => Ok(text.to_string()),
                Scripted::Fail(reason) => Err(LlmError::Stream(reason.to_string())),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn test_state(backend: Arc<StubBackend>) -> AppState {
    AppState {
        llm: backend,
        sessions: SessionStore::new(),
        config: test_config(),
    }
}

/// Builds a minimal PDF with one line of Helvetica text per page.
///
/// Page text must not contain `(`, `)` or `\`.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    // 1: catalog, 2: page tree, 3: font, then a page and its content stream per page.
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", i + 1).as_bytes());
    }

    let xref_at = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{offset:010} 00000 n \n"));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}
