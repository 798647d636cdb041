//! Outbound payload rendering.
//!
//! The hub renders each accepted message once and hands the same text
//! frame to every mailbox.

use chathub_protocol::Message;

/// Errors produced while rendering a message.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("render failed: {0}")]
    Failed(String),
}

/// Turns a [`Message`] into the text sent to peers.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, message: &Message) -> Result<String, RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&Message) -> Result<String, RenderError> + Send + Sync + 'static,
{
    fn render(&self, message: &Message) -> Result<String, RenderError> {
        self(message)
    }
}

/// Renders an htmx out-of-band fragment appended to `#messages`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, message: &Message) -> Result<String, RenderError> {
        Ok(format!(
            concat!(
                r#"<div id="messages" hx-swap-oob="beforeend">"#,
                r#"<div class="message"><span class="client-id">{}</span>"#,
                r#"<p class="text">{}</p></div></div>"#,
            ),
            escape_html(message.client_id.as_str()),
            escape_html(&message.text),
        ))
    }
}

/// Renders `{"clientId": ..., "text": ...}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, message: &Message) -> Result<String, RenderError> {
        Ok(serde_json::to_string(message)?)
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
