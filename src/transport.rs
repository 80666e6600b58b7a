//! Chat transport seam
//!
//! The engine only needs to send text and location messages to a user id. The
//! console transport drives the bot from a terminal: one `<user>: <text>` line
//! per inbound message.

use crate::error::{Error, Result};
use crate::phone::chat_id_for;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Location pin sent to the user
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub address: Option<String>,
    pub description: String,
}

/// Outbound chat content
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Location(LocationPayload),
}

/// Message received from the chat network
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
    pub is_group: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, user_id: &str, message: Outbound) -> Result<()>;
}

static CONSOLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(group)\s+)?([^:\s][^:]*?)\s*:\s?(.*)$").expect("Invalid console line regex")
});

/// Parse a console input line; blank lines yield `None`
pub fn parse_console_line(line: &str) -> Result<Option<InboundMessage>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let caps = CONSOLE_LINE
        .captures(line)
        .ok_or_else(|| Error::Transport(format!("expected '<user>: <text>', got '{}'", line)))?;

    let is_group = caps.get(1).is_some();
    let user = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let text = caps.get(3).map(|m| m.as_str().trim_end()).unwrap_or("");

    Ok(Some(InboundMessage {
        user_id: chat_id_for(user)?,
        text: text.to_string(),
        is_group,
    }))
}

/// Render an outbound message for the console
pub fn render_outbound(user_id: &str, message: &Outbound) -> String {
    match message {
        Outbound::Text(text) => format!("-> {}: {}", user_id, text),
        Outbound::Location(loc) => format!(
            "-> {}: [location {:.6},{:.6}] {}\n{}\n{}",
            user_id,
            loc.latitude,
            loc.longitude,
            loc.name,
            loc.address.as_deref().unwrap_or(""),
            loc.description
        ),
    }
}

/// Writes outbound messages to stdout
pub struct ConsoleTransport {
    out: Mutex<Stdout>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, user_id: &str, message: Outbound) -> Result<()> {
        let rendered = render_outbound(user_id, &message);
        let mut out = self.out.lock().await;
        out.write_all(rendered.as_bytes()).await?;
        out.write_all(b"\n\n").await?;
        out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_line() {
        let msg = parse_console_line("5584999998888: #iniciar").unwrap().unwrap();
        assert_eq!(msg.user_id, "558499998888@c.us");
        assert_eq!(msg.text, "#iniciar");
        assert!(!msg.is_group);
    }

    #[test]
    fn test_parse_group_line() {
        let msg = parse_console_line("group team@g.us: oi").unwrap().unwrap();
        assert_eq!(msg.user_id, "team@g.us");
        assert_eq!(msg.text, "oi");
        assert!(msg.is_group);
    }

    #[test]
    fn test_parse_keeps_colons_in_text() {
        let msg = parse_console_line("bob@c.us: hora: 10:30").unwrap().unwrap();
        assert_eq!(msg.user_id, "bob@c.us");
        assert_eq!(msg.text, "hora: 10:30");
    }

    #[test]
    fn test_parse_blank_and_invalid() {
        assert!(parse_console_line("   ").unwrap().is_none());
        assert!(matches!(
            parse_console_line("no separator"),
            Err(Error::Transport(_))
        ));
        assert!(matches!(
            parse_console_line("123: hi"),
            Err(Error::InvalidPhone(_))
        ));
    }

    #[test]
    fn test_render_outbound() {
        let text = render_outbound("u", &Outbound::Text("oi".to_string()));
        assert_eq!(text, "-> u: oi");

        let loc = render_outbound(
            "u",
            &Outbound::Location(LocationPayload {
                latitude: -5.5,
                longitude: -36.25,
                name: "📍 Truck".to_string(),
                address: None,
                description: "Velocidade: 0 km/h".to_string(),
            }),
        );
        assert!(loc.starts_with("-> u: [location -5.500000,-36.250000] 📍 Truck"));
        assert!(loc.ends_with("Velocidade: 0 km/h"));
    }
}
