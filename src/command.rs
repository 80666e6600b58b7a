//! Parsing of inbound text into conversation commands

use crate::config::{LOGOUT_KEYWORD, RESET_KEYWORD, START_KEYWORD};

/// Keywords honoured outside the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Start,
    Logout,
    ResetPassword,
}

impl Keyword {
    /// Whole-message, case-insensitive match
    pub fn parse(text: &str) -> Option<Keyword> {
        let lowered = text.trim().to_lowercase();
        match lowered.as_str() {
            START_KEYWORD => Some(Keyword::Start),
            LOGOUT_KEYWORD => Some(Keyword::Logout),
            RESET_KEYWORD => Some(Keyword::ResetPassword),
            _ => None,
        }
    }
}

/// Menu actions available once a device is selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Locate,
    Lock,
    Unlock,
    Replay,
    Switch,
    Unrecognized(String),
}

impl MenuCommand {
    pub fn parse(text: &str) -> MenuCommand {
        let command = text.trim().to_uppercase();
        match command.as_str() {
            "LOCALIZAÇÃO" | "LOCALIZACAO" => MenuCommand::Locate,
            "BLOQUEIO" => MenuCommand::Lock,
            "DESBLOQUEIO" => MenuCommand::Unlock,
            "REVER" => MenuCommand::Replay,
            "TROCAR" => MenuCommand::Switch,
            _ => MenuCommand::Unrecognized(command),
        }
    }
}

/// Parse a device id typed during selection
pub fn parse_device_id(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}
