//! Traccar tracking backend client
//!
//! Thin typed wrapper over the backend HTTP API. Every call is a single attempt;
//! failures come back as values so the conversation layer can turn them into replies.
//!
//! Most reads authenticate with Basic auth plus the session cookie from login, but
//! the route query sends Basic only. The backend accepts both; keep the split.

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Connection status reported for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A tracked vehicle
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub position_id: Option<i64>,
}

impl Device {
    /// Latest known position id; the backend reports 0 when there is none
    pub fn latest_position_id(&self) -> Option<i64> {
        self.position_id.filter(|id| *id > 0)
    }
}

/// Telemetry flags attached to a position
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PositionAttributes {
    pub motion: bool,
    pub ignition: bool,
    pub blocked: bool,
}

/// One location fix
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "speed", default)]
    pub speed_knots: f64,
    #[serde(default)]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub attributes: PositionAttributes,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSession {
    pub display_name: String,
    pub cookie: String,
}

/// Authenticated credentials kept in a conversation
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub cookie: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("cookie", &"***")
            .finish()
    }
}

/// Device commands the menu can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandType {
    EngineStop,
    EngineResume,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::EngineStop => "engineStop",
            CommandType::EngineResume => "engineResume",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the conversation engine needs from the tracking backend
#[async_trait]
pub trait TrackingApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginSession>;

    async fn list_devices(&self, username: &str, password: &str, cookie: &str)
        -> Result<Vec<Device>>;

    async fn position_by_id(
        &self,
        username: &str,
        password: &str,
        cookie: &str,
        position_id: i64,
    ) -> Result<Option<Position>>;

    /// Positions in `[from, to]`, in the order the backend returns them
    async fn route(
        &self,
        credentials: &Credentials,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>>;

    /// True iff the backend accepted the command for delivery
    async fn send_command(
        &self,
        credentials: &Credentials,
        device_id: i64,
        command: CommandType,
    ) -> bool;

    async fn request_password_reset(&self, email: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    device_id: i64,
    #[serde(rename = "type")]
    command_type: CommandType,
}

/// reqwest-backed Traccar client
pub struct TraccarClient {
    client: Client,
    base_url: String,
}

impl TraccarClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.tracking_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn basic(&self, builder: RequestBuilder, username: &str, password: &str) -> RequestBuilder {
        builder.basic_auth(username, Some(password))
    }

    fn basic_with_cookie(
        &self,
        builder: RequestBuilder,
        username: &str,
        password: &str,
        cookie: &str,
    ) -> RequestBuilder {
        self.basic(builder, username, password).header(COOKIE, cookie)
    }
}

fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Backend {
            status: status.as_u16(),
            context: context.to_string(),
        })
    }
}

/// First `name=value` pair of the first `Set-Cookie` header
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(SET_COOKIE)?.to_str().ok()?;
    let pair = raw.split(';').next()?.trim();
    if pair.is_empty() {
        None
    } else {
        Some(pair.to_string())
    }
}

#[async_trait]
impl TrackingApi for TraccarClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginSession> {
        let response = self
            .client
            .post(self.url("/api/session"))
            .form(&[("email", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::AuthFailure(username.to_string()));
        }
        let response = ensure_success(response, "login")?;

        let cookie = session_cookie(response.headers()).ok_or(Error::MissingCookie)?;
        let user: SessionUser = response.json().await?;
        let display_name = if user.name.trim().is_empty() {
            username.to_string()
        } else {
            user.name
        };

        debug!("Logged in as {}", username);
        Ok(LoginSession {
            display_name,
            cookie,
        })
    }

    async fn list_devices(
        &self,
        username: &str,
        password: &str,
        cookie: &str,
    ) -> Result<Vec<Device>> {
        let request = self.client.get(self.url("/api/devices"));
        let response = self
            .basic_with_cookie(request, username, password, cookie)
            .send()
            .await?;
        let devices = ensure_success(response, "list devices")?.json().await?;
        Ok(devices)
    }

    async fn position_by_id(
        &self,
        username: &str,
        password: &str,
        cookie: &str,
        position_id: i64,
    ) -> Result<Option<Position>> {
        let request = self
            .client
            .get(self.url("/api/positions"))
            .query(&[("id", position_id)]);
        let response = self
            .basic_with_cookie(request, username, password, cookie)
            .send()
            .await?;
        let positions: Vec<Position> = ensure_success(response, "position by id")?.json().await?;
        Ok(positions.into_iter().next())
    }

    async fn route(
        &self,
        credentials: &Credentials,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>> {
        let request = self.client.get(self.url("/api/positions")).query(&[
            ("deviceId", device_id.to_string()),
            ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ]);
        let response = self
            .basic(request, &credentials.username, &credentials.password)
            .send()
            .await?;
        let positions = ensure_success(response, "route")?.json().await?;
        Ok(positions)
    }

    async fn send_command(
        &self,
        credentials: &Credentials,
        device_id: i64,
        command: CommandType,
    ) -> bool {
        let request = self
            .client
            .post(self.url("/api/commands/send"))
            .json(&CommandRequest {
                device_id,
                command_type: command,
            });
        let result = self
            .basic_with_cookie(
                request,
                &credentials.username,
                &credentials.password,
                &credentials.cookie,
            )
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::OK || status == StatusCode::ACCEPTED {
                    true
                } else {
                    warn!("Command {} for device {} rejected: {}", command, device_id, status);
                    false
                }
            }
            Err(e) => {
                warn!("Command {} for device {} failed: {}", command, device_id, e);
                false
            }
        }
    }

    async fn request_password_reset(&self, email: &str) -> bool {
        let result = self
            .client
            .post(self.url("/api/password/reset"))
            .form(&[("email", email)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Password reset rejected: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Password reset request failed: {}", e);
                false
            }
        }
    }
}
