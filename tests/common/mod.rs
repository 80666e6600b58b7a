//! Shared mocks for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracker_assistant_rs::config::Config;
use tracker_assistant_rs::credentials::JsonCredentialCache;
use tracker_assistant_rs::engine::ConversationEngine;
use tracker_assistant_rs::error::{Error, Result};
use tracker_assistant_rs::tracking::{
    CommandType, Credentials, Device, DeviceStatus, LoginSession, Position, PositionAttributes,
    TrackingApi,
};
use tracker_assistant_rs::transport::{Outbound, Transport};

pub const USER: &str = "558499998888@c.us";
pub const COOKIE: &str = "JSESSIONID=node0abc";

/// Calls made against the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Login { username: String, password: String },
    ListDevices { username: String, cookie: String },
    PositionById { position_id: i64, cookie: String },
    Route { device_id: i64, from: DateTime<Utc>, to: DateTime<Utc> },
    SendCommand { device_id: i64, command: CommandType },
    PasswordReset { email: String },
}

/// Scriptable in-memory tracking backend
pub struct MockTracking {
    accounts: Mutex<HashMap<String, (String, String)>>,
    devices: Mutex<Option<Vec<Device>>>,
    positions: Mutex<HashMap<i64, Position>>,
    route: Mutex<Option<Vec<Position>>>,
    command_ok: AtomicBool,
    reset_ok: AtomicBool,
    pub calls: Mutex<Vec<Call>>,
}

impl MockTracking {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            devices: Mutex::new(Some(Vec::new())),
            positions: Mutex::new(HashMap::new()),
            route: Mutex::new(Some(Vec::new())),
            command_ok: AtomicBool::new(true),
            reset_ok: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accept `username`/`password`, greeting with `display_name`
    pub fn with_account(self, username: &str, password: &str, display_name: &str) -> Self {
        self.accounts.lock().unwrap().insert(
            username.to_string(),
            (password.to_string(), display_name.to_string()),
        );
        self
    }

    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        *self.devices.lock().unwrap() = Some(devices);
        self
    }

    /// Device listing fails with a backend error
    pub fn devices_unavailable(&self) {
        *self.devices.lock().unwrap() = None;
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        *self.devices.lock().unwrap() = Some(devices);
    }

    pub fn with_position(self, position_id: i64, position: Position) -> Self {
        self.positions.lock().unwrap().insert(position_id, position);
        self
    }

    pub fn set_route(&self, route: Option<Vec<Position>>) {
        *self.route.lock().unwrap() = route;
    }

    pub fn set_command_ok(&self, ok: bool) {
        self.command_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_reset_ok(&self, ok: bool) {
        self.reset_ok.store(ok, Ordering::SeqCst);
    }

    pub fn recorded_calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TrackingApi for MockTracking {
    async fn login(&self, username: &str, password: &str) -> Result<LoginSession> {
        self.record(Call::Login {
            username: username.to_string(),
            password: password.to_string(),
        });
        match self.accounts.lock().unwrap().get(username) {
            Some((expected, name)) if expected == password => Ok(LoginSession {
                display_name: name.clone(),
                cookie: COOKIE.to_string(),
            }),
            _ => Err(Error::AuthFailure(username.to_string())),
        }
    }

    async fn list_devices(
        &self,
        username: &str,
        _password: &str,
        cookie: &str,
    ) -> Result<Vec<Device>> {
        self.record(Call::ListDevices {
            username: username.to_string(),
            cookie: cookie.to_string(),
        });
        self.devices.lock().unwrap().clone().ok_or(Error::Backend {
            status: 503,
            context: "list devices".to_string(),
        })
    }

    async fn position_by_id(
        &self,
        _username: &str,
        _password: &str,
        cookie: &str,
        position_id: i64,
    ) -> Result<Option<Position>> {
        self.record(Call::PositionById {
            position_id,
            cookie: cookie.to_string(),
        });
        Ok(self.positions.lock().unwrap().get(&position_id).cloned())
    }

    async fn route(
        &self,
        _credentials: &Credentials,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>> {
        self.record(Call::Route { device_id, from, to });
        self.route.lock().unwrap().clone().ok_or(Error::Backend {
            status: 500,
            context: "route".to_string(),
        })
    }

    async fn send_command(
        &self,
        _credentials: &Credentials,
        device_id: i64,
        command: CommandType,
    ) -> bool {
        self.record(Call::SendCommand { device_id, command });
        self.command_ok.load(Ordering::SeqCst)
    }

    async fn request_password_reset(&self, email: &str) -> bool {
        self.record(Call::PasswordReset {
            email: email.to_string(),
        });
        self.reset_ok.load(Ordering::SeqCst)
    }
}

/// Transport that records everything sent
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, Outbound)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts_for(&self, user_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user_id)
            .filter_map(|(_, m)| match m {
                Outbound::Text(t) => Some(t.clone()),
                Outbound::Location(_) => None,
            })
            .collect()
    }

    pub fn messages_for(&self, user_id: &str) -> Vec<Outbound> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn last_text(&self, user_id: &str) -> Option<String> {
        self.texts_for(user_id).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, user_id: &str, message: Outbound) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), message));
        Ok(())
    }
}

pub struct Harness {
    pub temp_dir: TempDir,
    pub config: Config,
    pub tracking: Arc<MockTracking>,
    pub transport: Arc<RecordingTransport>,
    pub credentials: Arc<JsonCredentialCache>,
    pub engine: Arc<ConversationEngine>,
}

impl Harness {
    pub fn new(tracking: MockTracking) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::for_test(temp_dir.path());
        let tracking = Arc::new(tracking);
        let transport = Arc::new(RecordingTransport::new());
        let credentials = Arc::new(JsonCredentialCache::new(&config));
        let engine = Arc::new(ConversationEngine::new(
            &config,
            tracking.clone(),
            transport.clone(),
            credentials.clone(),
        ));

        Self {
            temp_dir,
            config,
            tracking,
            transport,
            credentials,
            engine,
        }
    }

    pub async fn say(&self, text: &str) {
        self.engine.handle_message(USER, text).await;
    }
}

pub fn device(id: i64, name: &str) -> Device {
    Device {
        id,
        name: name.to_string(),
        status: DeviceStatus::Online,
        position_id: Some(id * 100),
    }
}

pub fn devices(ids: &[i64]) -> Vec<Device> {
    ids.iter().map(|id| device(*id, &format!("Vehicle {}", id))).collect()
}

pub fn position(latitude: f64, longitude: f64) -> Position {
    Position {
        latitude,
        longitude,
        speed_knots: 0.0,
        fix_time: None,
        address: None,
        attributes: PositionAttributes::default(),
    }
}
