//! Conversation engine
//!
//! Drives one user's conversation through login, device selection and the
//! command menu. Every backend failure ends in a reply; nothing here returns an
//! error to the caller.

use crate::command::{parse_device_id, Keyword, MenuCommand};
use crate::config::Config;
use crate::credentials::{CredentialCache, SavedCredentials};
use crate::formatter::{self, reply};
use crate::session::{Session, SessionGuard, SessionState, SessionStore};
use crate::tracking::{CommandType, Credentials, Device, TrackingApi};
use crate::transport::{Outbound, Transport};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables taken from `Config`
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub route_window_minutes: i64,
    pub route_max_points: usize,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
            route_window_minutes: config.route_window_minutes,
            route_max_points: config.route_max_points,
        }
    }
}

pub struct ConversationEngine {
    tracking: Arc<dyn TrackingApi>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialCache>,
    sessions: SessionStore,
    settings: EngineSettings,
}

impl ConversationEngine {
    pub fn new(
        config: &Config,
        tracking: Arc<dyn TrackingApi>,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialCache>,
    ) -> Self {
        Self {
            tracking,
            transport,
            credentials,
            sessions: SessionStore::new(),
            settings: EngineSettings::from(config),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one inbound direct message to completion
    pub async fn handle_message(&self, user_id: &str, text: &str) {
        let text = text.trim();
        let mut session = self.sessions.lock(user_id).await;

        if session.state() == SessionState::AwaitingPassword {
            debug!("Message from {} [password]", user_id);
        } else {
            debug!(
                "Message from {} in {}: {}",
                user_id,
                session.state(),
                text.chars().take(50).collect::<String>()
            );
        }

        match Keyword::parse(text) {
            Some(Keyword::Logout) => {
                session.end();
                info!("Session closed by {}", user_id);
                self.reply(user_id, reply::LOGGED_OUT).await;
                return;
            }
            Some(Keyword::ResetPassword) if session.get().is_some() => {
                session.set(Session::AwaitingResetEmail);
                self.reply(user_id, reply::ASK_RESET_EMAIL).await;
                return;
            }
            Some(Keyword::Start) => {
                self.start(&mut session).await;
                return;
            }
            _ => {}
        }

        let current = session.get().cloned();
        match current {
            None => self.reply(user_id, reply::START_HINT).await,
            Some(Session::AwaitingUsername) => {
                session.set(Session::AwaitingPassword {
                    username: text.to_string(),
                });
                self.reply(user_id, reply::ASK_PASSWORD).await;
            }
            Some(Session::AwaitingPassword { username }) => {
                let saved = SavedCredentials {
                    username: username.clone(),
                    password: text.to_string(),
                };
                match self.credentials.set(user_id, saved).await {
                    Ok(()) => self.reply(user_id, reply::CREDENTIALS_SAVED).await,
                    Err(e) => warn!("Failed to save credentials for {}: {}", user_id, e),
                }
                self.authenticate_and_list(&mut session, &username, text).await;
            }
            Some(Session::AwaitingResetEmail) => {
                let accepted = self.tracking.request_password_reset(text).await;
                info!("Password reset for {} accepted={}", user_id, accepted);
                let message = if accepted {
                    reply::RESET_SENT
                } else {
                    reply::RESET_FAILED
                };
                self.reply(user_id, message).await;
                session.end();
            }
            Some(Session::AwaitingDeviceSelection {
                credentials,
                devices,
            }) => {
                let selected = parse_device_id(text)
                    .and_then(|id| devices.into_iter().find(|d| d.id == id));
                match selected {
                    Some(device) => {
                        info!("{} selected device {} ({})", user_id, device.id, device.name);
                        let menu = reply::menu(&device);
                        session.set(Session::AwaitingMenuChoice {
                            credentials,
                            device,
                        });
                        self.reply(user_id, menu).await;
                    }
                    None => self.reply(user_id, reply::INVALID_DEVICE_ID).await,
                }
            }
            Some(Session::AwaitingMenuChoice {
                credentials,
                device,
            }) => {
                self.run_menu_command(&mut session, &credentials, &device, text)
                    .await;
            }
        }
    }

    /// Start keyword: reuse saved credentials or ask for them
    async fn start(&self, session: &mut SessionGuard<'_>) {
        let user_id = session.user_id().to_string();
        let saved = match self.credentials.get(&user_id).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to read saved credentials for {}: {}", user_id, e);
                None
            }
        };

        match saved {
            Some(saved) => {
                debug!("Using saved credentials for {}", user_id);
                self.authenticate_and_list(session, &saved.username, &saved.password)
                    .await;
            }
            None => {
                session.set(Session::AwaitingUsername);
                self.reply(&user_id, reply::ASK_USERNAME).await;
            }
        }
    }

    async fn authenticate_and_list(
        &self,
        session: &mut SessionGuard<'_>,
        username: &str,
        password: &str,
    ) {
        let user_id = session.user_id().to_string();
        self.reply(&user_id, reply::AUTHENTICATING).await;

        let login = match self.tracking.login(username, password).await {
            Ok(login) => login,
            Err(e) => {
                if e.is_auth_failure() {
                    info!("Login rejected for {} ({})", user_id, username);
                } else {
                    warn!("Login for {} failed: {}", user_id, e);
                }
                self.reply(&user_id, reply::AUTH_FAILED).await;
                session.end();
                return;
            }
        };

        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
            cookie: login.cookie,
        };
        self.reply(&user_id, reply::greeting(&login.display_name))
            .await;

        let devices = match self
            .tracking
            .list_devices(username, password, &credentials.cookie)
            .await
        {
            Ok(devices) if !devices.is_empty() => devices,
            Ok(_) => {
                info!("No devices for {}", user_id);
                self.reply(&user_id, reply::NO_DEVICES).await;
                session.end();
                return;
            }
            Err(e) => {
                warn!("Listing devices for {} failed: {}", user_id, e);
                self.reply(&user_id, reply::NO_DEVICES).await;
                session.end();
                return;
            }
        };

        info!("{} logged in with {} devices", user_id, devices.len());
        self.reply(&user_id, reply::device_count(devices.len())).await;
        self.send_device_list(&user_id, &devices).await;
        session.set(Session::AwaitingDeviceSelection {
            credentials,
            devices,
        });
    }

    async fn send_device_list(&self, user_id: &str, devices: &[Device]) {
        let batches = formatter::device_batches(devices, self.settings.batch_size);
        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            self.reply(user_id, batch).await;
        }
    }

    async fn run_menu_command(
        &self,
        session: &mut SessionGuard<'_>,
        credentials: &Credentials,
        device: &Device,
        text: &str,
    ) {
        let user_id = session.user_id().to_string();
        let command = MenuCommand::parse(text);
        debug!("{} menu command {:?} on device {}", user_id, command, device.id);

        match command {
            MenuCommand::Locate => self.locate(&user_id, credentials, device).await,
            MenuCommand::Lock => {
                self.engine_command(&user_id, credentials, device, CommandType::EngineStop)
                    .await
            }
            MenuCommand::Unlock => {
                self.engine_command(&user_id, credentials, device, CommandType::EngineResume)
                    .await
            }
            MenuCommand::Replay => self.replay_route(&user_id, credentials, device).await,
            MenuCommand::Switch => {
                self.reply(&user_id, reply::FETCHING_DEVICES_AGAIN).await;
                let devices = match self
                    .tracking
                    .list_devices(&credentials.username, &credentials.password, &credentials.cookie)
                    .await
                {
                    Ok(devices) if !devices.is_empty() => devices,
                    Ok(_) => {
                        self.reply(&user_id, reply::DEVICES_FAILED).await;
                        return;
                    }
                    Err(e) => {
                        warn!("Listing devices for {} failed: {}", user_id, e);
                        self.reply(&user_id, reply::DEVICES_FAILED).await;
                        return;
                    }
                };

                session.set(Session::AwaitingDeviceSelection {
                    credentials: credentials.clone(),
                    devices: devices.clone(),
                });
                self.reply(&user_id, reply::SELECT_NEW_DEVICE).await;
                self.send_device_list(&user_id, &devices).await;
            }
            MenuCommand::Unrecognized(command) => {
                self.reply(&user_id, reply::unrecognized(&command)).await
            }
        }
    }

    async fn locate(&self, user_id: &str, credentials: &Credentials, device: &Device) {
        let Some(position_id) = device.latest_position_id() else {
            self.reply(user_id, reply::NO_POSITION).await;
            return;
        };

        self.reply(user_id, reply::FETCHING_POSITION).await;
        let position = self
            .tracking
            .position_by_id(
                &credentials.username,
                &credentials.password,
                &credentials.cookie,
                position_id,
            )
            .await;

        match position {
            Ok(Some(position)) => {
                let payload = formatter::location_payload(device, &position);
                self.send(user_id, Outbound::Location(payload)).await;
                self.reply(user_id, formatter::location_info(&position)).await;
            }
            Ok(None) => self.reply(user_id, reply::POSITION_FAILED).await,
            Err(e) => {
                warn!("Position {} for {} failed: {}", position_id, user_id, e);
                self.reply(user_id, reply::POSITION_FAILED).await;
            }
        }
    }

    async fn engine_command(
        &self,
        user_id: &str,
        credentials: &Credentials,
        device: &Device,
        command: CommandType,
    ) {
        let lock = command == CommandType::EngineStop;
        self.reply(user_id, reply::sending_lock(device, lock)).await;

        let accepted = self
            .tracking
            .send_command(credentials, device.id, command)
            .await;
        info!(
            "{} sent {} to device {} accepted={}",
            user_id, command, device.id, accepted
        );
        self.reply(user_id, reply::lock_result(device, lock, accepted))
            .await;
    }

    async fn replay_route(&self, user_id: &str, credentials: &Credentials, device: &Device) {
        self.reply(user_id, reply::BUILDING_ROUTE).await;

        let to = Utc::now();
        let from = to - chrono::Duration::minutes(self.settings.route_window_minutes);
        match self.tracking.route(credentials, device.id, from, to).await {
            Ok(positions) => {
                match formatter::navigation_link(&positions, self.settings.route_max_points) {
                    Some(url) => self.reply(user_id, reply::route_link(device, &url)).await,
                    None => {
                        self.reply(
                            user_id,
                            reply::insufficient_route(self.settings.route_window_minutes),
                        )
                        .await
                    }
                }
            }
            Err(e) => {
                warn!("Route for device {} failed: {}", device.id, e);
                self.reply(user_id, reply::ROUTE_FAILED).await;
            }
        }
    }

    async fn reply(&self, user_id: &str, text: impl Into<String>) {
        self.send(user_id, Outbound::Text(text.into())).await;
    }

    async fn send(&self, user_id: &str, message: Outbound) {
        if let Err(e) = self.transport.send(user_id, message).await {
            warn!("Failed to send to {}: {}", user_id, e);
        }
    }
}
