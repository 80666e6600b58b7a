//! Rendering of tracking data into chat replies
//!
//! Everything here is pure: no I/O, no clock.

use crate::config::DISPLAY_UTC_OFFSET_SECS;
use crate::tracking::{Device, DeviceStatus, Position};
use crate::transport::LocationPayload;
use chrono::{DateTime, Duration, Utc};

/// Knots to km/h
pub const KNOTS_TO_KMH: f64 = 1.852;

const MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/?api=1";

pub fn format_status(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Online => "🟢 Online",
        DeviceStatus::Offline => "⚫ Offline",
        DeviceStatus::Unknown => "⚪ Desconhecido",
    }
}

/// Fix time in the display zone, `dd/mm/yyyy HH:MM:SS`
pub fn format_fix_time(fix_time: Option<DateTime<Utc>>) -> String {
    match fix_time {
        Some(time) => {
            let local = time.naive_utc() + Duration::seconds(i64::from(DISPLAY_UTC_OFFSET_SECS));
            local.format("%d/%m/%Y %H:%M:%S").to_string()
        }
        None => "Data indisponível".to_string(),
    }
}

pub fn speed_kmh(speed_knots: f64) -> f64 {
    speed_knots * KNOTS_TO_KMH
}

/// Speed in km/h rounded to the nearest integer
pub fn format_speed(speed_knots: f64) -> String {
    format!("{}", speed_kmh(speed_knots).round() as i64)
}

fn motion_text(moving: bool) -> &'static str {
    if moving {
        "✅ Em movimento"
    } else {
        "🛑 Parado"
    }
}

fn ignition_text(on: bool) -> &'static str {
    if on {
        "🟢 Ligada"
    } else {
        "⚫ Desligada"
    }
}

fn blocked_text(blocked: bool) -> &'static str {
    if blocked {
        "🔒 Sim"
    } else {
        "🔓 Não"
    }
}

/// One entry of the device listing
pub fn device_entry(device: &Device) -> String {
    format!(
        "*Veículo:* {}\n*ID:* {} | *Status:* {}\n--------------------",
        device.name,
        device.id,
        format_status(device.status)
    )
}

/// Device listing split into messages of at most `batch_size` entries
pub fn device_batches(devices: &[Device], batch_size: usize) -> Vec<String> {
    devices
        .chunks(batch_size.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(device_entry)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

/// Structured location message for a device's fix
pub fn location_payload(device: &Device, position: &Position) -> LocationPayload {
    LocationPayload {
        latitude: position.latitude,
        longitude: position.longitude,
        name: format!("📍 {}", device.name),
        address: position.address.clone(),
        description: format!(
            "Velocidade: {} km/h\nÚltima atualização: {}",
            format_speed(position.speed_knots),
            format_fix_time(position.fix_time)
        ),
    }
}

/// Follow-up text with address and telemetry flags
pub fn location_info(position: &Position) -> String {
    format!(
        "*Informações Adicionais:*\n\n*Endereço:* {}\n*Movimento:* {}\n*Ignição:* {}\n*Bloqueado:* {}",
        position.address.as_deref().unwrap_or("Não disponível"),
        motion_text(position.attributes.motion),
        ignition_text(position.attributes.ignition),
        blocked_text(position.attributes.blocked)
    )
}

fn coordinate(position: &Position) -> String {
    format!("{:.6},{:.6}", position.latitude, position.longitude)
}

/// Navigation link over the most recent `max_points` positions, oldest first.
///
/// Returns `None` when there are fewer than two positions.
pub fn navigation_link(positions: &[Position], max_points: usize) -> Option<String> {
    if positions.len() < 2 {
        return None;
    }

    let recent = &positions[positions.len().saturating_sub(max_points.max(2))..];
    let origin = recent.first()?;
    let destination = recent.last()?;
    let waypoints = recent[1..recent.len() - 1]
        .iter()
        .map(coordinate)
        .collect::<Vec<_>>()
        .join("|");

    let mut url = format!(
        "{}&origin={}&destination={}",
        MAPS_DIRECTIONS_URL,
        coordinate(origin),
        coordinate(destination)
    );
    if !waypoints.is_empty() {
        url.push_str("&waypoints=");
        url.push_str(&waypoints);
    }
    url.push_str("&travelmode=driving&dir_action=navigate");
    Some(url)
}

/// Reply texts of the conversation
pub mod reply {
    use crate::tracking::Device;

    pub const START_HINT: &str = "Olá! Digite `#iniciar` para começar.";

    pub const LOGGED_OUT: &str =
        "Sessão encerrada. 👋\n\nDigite `#iniciar` para começar novamente.";

    pub const ASK_USERNAME: &str =
        "Olá! Detectei que é seu primeiro acesso. Por favor, digite seu *usuário* do Traccar.";

    pub const ASK_PASSWORD: &str =
        "Usuário recebido. Agora, por favor, digite sua *senha* do Traccar.";

    pub const CREDENTIALS_SAVED: &str = "✅ Credenciais salvas com sucesso!";

    pub const ASK_RESET_EMAIL: &str = "Entendido. Por favor, informe o seu *email de cadastro* no Traccar para enviarmos o link de redefinição.";

    pub const RESET_SENT: &str = "✅ Solicitação enviada! Se o email estiver correto, você receberá um link para redefinir sua senha.";

    pub const RESET_FAILED: &str = "❌ Ocorreu um erro ao processar sua solicitação.";

    pub const AUTHENTICATING: &str = "Autenticando e buscando seus veículos... ⏳";

    pub const AUTH_FAILED: &str = "❌ Falha na autenticação. Seu usuário ou senha podem estar incorretos.\n\nPara redefinir sua senha, digite: *RESETAR SENHA*";

    pub const NO_DEVICES: &str = "Nenhum veículo encontrado em sua conta.";

    pub const INVALID_DEVICE_ID: &str = "ID inválido. Por favor, digite um dos IDs da lista acima.";

    pub const NO_POSITION: &str = "❌ Não foi possível encontrar a última posição para este veículo.";

    pub const FETCHING_POSITION: &str = "Buscando localização, por favor aguarde... 🛰️";

    pub const POSITION_FAILED: &str =
        "❌ Não foi possível obter os detalhes da localização. Tente novamente.";

    pub const BUILDING_ROUTE: &str =
        "Gerando rota navegável das últimas posições, por favor aguarde... 🗺️";

    pub const ROUTE_FAILED: &str =
        "❌ Não foi possível consultar o histórico de posições. Tente novamente.";

    pub const FETCHING_DEVICES_AGAIN: &str = "Buscando sua lista de veículos novamente... 🚗";

    pub const DEVICES_FAILED: &str =
        "❌ Não foi possível buscar sua lista de veículos. Tente novamente mais tarde.";

    pub const SELECT_NEW_DEVICE: &str =
        "Você pode selecionar um novo veículo. *Digite o ID* daquele que deseja gerenciar:";

    pub fn greeting(display_name: &str) -> String {
        format!("Olá, *{}*! Conectado com sucesso. ✅", display_name)
    }

    pub fn device_count(count: usize) -> String {
        format!(
            "Encontramos *{}* veículos. Por favor, *digite o ID* daquele que deseja gerenciar:",
            count
        )
    }

    pub fn menu(device: &Device) -> String {
        format!(
            "Veículo *{}* selecionado.\n\n*Menu Principal*\n\nDigite o comando desejado:\n\n*LOCALIZAÇÃO*\n*BLOQUEIO*\n*DESBLOQUEIO*\n*REVER*\n*TROCAR*",
            device.name
        )
    }

    pub fn sending_lock(device: &Device, lock: bool) -> String {
        if lock {
            format!("Enviando comando de *bloqueio* para o veículo *{}*... 🔒", device.name)
        } else {
            format!("Enviando comando de *desbloqueio* para o veículo *{}*... 🔓", device.name)
        }
    }

    pub fn lock_result(device: &Device, lock: bool, accepted: bool) -> String {
        let action = if lock { "bloqueio" } else { "desbloqueio" };
        if accepted {
            format!("✅ Comando de {} enviado com sucesso para *{}*.", action, device.name)
        } else {
            format!("❌ Falha ao enviar o comando de {}.", action)
        }
    }

    pub fn route_link(device: &Device, url: &str) -> String {
        format!(
            "Rota navegável das últimas posições para *{}*.\n\nClique no link para iniciar a navegação:\n{}",
            device.name, url
        )
    }

    pub fn insufficient_route(window_minutes: i64) -> String {
        format!(
            "❌ Não foram encontradas posições suficientes (mínimo 2) nos últimos {} minutos para gerar uma rota.",
            window_minutes
        )
    }

    pub fn unrecognized(command: &str) -> String {
        format!(
            "Comando \"*{}*\" não reconhecido. Por favor, escolha uma das opções do menu.",
            command
        )
    }
}
