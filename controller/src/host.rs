use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    sync::Mutex,
};
use tracing::{debug, info, warn};

use packet_thermostat_common::{
    sender_from_topic, CommandError, Furnace, OutputAction, OutputLatch, Packet, RuntimeConfig,
    Thermostat, TOPIC_COMMAND, TOPIC_CONTROLLER_OUTPUTS, TOPIC_CONTROLLER_STATE, TOPIC_RADIO_ALL,
    TOPIC_RADIO_PREFIX,
};

use crate::eeprom::FileEeprom;

#[derive(Clone)]
struct AppState {
    controller: Arc<Mutex<Controller>>,
    mqtt: AsyncClient,
    store: AppStore,
    node_id: u8,
}

/// The thermostat and the furnace lines it drives, locked together so output
/// writes land in the order the core produced them.
struct Controller {
    thermostat: Thermostat<FileEeprom>,
    furnace: LoggingFurnace,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    eeprom_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Stands in for the relay driver: tracks the mask and logs every change.
#[derive(Debug, Default)]
struct LoggingFurnace {
    latch: OutputLatch,
}

impl LoggingFurnace {
    fn mask(&self) -> u8 {
        self.latch.mask()
    }
}

impl Furnace for LoggingFurnace {
    fn update_outputs(&mut self, mask: u8) {
        let previous = self.latch.mask();
        self.latch.update_outputs(mask);
        if previous != mask {
            info!("furnace outputs {previous:#04x} -> {mask:#04x}");
        }
    }

    fn set_output_bits(&mut self, mask: u8) {
        self.update_outputs(self.latch.mask() | mask);
    }

    fn clear_output_bits(&mut self, mask: u8) {
        self.update_outputs(self.latch.mask() & !mask);
    }
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const CONSOLE_SENDER_ID: u8 = 0;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let capacity = runtime.controller.eeprom_capacity;
    let eeprom = store.load_eeprom(capacity).await.unwrap_or_else(|err| {
        warn!("failed to load eeprom image, starting erased: {err:#}");
        FileEeprom::erased(capacity)
    });

    let (thermostat, boot_actions) =
        Thermostat::boot(runtime.controller.clone(), eeprom, monotonic_ms())
            .context("failed to restore active mode")?;
    let mut furnace = LoggingFurnace::default();
    furnace.apply(&boot_actions);
    info!("booted into {}", thermostat.status().summary());

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("packet-thermostat-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        controller: Arc::new(Mutex::new(Controller {
            thermostat,
            furnace,
        })),
        mqtt,
        store,
        node_id: runtime.network.node_id,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_tick_loop(app_state.clone(), runtime.controller.tick_interval_ms);
    spawn_state_publish_loop(
        app_state.clone(),
        runtime.controller.state_publish_interval_ms,
    );
    spawn_console_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/command", post(handle_post_command))
        .route("/api/inputs", post(handle_post_inputs))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_RADIO_ALL, TOPIC_COMMAND] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_tick_loop(app_state: AppState, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let mask = {
                let mut controller = app_state.controller.lock().await;
                let actions = controller.thermostat.tick(now_ms);
                controller.drive(&actions)
            };

            if let Some(mask) = mask {
                publish_outputs(&app_state, mask).await;
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;

            let payload = {
                let controller = app_state.controller.lock().await;
                serde_json::to_vec(&controller.thermostat.status())
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }
        }
    });
}

/// Reads commands from stdin, one per line, the way the serial console fed
/// the radio board.
fn spawn_console_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match process_packet(&app_state, CONSOLE_SENDER_ID, true, &line).await {
                        Ok(()) => {
                            let controller = app_state.controller.lock().await;
                            info!("{}", controller.thermostat.status().summary());
                        }
                        Err(err) => info!("command not handled: {err:#}"),
                    }
                }
                Ok(None) => {
                    debug!("console closed");
                    break;
                }
                Err(err) => {
                    warn!("console read error: {err}");
                    break;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    let (sender_id, to_me) = if topic == TOPIC_COMMAND {
        (CONSOLE_SENDER_ID, true)
    } else if topic.starts_with(TOPIC_RADIO_PREFIX) {
        let Some(sender_id) = sender_from_topic(topic) else {
            debug!("ignoring radio topic without a node id: {topic}");
            return Ok(());
        };
        if sender_id == app_state.node_id {
            return Ok(());
        }
        (sender_id, false)
    } else {
        return Ok(());
    };

    match process_packet(app_state, sender_id, to_me, &message).await {
        Err(err) if err.downcast_ref::<CommandError>().is_some() => {
            debug!("packet from {sender_id} not handled: {err:#}");
            Ok(())
        }
        other => other,
    }
}

/// Runs one packet through the thermostat under the controller lock and
/// publishes the new output mask. A `CommandError` comes back wrapped in the
/// `anyhow::Error` so callers can tell rejection from I/O failure.
async fn process_packet(
    app_state: &AppState,
    sender_id: u8,
    to_me: bool,
    text: &str,
) -> anyhow::Result<()> {
    let packet = Packet {
        sender_id,
        to_me,
        text,
    };
    let mask = {
        let mut controller = app_state.controller.lock().await;
        run_packet(&app_state.store, &mut controller, &packet, monotonic_ms()).await?
    };

    if let Some(mask) = mask {
        publish_outputs(app_state, mask).await;
    }
    Ok(())
}

/// Drives the furnace with whatever the packet produced, then flushes the
/// EEPROM image if the packet wrote to it.
async fn run_packet(
    store: &AppStore,
    controller: &mut Controller,
    packet: &Packet<'_>,
    now_ms: u64,
) -> anyhow::Result<Option<u8>> {
    let result = controller.thermostat.handle_packet(packet, now_ms);
    let mask = match &result {
        Ok(actions) => controller.drive(actions),
        Err(_) => None,
    };

    // a rejected HVACMAP may still have written part of the table
    flush_eeprom(store, controller.thermostat.store_mut().eeprom_mut()).await?;

    result?;
    Ok(mask)
}

async fn flush_eeprom(store: &AppStore, eeprom: &mut FileEeprom) -> anyhow::Result<()> {
    let Some(image) = eeprom.take_dirty() else {
        return Ok(());
    };
    if let Err(err) = store.save_eeprom(&image).await {
        eeprom.mark_dirty();
        return Err(err.context("failed to persist eeprom image"));
    }
    Ok(())
}

impl Controller {
    /// Applies `actions` to the furnace, returning the resulting mask when
    /// anything was written.
    fn drive(&mut self, actions: &[OutputAction]) -> Option<u8> {
        if actions.is_empty() {
            return None;
        }
        self.furnace.apply(actions);
        Some(self.furnace.mask())
    }
}

async fn publish_outputs(app_state: &AppState, mask: u8) {
    if let Err(err) = app_state
        .mqtt
        .publish(
            TOPIC_CONTROLLER_OUTPUTS,
            QoS::AtLeastOnce,
            true,
            format!("{mask:#04x}"),
        )
        .await
    {
        warn!("controller outputs publish failed: {err}");
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = {
        let controller = state.controller.lock().await;
        controller.thermostat.status()
    };

    Json(status)
}

async fn handle_post_command(State(state): State<AppState>, body: String) -> impl IntoResponse {
    if body.len() > MAX_MQTT_PAYLOAD_BYTES {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Command too long");
    }

    if let Err(err) = process_packet(&state, CONSOLE_SENDER_ID, true, &body).await {
        if let Some(rejected) = err.downcast_ref::<CommandError>() {
            return error_response(StatusCode::BAD_REQUEST, &rejected.to_string());
        }
        warn!("command failed: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist settings",
        );
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_post_inputs(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(inputs) = parse_mask(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid input mask");
    };

    let mask = {
        let mut controller = state.controller.lock().await;
        let actions = controller.thermostat.inputs_changed(inputs);
        controller.drive(&actions)
    };
    if let Some(mask) = mask {
        publish_outputs(&state, mask).await;
    }

    handle_get_status(State(state)).await.into_response()
}

fn parse_mask(value: &str) -> Option<u8> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("THERMOSTAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.thermostat"));
        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            eeprom_path: Arc::new(data_dir.join("eeprom.bin")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn load_eeprom(&self, capacity: usize) -> anyhow::Result<FileEeprom> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.eeprom_path.as_ref()).await {
            Ok(raw) => {
                if raw.len() != capacity {
                    warn!(
                        "eeprom image is {} bytes, configured capacity is {capacity}",
                        raw.len()
                    );
                }
                Ok(FileEeprom::from_bytes(raw, capacity))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FileEeprom::erased(capacity)),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_eeprom(&self, image: &[u8]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.eeprom_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, image).await?;
        Ok(())
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
