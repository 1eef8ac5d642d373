//! JSON wire format of the cloud channel.
//!
//! Outbound frames look like
//! `{"command": "CMD_APO_STOP", "requestId": "...", "payload": {"id": "<cooker>", "type": "CMD_APO_STOP", "payload": {...}}}`.
//! Inbound frames carry a `command` tag (`EVENT_APO_WIFI_LIST`,
//! `EVENT_APO_STATE`, `RESPONSE`, ...) and a `payload`.

use serde::Deserialize;
use serde_json::{Value, json};

use ovenctl_app::ports::{CommandEnvelope, DeviceEvent, DeviceReport, OvenCommand};
use ovenctl_domain::device::{Device, DeviceState, OvenVersion};
use ovenctl_domain::id::{DeviceId, RequestId};
use ovenctl_domain::stage::{CookStage, TemperatureMode};
use ovenctl_domain::steam::SteamMode;
use ovenctl_domain::time::parse_rfc3339;
use ovenctl_domain::timer::TimerStartType;

use crate::error::WebSocketError;

/// Accessory tag of every device in the wifi list.
const OVEN_ACCESSORY: &str = "APO";

// ── Outbound ─────────────────────────────────────────────────────────

fn command_name(command: &OvenCommand) -> &'static str {
    match command {
        OvenCommand::StartStage { .. } => "CMD_APO_START_STAGE",
        OvenCommand::StartTimer { .. } => "CMD_APO_START_TIMER",
        OvenCommand::Stop { .. } => "CMD_APO_STOP",
        OvenCommand::SetProbe { .. } => "CMD_APO_SET_PROBE",
    }
}

/// Serialise `envelope` into one text frame.
///
/// # Errors
///
/// Returns [`WebSocketError::Encode`] when serialisation fails.
pub(crate) fn encode(envelope: &CommandEnvelope) -> Result<String, WebSocketError> {
    let name = command_name(&envelope.command);
    let body = match &envelope.command {
        OvenCommand::StartStage {
            cook_id,
            stage_index,
            stage_count,
            stage,
        } => json!({
            "cookId": cook_id,
            "stageIndex": stage_index,
            "stageCount": stage_count,
            "stage": stage_body(stage),
        }),
        OvenCommand::StartTimer {
            cook_id,
            stage_index,
            timer,
        } => json!({
            "cookId": cook_id,
            "stageIndex": stage_index,
            "timer": { "initial": timer.initial() },
        }),
        OvenCommand::Stop { cook_id } => json!({ "cookId": cook_id }),
        OvenCommand::SetProbe { target } => {
            let temperature = target.temperature();
            json!({
                "setpoint": {
                    "celsius": temperature.celsius(),
                    "fahrenheit": temperature.fahrenheit(),
                }
            })
        }
    };
    let frame = json!({
        "command": name,
        "requestId": envelope.request_id,
        "payload": {
            "id": envelope.device_id,
            "type": name,
            "payload": body,
        },
    });
    serde_json::to_string(&frame).map_err(WebSocketError::Encode)
}

fn stage_body(stage: &CookStage) -> Value {
    let temperature = stage.temperature();
    let bulb = match stage.mode() {
        TemperatureMode::Dry => "dry",
        TemperatureMode::Wet => "wet",
    };
    let elements = stage.heating_elements();
    let mut body = json!({
        "title": stage.title(),
        "description": stage.description().unwrap_or_default(),
        "temperatureBulbs": {
            "mode": bulb,
            bulb: {
                "setpoint": {
                    "celsius": temperature.celsius(),
                    "fahrenheit": temperature.fahrenheit(),
                }
            }
        },
        "heatingElements": {
            "top": { "on": elements.top() },
            "bottom": { "on": elements.bottom() },
            "rear": { "on": elements.rear() },
        },
        "fan": { "speed": stage.fan_speed() },
        "vent": { "open": stage.vent_open() },
        "rackPosition": stage.rack_position(),
    });
    if let Some(steam) = stage.steam() {
        body["steamGenerators"] = match steam.mode() {
            SteamMode::RelativeHumidity => json!({
                "mode": "relative-humidity",
                "relativeHumidity": { "setpoint": steam.magnitude() },
            }),
            SteamMode::SteamPercentage => json!({
                "mode": "steam-percentage",
                "steamPercentage": { "setpoint": steam.magnitude() },
            }),
        };
    }
    if let Some(timer) = stage.timer() {
        let start = match timer.start_type() {
            TimerStartType::Immediately => "immediately",
            TimerStartType::WhenPreheated => "when-preheated",
        };
        body["timer"] = json!({ "initial": timer.initial(), "startType": start });
    }
    body
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decoded {
    Devices(Vec<Device>),
    Device {
        device_id: DeviceId,
        event: DeviceEvent,
    },
    /// Answer to a request; the channel maps it back to its device.
    Response {
        request_id: RequestId,
        rejection: Option<String>,
    },
    /// A frame this client does not act on.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    command: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WifiListEntry {
    cooker_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    paired_at: Option<String>,
    #[serde(default, rename = "type")]
    oven_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload {
    cooker_id: String,
    state: WireState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireState {
    mode: String,
    #[serde(default)]
    current_celsius: Option<f64>,
    #[serde(default)]
    target_reached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagePayload {
    cooker_id: String,
    stage_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaultPayload {
    cooker_id: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CookerPayload {
    cooker_id: String,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Parse one text frame.
///
/// # Errors
///
/// Returns the serde error when the frame or a known payload is malformed.
pub(crate) fn decode(text: &str) -> Result<Decoded, serde_json::Error> {
    let frame: Frame = serde_json::from_str(text)?;
    let decoded = match frame.command.as_str() {
        "EVENT_APO_WIFI_LIST" => {
            let entries: Vec<WifiListEntry> = serde_json::from_value(frame.payload)?;
            Decoded::Devices(entries.into_iter().filter_map(to_device).collect())
        }
        "EVENT_APO_STATE" => {
            let payload: StatePayload = serde_json::from_value(frame.payload)?;
            Decoded::Device {
                device_id: DeviceId::new(payload.cooker_id),
                event: DeviceEvent::StateUpdate(DeviceReport {
                    state: device_state(&payload.state.mode),
                    current_celsius: payload.state.current_celsius,
                    target_reached: payload.state.target_reached,
                }),
            }
        }
        "EVENT_APO_STAGE_COMPLETE" => {
            let payload: StagePayload = serde_json::from_value(frame.payload)?;
            Decoded::Device {
                device_id: DeviceId::new(payload.cooker_id),
                event: DeviceEvent::StageComplete {
                    stage_index: payload.stage_index,
                },
            }
        }
        "EVENT_APO_FAULT" => {
            let payload: FaultPayload = serde_json::from_value(frame.payload)?;
            Decoded::Device {
                device_id: DeviceId::new(payload.cooker_id),
                event: DeviceEvent::Fault {
                    message: payload.message.unwrap_or_else(|| "unspecified fault".to_string()),
                },
            }
        }
        "EVENT_APO_DISCONNECTED" => {
            let payload: CookerPayload = serde_json::from_value(frame.payload)?;
            Decoded::Device {
                device_id: DeviceId::new(payload.cooker_id),
                event: DeviceEvent::Disconnected,
            }
        }
        "RESPONSE" => {
            let Some(request_id) = frame
                .request_id
                .as_deref()
                .and_then(|id| id.parse::<RequestId>().ok())
            else {
                return Ok(Decoded::Ignored(frame.command));
            };
            let payload: ResponsePayload = serde_json::from_value(frame.payload)?;
            let rejection = (!payload.status.eq_ignore_ascii_case("ok")).then(|| {
                payload
                    .message
                    .unwrap_or_else(|| format!("status {}", payload.status))
            });
            Decoded::Response {
                request_id,
                rejection,
            }
        }
        _ => Decoded::Ignored(frame.command),
    };
    Ok(decoded)
}

fn to_device(entry: WifiListEntry) -> Option<Device> {
    let mut builder = Device::builder()
        .id(entry.cooker_id)
        .device_type(OVEN_ACCESSORY)
        .state(DeviceState::Unknown);
    if let Some(name) = entry.name {
        builder = builder.name(name);
    }
    if let Some(version) = entry
        .oven_type
        .as_deref()
        .and_then(|kind| kind.parse::<OvenVersion>().ok())
    {
        builder = builder.oven_version(version);
    }
    if let Some(paired_at) = entry.paired_at.as_deref().and_then(parse_rfc3339) {
        builder = builder.paired_at(paired_at);
    }
    builder.build().ok()
}

fn device_state(mode: &str) -> DeviceState {
    match mode.to_ascii_lowercase().as_str() {
        "idle" => DeviceState::Idle,
        "preheat" | "preheating" => DeviceState::Preheating,
        "cook" | "cooking" => DeviceState::Cooking,
        "error" | "fault" => DeviceState::Error,
        _ => DeviceState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovenctl_domain::heating::HeatingElements;
    use ovenctl_domain::id::CookId;
    use ovenctl_domain::steam::SteamSettings;
    use ovenctl_domain::temperature::{ProbeTarget, Temperature, TemperatureUnit};
    use ovenctl_domain::timer::Timer;

    fn envelope(command: OvenCommand) -> CommandEnvelope {
        CommandEnvelope {
            request_id: RequestId::new(),
            device_id: DeviceId::new("cooker-1"),
            command,
        }
    }

    fn encoded(command: OvenCommand) -> Value {
        serde_json::from_str(&encode(&envelope(command)).unwrap()).unwrap()
    }

    #[test]
    fn should_wrap_command_in_device_envelope() {
        let frame = encoded(OvenCommand::Stop { cook_id: None });
        assert_eq!(frame["command"], "CMD_APO_STOP");
        assert_eq!(frame["payload"]["id"], "cooker-1");
        assert_eq!(frame["payload"]["type"], "CMD_APO_STOP");
        assert!(frame["requestId"].is_string());
    }

    #[test]
    fn should_encode_stage_settings() {
        let stage = CookStage::builder(Temperature::from_celsius(100.0).unwrap())
            .mode(TemperatureMode::Wet)
            .heating_elements(HeatingElements::new(false, true, true).unwrap())
            .steam(SteamSettings::relative_humidity(90).unwrap())
            .timer(Timer::when_preheated(900).unwrap())
            .title("Steam")
            .build()
            .unwrap();
        let frame = encoded(OvenCommand::StartStage {
            cook_id: CookId::new(),
            stage_index: 1,
            stage_count: 3,
            stage,
        });

        let body = &frame["payload"]["payload"];
        assert_eq!(frame["command"], "CMD_APO_START_STAGE");
        assert_eq!(body["stageIndex"], 1);
        assert_eq!(body["stageCount"], 3);
        let stage = &body["stage"];
        assert_eq!(stage["title"], "Steam");
        assert_eq!(stage["temperatureBulbs"]["mode"], "wet");
        assert_eq!(stage["temperatureBulbs"]["wet"]["setpoint"]["fahrenheit"], 212.0);
        assert_eq!(stage["heatingElements"]["top"]["on"], false);
        assert_eq!(stage["heatingElements"]["rear"]["on"], true);
        assert_eq!(stage["steamGenerators"]["mode"], "relative-humidity");
        assert_eq!(stage["steamGenerators"]["relativeHumidity"]["setpoint"], 90);
        assert_eq!(stage["timer"]["startType"], "when-preheated");
        assert_eq!(stage["timer"]["initial"], 900);
    }

    #[test]
    fn should_omit_steam_and_timer_when_absent() {
        let stage = CookStage::builder(Temperature::from_celsius(180.0).unwrap())
            .build()
            .unwrap();
        let frame = encoded(OvenCommand::StartStage {
            cook_id: CookId::new(),
            stage_index: 0,
            stage_count: 1,
            stage,
        });
        let stage = &frame["payload"]["payload"]["stage"];
        assert!(stage.get("steamGenerators").is_none());
        assert!(stage.get("timer").is_none());
    }

    #[test]
    fn should_encode_probe_setpoint_in_both_units() {
        let target = ProbeTarget::new(60.0, TemperatureUnit::Celsius).unwrap();
        let frame = encoded(OvenCommand::SetProbe { target });
        assert_eq!(frame["payload"]["payload"]["setpoint"]["celsius"], 60.0);
        assert_eq!(frame["payload"]["payload"]["setpoint"]["fahrenheit"], 140.0);
    }

    #[test]
    fn should_decode_wifi_list() {
        let text = r#"{
            "command": "EVENT_APO_WIFI_LIST",
            "payload": [
                {"cookerId": "abc", "name": "Kitchen", "pairedAt": "2024-01-01T00:00:00Z", "type": "oven_v2"},
                {"cookerId": "def", "type": "oven_v9"}
            ]
        }"#;
        let Decoded::Devices(devices) = decode(text).unwrap() else {
            panic!("expected devices");
        };
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Kitchen");
        assert_eq!(devices[0].oven_version, Some(OvenVersion::V2));
        assert!(devices[0].paired_at.is_some());
        assert_eq!(devices[0].device_type, "APO");
        assert_eq!(devices[1].name, "def");
        assert_eq!(devices[1].oven_version, None);
    }

    #[test]
    fn should_skip_wifi_list_entries_without_id() {
        let text = r#"{"command": "EVENT_APO_WIFI_LIST", "payload": [{"cookerId": ""}]}"#;
        assert_eq!(decode(text).unwrap(), Decoded::Devices(Vec::new()));
    }

    #[test]
    fn should_decode_state_update() {
        let text = r#"{
            "command": "EVENT_APO_STATE",
            "payload": {"cookerId": "abc", "state": {"mode": "preheat", "currentCelsius": 150.5, "targetReached": false}}
        }"#;
        assert_eq!(
            decode(text).unwrap(),
            Decoded::Device {
                device_id: DeviceId::new("abc"),
                event: DeviceEvent::StateUpdate(DeviceReport {
                    state: DeviceState::Preheating,
                    current_celsius: Some(150.5),
                    target_reached: false,
                }),
            }
        );
    }

    #[test]
    fn should_decode_stage_complete_and_fault() {
        let complete = r#"{"command": "EVENT_APO_STAGE_COMPLETE", "payload": {"cookerId": "abc", "stageIndex": 2}}"#;
        assert!(matches!(
            decode(complete).unwrap(),
            Decoded::Device {
                event: DeviceEvent::StageComplete { stage_index: 2 },
                ..
            }
        ));

        let fault = r#"{"command": "EVENT_APO_FAULT", "payload": {"cookerId": "abc"}}"#;
        assert!(matches!(
            decode(fault).unwrap(),
            Decoded::Device {
                event: DeviceEvent::Fault { ref message },
                ..
            } if message == "unspecified fault"
        ));
    }

    #[test]
    fn should_decode_ok_and_error_responses() {
        let request_id = RequestId::new();
        let ok = format!(r#"{{"command": "RESPONSE", "requestId": "{request_id}", "payload": {{"status": "ok"}}}}"#);
        assert_eq!(
            decode(&ok).unwrap(),
            Decoded::Response {
                request_id,
                rejection: None
            }
        );

        let error = format!(
            r#"{{"command": "RESPONSE", "requestId": "{request_id}", "payload": {{"status": "error", "message": "door open"}}}}"#
        );
        assert_eq!(
            decode(&error).unwrap(),
            Decoded::Response {
                request_id,
                rejection: Some("door open".to_string())
            }
        );
    }

    #[test]
    fn should_ignore_unknown_commands() {
        let text = r#"{"command": "EVENT_USER_STATE", "payload": {}}"#;
        assert_eq!(
            decode(text).unwrap(),
            Decoded::Ignored("EVENT_USER_STATE".to_string())
        );
    }

    #[test]
    fn should_fail_on_malformed_state_payload() {
        let text = r#"{"command": "EVENT_APO_STATE", "payload": {"state": {}}}"#;
        assert!(decode(text).is_err());
    }
}
