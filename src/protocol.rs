use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::metrics::{PmvInput, PmvPpd};
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_COMPONENT: &str = "main";

// keys of the aircon status stream
const STATUS_SWITCH: &str = "switch_AC_1";
const STATUS_SETPOINT: &str = "setpoint_AC_1";
const STATUS_MODE: &str = "mode_AC_1";
const STATUS_FAN_MODE: &str = "fanMode_AC_1";
const STATUS_OPTIONAL_MODE: &str = "supportedMode_AC_1";

fn capability(component: &str, capability: &str, command: &str, arguments: Value) -> Value {
    json!({
        "component": component,
        "capability": capability,
        "command": command,
        "arguments": arguments
    })
}

/// Device command batch for one target state. Heat mode writes the heating
/// setpoint, every other mode the cooling setpoint.
pub fn device_command_body(state: &AcState, component: &str) -> Value {
    let setpoint = if state.mode == AcMode::Heat {
        capability(
            component,
            "thermostatHeatingSetpoint",
            "setHeatingSetpoint",
            json!([state.setpoint]),
        )
    } else {
        capability(
            component,
            "thermostatCoolingSetpoint",
            "setCoolingSetpoint",
            json!([state.setpoint]),
        )
    };

    json!({
        "commands": [
            capability(
                component,
                "switch",
                if state.power { "on" } else { "off" },
                json!([]),
            ),
            setpoint,
            capability(
                component,
                "airConditionerMode",
                "setAirConditionerMode",
                json!([state.mode.as_wire_str()]),
            ),
            capability(
                component,
                "airConditionerFanMode",
                "setAirConditionerFanMode",
                json!([state.fan_mode.as_wire_str()]),
            ),
            capability(
                component,
                "supportedAcOptionalMode",
                "setSupportedAcOptionalMode",
                json!([state.optional_mode.as_wire_str()]),
            ),
        ]
    })
}

/// Flat command body as shown to users and written to the session log.
pub fn command_summary(command: &AutoControlCommand) -> Value {
    json!({
        "switch": if command.state.power { 1 } else { 0 },
        "setpoint": command.state.setpoint,
        "mode": command.state.mode.as_wire_str(),
        "fanMode": command.state.fan_mode.as_wire_str(),
        "optionalMode": command.state.optional_mode.as_wire_str(),
        "duration": command.duration_secs
    })
}

pub fn decision_request(sample: &Sample, state_now: Option<&AcState>) -> Value {
    json!({
        "T": sample.temperature,
        "RH": sample.humidity,
        "state_now": state_now
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandWire {
    switch: u8,
    setpoint: f64,
    mode: String,
    fan_mode: String,
    #[serde(default)]
    optional_mode: Option<String>,
    duration: u32,
}

/// Parses a decision response: the string `"skip"` (or `null`), or a command
/// object. Anything else is an evaluation error.
pub fn parse_decision_response(body: &str) -> Result<Decision> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Evaluation(format!("malformed decision response: {e}")))?;

    match &value {
        Value::Null => return Ok(Decision::Skip),
        Value::String(s) if s == "skip" => return Ok(Decision::Skip),
        Value::String(s) => {
            return Err(Error::Evaluation(format!("unexpected decision: {s}")));
        }
        _ => {}
    }

    let wire: CommandWire = serde_json::from_value(value)
        .map_err(|e| Error::Evaluation(format!("malformed command: {e}")))?;

    let mode = AcMode::from_wire_str(&wire.mode)
        .ok_or_else(|| Error::Evaluation(format!("unsupported mode: {}", wire.mode)))?;
    let fan_mode = FanSpeed::from_wire_str(&wire.fan_mode)
        .ok_or_else(|| Error::Evaluation(format!("unsupported fan mode: {}", wire.fan_mode)))?;
    let optional_mode = match wire.optional_mode.as_deref() {
        None => OptionalMode::Off,
        Some(s) => OptionalMode::from_wire_str(s)
            .ok_or_else(|| Error::Evaluation(format!("unsupported optional mode: {s}")))?,
    };

    let setpoint = wire.setpoint.round();
    if !(MIN_SETPOINT_C as f64..=MAX_SETPOINT_C as f64).contains(&setpoint) {
        return Err(Error::Evaluation(format!(
            "setpoint out of range: {}",
            wire.setpoint
        )));
    }
    if wire.duration == 0 {
        return Err(Error::Evaluation("command duration must be positive".into()));
    }

    Ok(Decision::Command(AutoControlCommand {
        state: AcState {
            power: wire.switch == 1,
            setpoint: setpoint as u8,
            mode,
            fan_mode,
            optional_mode,
        },
        duration_secs: wire.duration,
    }))
}

pub fn pmv_request(input: &PmvInput) -> Value {
    json!({
        "ta": input.ta,
        "tr": input.tr,
        "rh": input.rh,
        "met": input.met,
        "clo": input.clo
    })
}

pub fn parse_pmv_response(body: &str) -> Result<PmvPpd> {
    let result: PmvPpd = serde_json::from_str(body)
        .map_err(|e| Error::Evaluation(format!("malformed PMV response: {e}")))?;
    if !result.pmv.is_finite() || !result.ppd.is_finite() {
        return Err(Error::Evaluation("PMV response is not finite".into()));
    }
    Ok(result)
}

/// Reads the latest aircon status record. A record without a switch value is
/// treated as "no data"; unknown enum strings fall back to defaults.
pub fn parse_aircon_status(data: &Value) -> Option<AcState> {
    let power = match data.get(STATUS_SWITCH)? {
        Value::Number(n) => n.as_i64()? == 1,
        Value::String(s) => s == "on" || s == "1",
        Value::Bool(b) => *b,
        _ => return None,
    };

    let defaults = AcState::default();
    let setpoint = data
        .get(STATUS_SETPOINT)
        .and_then(|v| v.as_f64())
        .map(|sp| sp.round().clamp(MIN_SETPOINT_C as f64, MAX_SETPOINT_C as f64) as u8)
        .unwrap_or(defaults.setpoint);

    let mode_str = data.get(STATUS_MODE).and_then(|v| v.as_str());
    let mode = mode_str.and_then(AcMode::from_wire_str).unwrap_or_else(|| {
        debug!(mode = ?mode_str, "unrecognised aircon mode, using default");
        defaults.mode
    });
    let fan_mode = data
        .get(STATUS_FAN_MODE)
        .and_then(|v| v.as_str())
        .and_then(FanSpeed::from_wire_str)
        .unwrap_or(defaults.fan_mode);
    let optional_mode = data
        .get(STATUS_OPTIONAL_MODE)
        .and_then(|v| v.as_str())
        .and_then(OptionalMode::from_wire_str)
        .unwrap_or(defaults.optional_mode);

    Some(AcState {
        power,
        setpoint,
        mode,
        fan_mode,
        optional_mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_body_uses_heating_setpoint_in_heat_mode() {
        let state = AcState {
            power: true,
            setpoint: 21,
            mode: AcMode::Heat,
            ..Default::default()
        };
        let body = device_command_body(&state, DEFAULT_COMPONENT);
        let commands = body["commands"].as_array().unwrap();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0]["command"], "on");
        assert_eq!(commands[1]["command"], "setHeatingSetpoint");
        assert_eq!(commands[1]["arguments"][0], 21);
        assert_eq!(commands[2]["arguments"][0], "heat");
    }

    #[test]
    fn command_body_power_off_and_wire_spelling() {
        let state = AcState {
            power: false,
            setpoint: 26,
            mode: AcMode::AiComfort,
            fan_mode: FanSpeed::High,
            optional_mode: OptionalMode::WindFreeSleep,
        };
        let body = device_command_body(&state, "main");
        let commands = body["commands"].as_array().unwrap();
        assert_eq!(commands[0]["command"], "off");
        assert_eq!(commands[1]["command"], "setCoolingSetpoint");
        assert_eq!(commands[2]["arguments"][0], "aIComfort");
        assert_eq!(commands[3]["arguments"][0], "4");
        assert_eq!(commands[4]["arguments"][0], "windFreeSleep");
    }

    #[test]
    fn decision_skip_and_null() {
        assert_eq!(parse_decision_response("\"skip\"").unwrap(), Decision::Skip);
        assert_eq!(parse_decision_response("null").unwrap(), Decision::Skip);
    }

    #[test]
    fn decision_command_parsed() {
        let body = r#"{"switch":1,"setpoint":22,"mode":"dry","fanMode":"max","optionalMode":"off","duration":14400}"#;
        let decision = parse_decision_response(body).unwrap();
        let cmd = decision.command().unwrap();
        assert!(cmd.state.power);
        assert_eq!(cmd.state.setpoint, 22);
        assert_eq!(cmd.state.mode, AcMode::Dry);
        assert_eq!(cmd.state.fan_mode, FanSpeed::Max);
        assert_eq!(cmd.duration_secs, 14400);
    }

    #[test]
    fn decision_rejects_unknown_mode_and_zero_duration() {
        let bad_mode = r#"{"switch":1,"setpoint":22,"mode":"turbo","fanMode":"max","duration":60}"#;
        assert!(matches!(
            parse_decision_response(bad_mode),
            Err(Error::Evaluation(_))
        ));
        let zero = r#"{"switch":1,"setpoint":22,"mode":"cool","fanMode":"auto","duration":0}"#;
        assert!(matches!(parse_decision_response(zero), Err(Error::Evaluation(_))));
        assert!(matches!(
            parse_decision_response("{not json"),
            Err(Error::Evaluation(_))
        ));
    }

    #[test]
    fn decision_request_shape() {
        let sample = Sample {
            temperature: 30.0,
            humidity: 70.0,
        };
        let req = decision_request(&sample, Some(&AcState::default()));
        assert_eq!(req["T"], 30.0);
        assert_eq!(req["state_now"]["fanMode"], "auto");
        assert_eq!(req["state_now"]["optionalMode"], "off");
        assert_eq!(decision_request(&sample, None)["state_now"], Value::Null);
    }

    #[test]
    fn status_switch_variants() {
        let on = json!({"switch_AC_1": "on", "setpoint_AC_1": 25, "mode_AC_1": "dry"});
        let state = parse_aircon_status(&on).unwrap();
        assert!(state.power);
        assert_eq!(state.setpoint, 25);
        assert_eq!(state.mode, AcMode::Dry);

        let off = json!({"switch_AC_1": 0});
        assert!(!parse_aircon_status(&off).unwrap().power);

        assert!(parse_aircon_status(&json!({"setpoint_AC_1": 24})).is_none());
    }

    #[test]
    fn status_unknown_values_fall_back() {
        let data = json!({
            "switch_AC_1": 1,
            "setpoint_AC_1": 24,
            "mode_AC_1": "auto",
            "fanMode_AC_1": "medium",
            "supportedMode_AC_1": "auto"
        });
        let state = parse_aircon_status(&data).unwrap();
        assert_eq!(state.mode, AcMode::Cool);
        assert_eq!(state.fan_mode, FanSpeed::Auto);
        assert_eq!(state.optional_mode, OptionalMode::Off);
    }
}
