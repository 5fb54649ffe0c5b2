use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MIN_SETPOINT_C: u8 = 16;
pub const MAX_SETPOINT_C: u8 = 30;

/// One indoor reading: air temperature in °C and relative humidity in %.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub temperature: f64,
    pub humidity: f64,
}

impl Sample {
    pub fn new(temperature: f64, humidity: f64) -> Result<Self> {
        let sample = Self {
            temperature,
            humidity,
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() {
            return Err(Error::invalid(format!(
                "temperature is not finite: {}",
                self.temperature
            )));
        }
        if !self.humidity.is_finite() || !(0.0..=100.0).contains(&self.humidity) {
            return Err(Error::invalid(format!(
                "humidity out of range: {}",
                self.humidity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcMode {
    #[default]
    #[serde(rename = "cool")]
    Cool,
    #[serde(rename = "heat")]
    Heat,
    #[serde(rename = "dry")]
    Dry,
    #[serde(rename = "wind")]
    Wind,
    #[serde(rename = "aIComfort")]
    AiComfort,
}

impl AcMode {
    pub const ALL: [AcMode; 5] = [
        AcMode::Cool,
        AcMode::Heat,
        AcMode::Dry,
        AcMode::Wind,
        AcMode::AiComfort,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            AcMode::Cool => "cool",
            AcMode::Heat => "heat",
            AcMode::Dry => "dry",
            AcMode::Wind => "wind",
            AcMode::AiComfort => "aIComfort",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "cool" => Some(AcMode::Cool),
            "heat" => Some(AcMode::Heat),
            "dry" => Some(AcMode::Dry),
            "wind" => Some(AcMode::Wind),
            "aIComfort" | "aiComfort" => Some(AcMode::AiComfort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum FanSpeed {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "1")]
    Low,
    #[serde(rename = "2")]
    MediumLow,
    #[serde(rename = "3")]
    Medium,
    #[serde(rename = "4")]
    High,
    #[serde(rename = "max")]
    Max,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 6] = [
        FanSpeed::Auto,
        FanSpeed::Low,
        FanSpeed::MediumLow,
        FanSpeed::Medium,
        FanSpeed::High,
        FanSpeed::Max,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "auto",
            FanSpeed::Low => "1",
            FanSpeed::MediumLow => "2",
            FanSpeed::Medium => "3",
            FanSpeed::High => "4",
            FanSpeed::Max => "max",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(FanSpeed::Auto),
            "1" => Some(FanSpeed::Low),
            "2" => Some(FanSpeed::MediumLow),
            "3" => Some(FanSpeed::Medium),
            "4" => Some(FanSpeed::High),
            "max" => Some(FanSpeed::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptionalMode {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "sleep")]
    Sleep,
    #[serde(rename = "quiet")]
    Quiet,
    #[serde(rename = "smart")]
    Smart,
    #[serde(rename = "windFree")]
    WindFree,
    #[serde(rename = "windFreeSleep")]
    WindFreeSleep,
}

impl OptionalMode {
    pub const ALL: [OptionalMode; 6] = [
        OptionalMode::Off,
        OptionalMode::Sleep,
        OptionalMode::Quiet,
        OptionalMode::Smart,
        OptionalMode::WindFree,
        OptionalMode::WindFreeSleep,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            OptionalMode::Off => "off",
            OptionalMode::Sleep => "sleep",
            OptionalMode::Quiet => "quiet",
            OptionalMode::Smart => "smart",
            OptionalMode::WindFree => "windFree",
            OptionalMode::WindFreeSleep => "windFreeSleep",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(OptionalMode::Off),
            "sleep" => Some(OptionalMode::Sleep),
            "quiet" => Some(OptionalMode::Quiet),
            "smart" => Some(OptionalMode::Smart),
            "windFree" => Some(OptionalMode::WindFree),
            "windFreeSleep" => Some(OptionalMode::WindFreeSleep),
            _ => None,
        }
    }
}

/// Operating state of one air-conditioner unit, either as reported by the
/// device or as commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcState {
    pub power: bool,
    /// Degrees Celsius, 16..=30.
    pub setpoint: u8,
    pub mode: AcMode,
    pub fan_mode: FanSpeed,
    pub optional_mode: OptionalMode,
}

impl AcState {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SETPOINT_C..=MAX_SETPOINT_C).contains(&self.setpoint) {
            return Err(Error::invalid(format!(
                "setpoint {} not in {MIN_SETPOINT_C}..={MAX_SETPOINT_C}",
                self.setpoint
            )));
        }
        Ok(())
    }
}

impl Default for AcState {
    fn default() -> Self {
        Self {
            power: false,
            setpoint: 24,
            mode: AcMode::default(),
            fan_mode: FanSpeed::default(),
            optional_mode: OptionalMode::default(),
        }
    }
}

impl fmt::Display for AcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}\u{00b0}C | mode {} | fan {} | optional {}",
            if self.power { "on" } else { "off" },
            self.setpoint,
            self.mode.as_wire_str(),
            self.fan_mode.as_wire_str(),
            self.optional_mode.as_wire_str(),
        )
    }
}

/// Target state plus how long the automatic session holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoControlCommand {
    pub state: AcState,
    pub duration_secs: u32,
}

/// Output of a decision: a command, or nothing to do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Command(AutoControlCommand),
    Skip,
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip)
    }

    pub fn command(&self) -> Option<&AutoControlCommand> {
        match self {
            Decision::Command(cmd) => Some(cmd),
            Decision::Skip => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Deciding,
    Active,
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Deciding => "deciding",
            Phase::Active => "active",
            Phase::Stopping => "stopping",
        })
    }
}

/// Point-in-time view of the controller's session.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoControlSession {
    pub phase: Phase,
    pub active: bool,
    pub remaining_secs: u32,
    pub commanded_state: Option<AcState>,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Notifications emitted by the controller; what a dashboard shows as toasts.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Triggered { discomfort_index: f64, generation: u64 },
    Skipped { discomfort_index: f64 },
    DecisionFailed { reason: String },
    CommandApplied { session_id: Uuid, command: AutoControlCommand },
    ApplyFailed { reason: String },
    Stopped { session_id: Option<Uuid> },
    Expired { session_id: Option<Uuid>, restored: bool },
    ManualRejected { reason: RejectReason },
}

/// Result of feeding one sample to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    BelowThreshold { discomfort_index: f64 },
    /// A session is already deciding, running or unwinding.
    Ignored,
    Skipped { discomfort_index: f64 },
    DecisionFailed { reason: String },
    ApplyFailed { reason: String },
    Activated { session_id: Uuid, command: AutoControlCommand },
    /// The session was stopped while the decision or apply call was in flight.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AutoControlActive,
    ManualCommandInFlight,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::AutoControlActive => "auto-control active",
            RejectReason::ManualCommandInFlight => "manual command in flight",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualOutcome {
    Applied,
    Rejected(RejectReason),
}
