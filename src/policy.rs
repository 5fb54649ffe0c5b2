use std::future::Future;

use tracing::{debug, trace};

use crate::interpret::DI_TRIGGER;
use crate::metrics::discomfort_index;
use crate::protocol::{decision_request, parse_decision_response};
use crate::types::*;
use crate::{Error, Result};

/// Decides the next auto-control command for the current conditions. Never
/// talks to the device.
pub trait DecisionService {
    fn decide(
        &self,
        sample: &Sample,
        state_now: Option<&AcState>,
    ) -> impl Future<Output = Result<Decision>> + Send;
}

/// In-process heuristic: lower the setpoint by as much as the DI excess
/// needs, and dehumidify for whatever cooling alone cannot remove.
#[derive(Debug, Clone)]
pub struct ComfortPolicy {
    trigger: f64,
    target_di: f64,
    min_setpoint: u8,
    dry_rate_per_hour: f64,
    cool_duration_secs: u32,
}

impl Default for ComfortPolicy {
    fn default() -> Self {
        Self {
            trigger: DI_TRIGGER,
            target_di: 67.0,
            min_setpoint: 22,
            dry_rate_per_hour: 5.0,
            cool_duration_secs: 900,
        }
    }
}

const RESIDUAL_EPSILON: f64 = 1e-9;

/// DI drop per degree Celsius of cooling.
fn di_per_degree(humidity: f64) -> f64 {
    0.81 + 0.0099 * humidity
}

/// DI drop per %RH of dehumidification.
fn di_per_percent_rh(temperature: f64) -> f64 {
    (0.01 * (0.99 * temperature - 14.3)).max(1e-6)
}

impl ComfortPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(mut self, trigger: f64) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_target_di(mut self, target: f64) -> Self {
        self.target_di = target;
        self
    }

    pub fn with_min_setpoint(mut self, setpoint: u8) -> Self {
        self.min_setpoint = setpoint.clamp(MIN_SETPOINT_C, MAX_SETPOINT_C);
        self
    }

    pub fn with_dry_rate(mut self, percent_rh_per_hour: f64) -> Self {
        self.dry_rate_per_hour = percent_rh_per_hour;
        self
    }

    pub fn with_cool_duration(mut self, secs: u32) -> Self {
        self.cool_duration_secs = secs.max(1);
        self
    }

    pub fn evaluate(&self, sample: &Sample, state_now: Option<&AcState>) -> Result<Decision> {
        sample.validate()?;
        let Sample {
            temperature: t,
            humidity: rh,
        } = *sample;

        let di = discomfort_index(t, rh);
        if di < self.trigger {
            trace!(di, trigger = self.trigger, "below trigger, skipping");
            return Ok(Decision::Skip);
        }

        let current_setpoint = state_now
            .map(|s| s.setpoint as f64)
            .unwrap_or_else(|| t.round());
        let min_setpoint = self.min_setpoint as f64;

        let excess = (di - self.target_di).max(0.0);
        let slope = di_per_degree(rh);
        let drop = (excess / slope).min((t - min_setpoint).max(0.0));
        let setpoint = (current_setpoint - drop)
            .max(min_setpoint)
            .round()
            .clamp(MIN_SETPOINT_C as f64, MAX_SETPOINT_C as f64) as u8;

        let residual = excess - drop * slope;
        let (mode, duration_secs) = if residual <= RESIDUAL_EPSILON {
            (AcMode::Cool, self.cool_duration_secs)
        } else {
            let rh_needed = residual / di_per_percent_rh(t);
            let hours = (rh_needed / self.dry_rate_per_hour).ceil().max(1.0);
            (AcMode::Dry, (hours * 3600.0) as u32)
        };

        let fan_mode = if drop >= 3.0 {
            FanSpeed::Max
        } else if drop >= 2.0 {
            FanSpeed::High
        } else if drop >= 1.0 {
            FanSpeed::Medium
        } else {
            FanSpeed::Auto
        };

        let command = AutoControlCommand {
            state: AcState {
                power: true,
                setpoint,
                mode,
                fan_mode,
                optional_mode: OptionalMode::Off,
            },
            duration_secs,
        };
        debug!(di, drop, residual, command = %command.state, duration_secs, "decided");
        Ok(Decision::Command(command))
    }
}

impl DecisionService for ComfortPolicy {
    async fn decide(&self, sample: &Sample, state_now: Option<&AcState>) -> Result<Decision> {
        self.evaluate(sample, state_now)
    }
}

/// Decision service reached over HTTP: POST `{T, RH, state_now}`, answer is a
/// command object or `"skip"`.
#[derive(Debug, Clone)]
pub struct HttpDecisionService {
    http: reqwest::Client,
    url: String,
}

impl HttpDecisionService {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

impl DecisionService for HttpDecisionService {
    async fn decide(&self, sample: &Sample, state_now: Option<&AcState>) -> Result<Decision> {
        sample.validate()?;
        let body = decision_request(sample, state_now);
        debug!(url = %self.url, "requesting auto-control decision");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Evaluation(format!("decision request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Evaluation(format!("decision response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(Error::Evaluation(format!(
                "decision service returned {}: {text}",
                status.as_u16()
            )));
        }
        parse_decision_response(&text)
    }
}
