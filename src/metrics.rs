use serde::{Deserialize, Serialize};

use crate::types::Sample;
use crate::{Error, Result};

/// Standard atmospheric pressure, hPa.
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;
/// Reference comfort point for the cooling load index.
pub const BASELINE_TEMPERATURE_C: f64 = 24.0;
pub const BASELINE_HUMIDITY: f64 = 50.0;
/// Assumed room air-exchange rate, kg/s.
pub const DEFAULT_MASS_FLOW_KG_PER_S: f64 = 0.05;

pub const DEFAULT_MET: f64 = 1.1;
pub const DEFAULT_CLO: f64 = 0.5;
pub const DEFAULT_AIR_SPEED: f64 = 0.1;

const PMV_MAX_ITERATIONS: u32 = 150;
const PMV_TOLERANCE: f64 = 0.00015;

/// `DI = 0.81·T + 0.01·RH·(0.99·T − 14.3) + 46.3`
pub fn discomfort_index(temperature: f64, humidity: f64) -> f64 {
    0.81 * temperature + 0.01 * humidity * (0.99 * temperature - 14.3) + 46.3
}

/// NOAA heat index regression, never reported below the air temperature.
pub fn heat_index(temperature: f64, humidity: f64) -> f64 {
    let t = temperature;
    let r = humidity;
    let raw = -8.784695 + 1.61139411 * t + 2.338549 * r
        - 0.14611605 * t * r
        - 0.012308094 * t * t
        - 0.016424828 * r * r
        + 0.002211732 * t * t * r
        + 0.00072546 * t * r * r
        - 0.000003582 * t * t * r * r;
    if raw < t { t } else { raw }
}

/// Humid-air enthalpy in kJ per kg of dry air. Humidity is clamped to 0..=100.
pub fn enthalpy(temperature: f64, humidity: f64) -> f64 {
    let rh = humidity.clamp(0.0, 100.0);
    let p_v = (rh / 100.0) * 6.1078 * 10f64.powf(7.5 * temperature / (temperature + 237.3));
    let w = 0.622 * p_v / (STANDARD_PRESSURE_HPA - p_v);
    1.006 * temperature + w * (2501.0 + 1.86 * temperature)
}

/// Enthalpy excess over the 24 °C / 50 % baseline, kJ/kg. Never negative.
pub fn cooling_load_index(temperature: f64, humidity: f64) -> f64 {
    let indoor = enthalpy(temperature, humidity);
    let baseline = enthalpy(BASELINE_TEMPERATURE_C, BASELINE_HUMIDITY);
    (indoor - baseline).max(0.0)
}

/// Estimated cooling power in kW for a given load index and air mass flow.
pub fn cooling_power(cli: f64, mass_flow_kg_per_s: f64) -> f64 {
    cli * mass_flow_kg_per_s
}

/// ISO 7730 relation between PMV and PPD.
pub fn ppd_from_pmv(pmv: f64) -> f64 {
    100.0 - 95.0 * (-0.03353 * pmv.powi(4) - 0.2179 * pmv.powi(2)).exp()
}

/// Arithmetic comfort indices of one sample. These cannot fail once the
/// sample itself is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComfortMetrics {
    pub di: f64,
    pub hi: f64,
    pub enthalpy: f64,
    pub cli: f64,
    pub cooling_power_kw: f64,
}

impl ComfortMetrics {
    pub fn from_sample(sample: &Sample) -> Result<Self> {
        Self::with_mass_flow(sample, DEFAULT_MASS_FLOW_KG_PER_S)
    }

    pub fn with_mass_flow(sample: &Sample, mass_flow_kg_per_s: f64) -> Result<Self> {
        sample.validate()?;
        let Sample {
            temperature,
            humidity,
        } = *sample;
        let cli = cooling_load_index(temperature, humidity);
        Ok(Self {
            di: discomfort_index(temperature, humidity),
            hi: heat_index(temperature, humidity),
            enthalpy: enthalpy(temperature, humidity),
            cli,
            cooling_power_kw: cooling_power(cli, mass_flow_kg_per_s),
        })
    }
}

/// Inputs of the thermal sensation model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PmvInput {
    /// Air temperature, °C.
    pub ta: f64,
    /// Mean radiant temperature, °C.
    pub tr: f64,
    /// Relative humidity, %.
    pub rh: f64,
    /// Metabolic rate, met.
    pub met: f64,
    /// Clothing insulation, clo.
    pub clo: f64,
    /// Relative air speed, m/s.
    #[serde(default = "default_air_speed")]
    pub air_speed: f64,
}

fn default_air_speed() -> f64 {
    DEFAULT_AIR_SPEED
}

impl PmvInput {
    /// Seated classroom occupancy with radiant temperature approximated by air
    /// temperature.
    pub fn classroom(ta: f64, rh: f64) -> Self {
        Self {
            ta,
            tr: ta,
            rh,
            met: DEFAULT_MET,
            clo: DEFAULT_CLO,
            air_speed: DEFAULT_AIR_SPEED,
        }
    }

    pub fn from_sample(sample: &Sample) -> Self {
        Self::classroom(sample.temperature, sample.humidity)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.ta, self.tr, self.rh, self.met, self.clo, self.air_speed]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(Error::invalid("PMV inputs must be finite"));
        }
        if !(0.0..=100.0).contains(&self.rh) {
            return Err(Error::invalid(format!("humidity out of range: {}", self.rh)));
        }
        if self.met <= 0.0 || self.clo < 0.0 || self.air_speed < 0.0 {
            return Err(Error::invalid(format!(
                "met must be positive and clo/air speed non-negative (met={}, clo={}, v={})",
                self.met, self.clo, self.air_speed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PmvPpd {
    pub pmv: f64,
    pub ppd: f64,
}

/// ISO 7730 PMV/PPD. The clothing surface temperature is solved iteratively;
/// failure to converge is an evaluation error. PMV is clamped to [-3, 3].
pub fn pmv_ppd(input: &PmvInput) -> Result<PmvPpd> {
    input.validate()?;
    let PmvInput {
        ta,
        tr,
        rh,
        met,
        clo,
        air_speed,
    } = *input;

    // water vapour partial pressure, Pa
    let pa = rh * 10.0 * (16.6536 - 4030.183 / (ta + 235.0)).exp();
    let icl = 0.155 * clo;
    let m = met * 58.15;
    let mw = m;
    let fcl = if icl <= 0.078 {
        1.0 + 1.29 * icl
    } else {
        1.05 + 0.645 * icl
    };
    let hcf = 12.1 * air_speed.sqrt();
    let taa = ta + 273.0;
    let tra = tr + 273.0;
    let tcla = taa + (35.5 - ta) / (3.5 * icl + 0.1);

    let p1 = icl * fcl;
    let p2 = p1 * 3.96;
    let p3 = p1 * 100.0;
    let p4 = p1 * taa;
    let p5 = 308.7 - 0.028 * mw + p2 * (tra / 100.0).powi(4);

    let mut xn = tcla / 100.0;
    let mut xf = tcla / 50.0;
    let mut hc = hcf;
    let mut iterations = 0;
    while (xn - xf).abs() > PMV_TOLERANCE {
        xf = (xf + xn) / 2.0;
        let hcn = 2.38 * (100.0 * xf - taa).abs().powf(0.25);
        hc = hcf.max(hcn);
        xn = (p5 + p4 * hc - p2 * xf.powi(4)) / (100.0 + p3 * hc);
        iterations += 1;
        if iterations > PMV_MAX_ITERATIONS || !xn.is_finite() {
            return Err(Error::Evaluation(format!(
                "clothing temperature did not converge after {iterations} iterations"
            )));
        }
    }
    let tcl = 100.0 * xn - 273.0;

    let hl1 = 3.05 * 0.001 * (5733.0 - 6.99 * mw - pa);
    let hl2 = if mw > 58.15 { 0.42 * (mw - 58.15) } else { 0.0 };
    let hl3 = 1.7 * 0.00001 * m * (5867.0 - pa);
    let hl4 = 0.0014 * m * (34.0 - ta);
    let hl5 = 3.96 * fcl * (xn.powi(4) - (tra / 100.0).powi(4));
    let hl6 = fcl * hc * (tcl - ta);

    let ts = 0.303 * (-0.036 * m).exp() + 0.028;
    let pmv = (ts * (mw - hl1 - hl2 - hl3 - hl4 - hl5 - hl6)).clamp(-3.0, 3.0);
    Ok(PmvPpd {
        pmv,
        ppd: ppd_from_pmv(pmv),
    })
}
