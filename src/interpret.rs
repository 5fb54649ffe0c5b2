//! Qualitative bands for each comfort index.
//!
//! Every mapping is total over the reals and uses the same fixed thresholds
//! for display and for the auto-control trigger.

use serde::{Deserialize, Serialize};

use crate::metrics::{ComfortMetrics, PmvPpd};

/// Lower bound of the "uncomfortable" DI band; automatic control starts here.
pub const DI_TRIGGER: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PpdBand {
    Comfortable,
    SlightlyDissatisfied,
    Dissatisfied,
}

impl PpdBand {
    pub fn from_ppd(ppd: f64) -> Self {
        if ppd < 10.0 {
            PpdBand::Comfortable
        } else if ppd < 25.0 {
            PpdBand::SlightlyDissatisfied
        } else {
            PpdBand::Dissatisfied
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PpdBand::Comfortable => "comfortable",
            PpdBand::SlightlyDissatisfied => "slightly dissatisfied",
            PpdBand::Dissatisfied => "dissatisfied",
        }
    }
}

/// Five-band discomfort index table (65 / 70 / 75 / 80).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiBand {
    VeryComfortable,
    Comfortable,
    Caution,
    Uncomfortable,
    VeryUncomfortable,
}

impl DiBand {
    pub fn from_di(di: f64) -> Self {
        if di < 65.0 {
            DiBand::VeryComfortable
        } else if di < 70.0 {
            DiBand::Comfortable
        } else if di < DI_TRIGGER {
            DiBand::Caution
        } else if di < 80.0 {
            DiBand::Uncomfortable
        } else {
            DiBand::VeryUncomfortable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DiBand::VeryComfortable => "very comfortable",
            DiBand::Comfortable => "comfortable",
            DiBand::Caution => "caution",
            DiBand::Uncomfortable => "uncomfortable",
            DiBand::VeryUncomfortable => "very uncomfortable",
        }
    }

    pub fn triggers_auto_control(&self) -> bool {
        *self >= DiBand::Uncomfortable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeatIndexBand {
    Cool,
    SlightlyHot,
    VeryHot,
    Dangerous,
}

impl HeatIndexBand {
    pub fn from_hi(hi: f64) -> Self {
        if hi < 27.0 {
            HeatIndexBand::Cool
        } else if hi < 32.0 {
            HeatIndexBand::SlightlyHot
        } else if hi < 41.0 {
            HeatIndexBand::VeryHot
        } else {
            HeatIndexBand::Dangerous
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HeatIndexBand::Cool => "cool",
            HeatIndexBand::SlightlyHot => "slightly hot",
            HeatIndexBand::VeryHot => "very hot",
            HeatIndexBand::Dangerous => "dangerous",
        }
    }
}

/// Shared by the cooling load index and the estimated cooling power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadBand {
    Low,
    Moderate,
    High,
}

impl LoadBand {
    /// CLI in kJ/kg: below 5 low, below 15 moderate.
    pub fn from_cli(cli: f64) -> Self {
        if cli < 5.0 {
            LoadBand::Low
        } else if cli < 15.0 {
            LoadBand::Moderate
        } else {
            LoadBand::High
        }
    }

    /// Cooling power in kW: below 1 low, below 3 moderate.
    pub fn from_cooling_power(kw: f64) -> Self {
        if kw < 1.0 {
            LoadBand::Low
        } else if kw < 3.0 {
            LoadBand::Moderate
        } else {
            LoadBand::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadBand::Low => "low",
            LoadBand::Moderate => "moderate",
            LoadBand::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bands {
    pub di: DiBand,
    pub hi: HeatIndexBand,
    pub cli: LoadBand,
    pub cooling_power: LoadBand,
}

impl Bands {
    pub fn from_metrics(metrics: &ComfortMetrics) -> Self {
        Self {
            di: DiBand::from_di(metrics.di),
            hi: HeatIndexBand::from_hi(metrics.hi),
            cli: LoadBand::from_cli(metrics.cli),
            cooling_power: LoadBand::from_cooling_power(metrics.cooling_power_kw),
        }
    }
}

pub fn ppd_band(result: &PmvPpd) -> PpdBand {
    PpdBand::from_ppd(result.ppd)
}
