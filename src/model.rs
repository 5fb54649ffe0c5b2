use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

use crate::interpret::{Bands, PpdBand};
use crate::metrics::{ComfortMetrics, PmvInput, PmvPpd, pmv_ppd};
use crate::protocol::{parse_pmv_response, pmv_request};
use crate::types::Sample;
use crate::{Error, Result};

/// Thermal sensation model. Treated as slow and failable, unlike the
/// arithmetic indices.
pub trait ComfortModel {
    fn evaluate(&self, input: &PmvInput) -> impl Future<Output = Result<PmvPpd>> + Send;
}

/// In-process ISO 7730 solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Iso7730;

impl ComfortModel for Iso7730 {
    async fn evaluate(&self, input: &PmvInput) -> Result<PmvPpd> {
        pmv_ppd(input)
    }
}

/// Remote scoring service: POST `{ta, tr, rh, met, clo}`, answer `{pmv, ppd}`.
#[derive(Debug, Clone)]
pub struct HttpComfortModel {
    http: reqwest::Client,
    url: String,
}

impl HttpComfortModel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl ComfortModel for HttpComfortModel {
    async fn evaluate(&self, input: &PmvInput) -> Result<PmvPpd> {
        input.validate()?;
        debug!(url = %self.url, ta = input.ta, rh = input.rh, "requesting PMV/PPD");
        let resp = self
            .http
            .post(&self.url)
            .json(&pmv_request(input))
            .send()
            .await
            .map_err(|e| Error::Evaluation(format!("PMV request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Evaluation(format!("PMV response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(Error::Evaluation(format!(
                "PMV service returned {}: {body}",
                status.as_u16()
            )));
        }
        parse_pmv_response(&body)
    }
}

/// PMV/PPD availability for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PmvStatus {
    Pending,
    Ready { pmv: f64, ppd: f64, band: PpdBand },
    Unavailable { reason: String },
}

/// Everything a metric card shows for one room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComfortReport {
    pub sample: Sample,
    pub metrics: ComfortMetrics,
    pub bands: Bands,
    pub pmv: PmvStatus,
}

impl ComfortReport {
    /// Arithmetic indices only, PMV still pending.
    pub fn pending(sample: Sample) -> Result<Self> {
        let metrics = ComfortMetrics::from_sample(&sample)?;
        Ok(Self {
            sample,
            bands: Bands::from_metrics(&metrics),
            metrics,
            pmv: PmvStatus::Pending,
        })
    }

    pub fn with_pmv(mut self, result: Result<PmvPpd>) -> Self {
        self.pmv = match result {
            Ok(r) => PmvStatus::Ready {
                pmv: r.pmv,
                ppd: r.ppd,
                band: PpdBand::from_ppd(r.ppd),
            },
            Err(e) => {
                warn!(error = %e, "PMV/PPD unavailable");
                PmvStatus::Unavailable {
                    reason: e.to_string(),
                }
            }
        };
        self
    }
}

/// Builds a full report. Only an invalid sample is an error; a failed PMV
/// evaluation is folded into [`PmvStatus::Unavailable`].
pub async fn assess<M: ComfortModel>(model: &M, sample: Sample) -> Result<ComfortReport> {
    let report = ComfortReport::pending(sample)?;
    let result = model.evaluate(&PmvInput::from_sample(&sample)).await;
    Ok(report.with_pmv(result))
}
