use std::future::Future;

use crate::types::{AcState, Sample};
use crate::Result;

/// Source of the latest room readings and reported AC state. `Ok(None)`
/// means no data yet.
pub trait TelemetrySource {
    fn latest_sample(&self, room_id: &str) -> impl Future<Output = Result<Option<Sample>>> + Send;

    fn ac_state(&self) -> impl Future<Output = Result<Option<AcState>>> + Send;
}
