mod controller;
mod error;
mod gateway;
mod interpret;
mod logger;
mod metrics;
mod model;
mod policy;
mod protocol;
mod telemetry;
mod types;

pub use controller::{AutoController, AutoControllerBuilder};
pub use error::{Error, Result};
pub use gateway::{DEFAULT_API_URL, DeviceGateway, SmartThingsGateway, SmartThingsGatewayBuilder};
pub use interpret::*;
pub use metrics::*;
pub use model::{ComfortModel, ComfortReport, HttpComfortModel, Iso7730, PmvStatus, assess};
pub use policy::{ComfortPolicy, DecisionService, HttpDecisionService};
pub use protocol::{
    DEFAULT_COMPONENT, decision_request, device_command_body, parse_aircon_status,
    parse_decision_response,
};
pub use telemetry::TelemetrySource;
pub use types::*;
