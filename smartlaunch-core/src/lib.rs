pub mod clinical;
pub mod error;
pub mod smart;

pub use clinical::{
    ChartPoint, ClinicalBundles, Dashboard, ObservationEntry, PatientSummary, VitalSigns,
    ALLOWED_OBSERVATIONS,
};
pub use error::{LaunchError, Result};
pub use smart::{AuthorizeRequest, PatientGrant, SmartConfiguration, SmartEndpoints, TokenResponse};
