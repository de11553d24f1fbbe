use serde::{Deserialize, Serialize};

pub type CategoryId = uuid::Uuid;

/// Immutable reference data; administered elsewhere in the application and
/// only looked up here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
}
