use crate::assessment::AssessmentId;
use crate::category::CategoryId;

#[derive(Debug, thiserror::Error)]
pub enum VestryError {
    #[error("assessment not found: {0}")]
    AssessmentNotFound(AssessmentId),

    #[error("category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("concurrent update lost on assessment {0}; retry the operation")]
    Conflict(AssessmentId),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(String),
}

impl VestryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_ids() {
        let id = AssessmentId::new_v4();
        let err = VestryError::Conflict(id);
        assert!(err.to_string().contains(&id.to_string()));

        let err = VestryError::invalid_state("start a review before approving");
        assert_eq!(
            err.to_string(),
            "invalid state: start a review before approving"
        );
    }
}
