use async_trait::async_trait;

use crate::error::VestryError;

pub type MemberId = uuid::Uuid;

/// Narrow view onto the application's member roll.
///
/// Approval submissions are validated against this before any record is
/// written; only active deacons may ratify a review cycle.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn is_active_deacon(&self, member: MemberId) -> Result<bool, VestryError>;
}
