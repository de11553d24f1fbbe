//! Review-lifecycle services: due-date and alert derivation, cycle history
//! reconstruction, and the [`service::ReviewService`] gatekeeper that owns
//! every state transition.

pub mod history;
pub mod locks;
pub mod schedule;
pub mod service;
