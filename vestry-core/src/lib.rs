//! Domain contracts for the vestry risk-assessment review subsystem:
//! entity types, error kinds, configuration, and the trait seams behind
//! which storage and the rest of the church-administration application
//! live.

pub mod approval;
pub mod assessment;
pub mod category;
pub mod config;
pub mod directory;
pub mod error;
pub mod reminder;
pub mod store;
pub mod view;
