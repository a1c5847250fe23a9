//! Application services and their collaborator contracts.

pub mod analytics;
pub mod catalogue;
pub mod error;
pub mod repos;
pub mod response;
pub mod search;
pub mod session;
