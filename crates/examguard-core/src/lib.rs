//! examguard-core: Exam session engine, proctoring and scoring.
//!
//! This crate defines the data model, the collaborator traits and the session
//! state machine that the rest of examguard builds on.

pub mod error;
pub mod host;
pub mod model;
pub mod notification;
pub mod parser;
pub mod proctor;
pub mod report;
pub mod results;
pub mod scoring;
pub mod session;
pub mod timer;
pub mod traits;
