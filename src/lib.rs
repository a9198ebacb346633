//! `flagship_core` is a common library to build Flagship feature-experimentation
//! SDKs for different languages. If you're a Flagship user, you probably want
//! one of the host SDKs built on top of it.
//!
//! # Overview
//!
//! The crate provides the two subsystems every host SDK shares:
//!
//! - the [`decision`] engine: a fixed-order chain of decision layers
//!   (overrides, whitelists, bucketing, rollouts) producing a variation and
//!   its reasoning for a user;
//! - the [`events`] pipeline: a bounded queue drained by a background worker
//!   that batches impression/conversion events and hands them to a
//!   dispatcher.
//!
//! Hosts inject the outer collaborators (datafile loading, HTTP transport,
//! persistence) through the interfaces defined here.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod audience;
pub mod bucketer;
pub mod config_store;
pub mod decision;
pub mod entities;
pub mod events;
pub mod execution;

mod attributes;
mod config;
mod error;
mod user_context;

pub use attributes::{
    AttributeValue, Attributes, BOT_FILTERING_ATTRIBUTE, BUCKETING_ID_ATTRIBUTE,
    EXPERIMENT_BUCKET_MAP_ATTRIBUTE, RESERVED_ATTRIBUTE_PREFIX, USER_AGENT_ATTRIBUTE,
};
pub use config::ProjectConfig;
pub use error::{Error, Result};
pub use user_context::UserContext;
