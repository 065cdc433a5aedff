//! # UMP Common Library
//!
//! Shared code for the University Media Platform services:
//! - Database schema, migrations and catalogue repositories
//! - Permission model and visibility resolution
//! - Identity lookup collaborator (group/institution memberships)
//! - Synchronization bridges to the legacy SMS and the JWP delivery provider
//! - Configuration loading
//! - Sessions and principal capabilities

pub mod catalogue;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod lookup;
pub mod permission;
pub mod principal;
pub mod session;
pub mod sync;
pub mod token;
pub mod visibility;

pub use error::{Error, Result};
pub use permission::Permission;
pub use principal::{Action, Capability, Principal, ResourceKind};
pub use visibility::{is_downloadable_by, is_visible_to, Protected, Viewer};
