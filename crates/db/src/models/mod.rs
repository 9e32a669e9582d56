//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO (validated + clamped before insert)
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod connection;
pub mod delivery_log;
pub mod webhook;
