//! Core modules of the docshift migration engine.
//!
//! Detection strategies, step strategies, and the file/folder
//! orchestrators all live here; the CLI is a thin layer on top.

pub mod assets;
pub mod error;
pub mod folder;
pub mod migrator;
pub mod strategy;
pub mod transform;
pub mod version;
