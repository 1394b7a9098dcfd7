//! initrd-layout library exports for testing.
//!
//! Exposes the script ordering and module resolution stages so the
//! integration tests can drive them against temporary trees and a fake
//! module database.

pub mod commands;
pub mod config;
pub mod modules;
pub mod process;
pub mod report;
pub mod scripts;
pub mod stages;
pub mod timing;
