//! Microgrid dispatch simulator with a step/reset control surface.
//!
//! The crate models an islanded or grid-tied microgrid (renewable
//! production, storage devices, load, optional utility connection) over a
//! discretized horizon. External decision-making agents drive it through a
//! reset/step interface and receive a next state, a scalar reward, and a
//! per-step cost decomposition.

pub mod config;
/// Exogenous time-series data: CSV ingestion and synthetic profiles.
pub mod data;
pub mod devices;
/// Array-flattening environment adapter for agent training loops.
pub mod env;
pub mod error;
pub mod io;
/// Dispatch policies and the episode driver.
pub mod policy;
/// Simulation core: grid model, action decoding, transition, KPIs.
pub mod sim;
