// src/lib.rs
//! Real-time underwater reef viewer library.
//!
//! Chunked procedural ocean surface and floor fields generated on the GPU,
//! hash-scattered coral, thousands of drifting lights resolved either by a
//! naive forward loop or by clustered deferred lookup, and a spectral
//! Jerlov water model applied at composite time.

pub mod app;
pub mod camera;
pub mod config;
pub mod renderer;
pub mod scene;
pub mod shaders;
pub mod stage;
pub mod ui;
