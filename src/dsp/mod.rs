//! Low-level DSP primitives used by the routing and parameter layers.
//!
//! These components are allocation-free and realtime-safe. They intentionally
//! stay focused on the signal math; the `sources`, `params`, and `routing`
//! modules layer catalogue, smoothing, and rewiring concerns on top.

/// Control-rate waveform generators for modulation sources.
pub mod generator;
/// One-pole parameter smoothing.
pub mod smooth;
