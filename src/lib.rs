pub mod dsp;
pub mod engine; // Block driver and layout builder
pub mod params; // Modulatable parameters and the registry
pub mod routing; // Slots, the router, and control events
pub mod sources; // Source catalogue and per-block bank
pub mod state; // Flat snapshots of bindings and bases

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Back-reference sets are u64 bitmasks, which caps the slot pool.
pub const MAX_SLOTS: usize = 64;

pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
