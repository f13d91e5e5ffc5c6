//! Modulatable parameters and the registry that owns them.
//!
//! Parameters live in an arena owned by [`registry::ParamRegistry`] and are
//! addressed by small integer handles; stable string ids exist only at the
//! edges (registration, host choice lists, state blobs). Parameters are
//! created during layout and never destroyed, which is what makes handles
//! safe to hold across rebinding.

/// The smoothed, modulatable scalar parameter.
pub mod parameter;
/// Arena of parameters plus the string-id side table.
pub mod registry;

pub use parameter::{ModParam, ParamRange};
pub use registry::{ParamHandle, ParamRegistry};
