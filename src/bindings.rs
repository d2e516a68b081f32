// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Runtime binding types: shared resource handles and the dirty-tracked arrays that hold them. */

pub mod binding_array;
pub mod binding_state;
pub mod dirty_tracking;
pub mod resource;

pub use binding_array::BindingArray;
pub use binding_state::{BindingLimits, CommandContextBindingState, StageBindings};
pub use dirty_tracking::DirtyRange;
pub use resource::{ConstantBuffer, DepthTarget, RWResource, RenderTarget, SamplerState, ShaderResource};
