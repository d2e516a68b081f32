// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! shaders_and_slots is the resource binding layer between shader programs and a graphics
  device.

Callers bind constant buffers, samplers, textures and read-write resources by *global slot*, a
single number per resource that holds across every stage of a program. Each stage of the
compiled shader may use a different native register for the same resource. This crate keeps
the two views apart and reconciles them only when work is submitted.

| Piece                | Runs      | Responsibility                                                      |
|----------------------|-----------|---------------------------------------------------------------------|
| [`shader`]           | offline   | reflect stages, allocate global slots, link samplers, write a blob  |
| [`program`]          | load time | parse the blob, create per-stage shaders, hold uniform values       |
| [`bindings`]         | runtime   | logical and physical binding arrays with dirty tracking             |
| [`context`]          | runtime   | accept bindings and draws, synchronize only what changed            |
| [`imp`]              | runtime   | the device backend: a recording `nop` backend and `wgpu`            |

# Slots

Where every stage that uses a resource agrees on a register, that register becomes the
global slot. Otherwise the resource takes the smallest slot nobody has claimed. A texture
named `X` is paired with the sampler named `X_SamplerState`; when no sampler is bound in the
pair's slot, the texture's default sampler is used.

# Synchronization

Binding is cheap: it writes a logical array and widens a dirty range. Draws and dispatches
translate the dirty logical ranges through the current program's slot tables into per-stage
register arrays, and send each stage one call per category covering only the registers that
changed. A backend failure leaves the unsent ranges dirty, so the next draw retries them.

# Backends

The [`imp::Backend`] trait is the only thing the binding model knows about a device.
[`imp::nop::NopBackend`] records every call and needs no GPU. The wgpu backend
(feature `backend_wgpu`, on by default) maps each stage to a bind group.
*/

pub mod bindings;
pub mod context;
pub mod imp;
pub mod program;
pub mod shader;

pub use context::{CommandContext, ContextConfig};
pub use imp::Backend;
pub use program::{ProgramError, ShaderProgram};
