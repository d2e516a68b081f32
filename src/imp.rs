// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The graphics device backend interface.

The binding model depends only on [`Backend`]. Each native API implements it once:
[`nop::NopBackend`] records calls and needs no device, and [`wgpu::WgpuBackend`] (feature
`backend_wgpu`) drives wgpu.

Every bind call covers a contiguous register span of one stage: `handles[i]` goes to register
`first_register + i`, and `None` unbinds.
*/

use crate::bindings::resource::{ConstantBuffer, DepthTarget, RWResource, RenderTarget, SamplerState, ShaderResource};
use crate::context::draw::DrawCommand;
use crate::shader::stage::Stage;
use std::fmt::Debug;
use std::sync::Arc;

pub mod nop;
#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

/// A backend call that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the device was lost")]
    DeviceLost,
    #[error("the device ran out of memory")]
    OutOfMemory,
    #[error("the backend rejected the call: {0}")]
    Rejected(String),
}

pub trait Backend: Debug + Sized {
    type Buffer: Debug;
    type Sampler: Debug;
    type ShaderResourceView: Debug;
    type UnorderedAccessView: Debug;
    type RenderTargetView: Debug;
    type DepthStencilView: Debug;
    /// A native shader object for one stage.
    type StageShader: Debug;

    fn create_stage_shader(&mut self, stage: Stage, bytecode: &[u8], debug_name: &str) -> Result<Self::StageShader, Error>;

    /// Attaches `shader` to `stage`, or detaches whatever is there for `None`.
    fn set_stage_shader(&mut self, stage: Stage, shader: Option<&Self::StageShader>);

    fn create_uniform_buffer(&mut self, size: u32, debug_name: &str) -> Result<Self::Buffer, Error>;

    /// Replaces the contents of `buffer`, starting at offset 0.
    fn write_buffer(&mut self, buffer: &Self::Buffer, data: &[u8]) -> Result<(), Error>;

    fn bind_constant_buffers(
        &mut self,
        stage: Stage,
        first_register: u32,
        buffers: &[Option<Arc<ConstantBuffer<Self>>>],
    ) -> Result<(), Error>;

    fn bind_samplers(
        &mut self,
        stage: Stage,
        first_register: u32,
        samplers: &[Option<Arc<SamplerState<Self>>>],
    ) -> Result<(), Error>;

    fn bind_shader_resources(
        &mut self,
        stage: Stage,
        first_register: u32,
        resources: &[Option<Arc<ShaderResource<Self>>>],
    ) -> Result<(), Error>;

    fn bind_unordered_access_views(
        &mut self,
        stage: Stage,
        first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error>;

    /**
    Binds color targets, the depth target and the fragment stage's UAVs in one call.

    Fragment-stage UAVs share output slots with color targets, so they are never bound
    through [`Backend::bind_unordered_access_views`].
    */
    fn bind_render_targets_and_uavs(
        &mut self,
        colors: &[Option<Arc<RenderTarget<Self>>>],
        depth: Option<&Arc<DepthTarget<Self>>>,
        uav_first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error>;

    fn draw(&mut self, command: &DrawCommand) -> Result<(), Error>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), Error>;
}
