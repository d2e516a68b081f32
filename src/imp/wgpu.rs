// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The wgpu backend.

Bind calls update a per-stage table of what sits in each register. The owner of the render
or compute pass builds bind groups from those tables with [`WgpuBackend::bind_group_entries`]
and replays the draws and dispatches queued in [`WgpuBackend::take_pending`]; see
[`binding_model`] for how registers map onto `@group`/`@binding` pairs.

Validation errors raised by the device are captured and reported from the next fallible call.
*/

pub mod binding_model;
mod error;
mod sampler;

pub use binding_model::{bind_group_index, binding_number};
pub use sampler::SamplerFilter;

use crate::bindings::resource::{
    ConstantBuffer, DepthTarget, RWResource, RenderTarget, SamplerState, ShaderResource,
};
use crate::context::draw::DrawCommand;
use crate::imp::{Backend, Error};
use crate::shader::reflection::{ResourceCategory, ResourceType};
use crate::shader::stage::{NUM_STAGES, Stage};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A view the shader reads or writes: either a texture view or a whole buffer.
#[derive(Debug, Clone)]
pub enum WgpuView {
    Texture(wgpu::TextureView),
    Buffer(wgpu::Buffer),
}

impl WgpuView {
    fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            WgpuView::Texture(view) => wgpu::BindingResource::TextureView(view),
            WgpuView::Buffer(buffer) => buffer.as_entire_binding(),
        }
    }
}

/// Work queued for the pass encoder owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    Draw(DrawCommand),
    Dispatch { x: u32, y: u32, z: u32 },
}

#[derive(Debug, Default)]
struct StageTable {
    constant_buffers: BTreeMap<u32, Arc<ConstantBuffer<WgpuBackend>>>,
    samplers: BTreeMap<u32, Arc<SamplerState<WgpuBackend>>>,
    resources: BTreeMap<u32, Arc<ShaderResource<WgpuBackend>>>,
    uavs: BTreeMap<u32, Arc<RWResource<WgpuBackend>>>,
    shader: Option<wgpu::ShaderModule>,
}

/// Writes `handles` into `table` starting at `first_register`, removing entries for `None`.
fn update_table<T>(
    table: &mut BTreeMap<u32, Arc<T>>,
    category: ResourceCategory,
    first_register: u32,
    handles: &[Option<Arc<T>>],
) -> Result<(), Error> {
    let last = first_register + handles.len().saturating_sub(1) as u32;
    if !handles.is_empty() && binding_number(category, last).is_none() {
        return Err(Error::Rejected(format!(
            "{category} register {last} has no wgpu binding"
        )));
    }
    for (register, handle) in (first_register..).zip(handles) {
        match handle {
            Some(handle) => {
                table.insert(register, handle.clone());
            }
            None => {
                table.remove(&register);
            }
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    tables: [StageTable; NUM_STAGES],
    colors: Vec<Option<Arc<RenderTarget<WgpuBackend>>>>,
    depth: Option<Arc<DepthTarget<WgpuBackend>>>,
    pending: Vec<PendingCommand>,
    captured_error: Arc<Mutex<Option<Error>>>,
    device_lost: Arc<AtomicBool>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let captured_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let device_lost = Arc::new(AtomicBool::new(false));

        let sink = captured_error.clone();
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            logwise::error_sync!("wgpu error: {error}", error = logwise::privacy::LogIt(&error));
            let mut slot = sink.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(Error::from(error));
            }
        }));
        let lost = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            logwise::error_sync!(
                "wgpu device lost ({reason}): {message}",
                reason = logwise::privacy::LogIt(&reason),
                message = logwise::privacy::LogIt(&message)
            );
            lost.store(true, Ordering::Release);
        });

        WgpuBackend {
            device,
            queue,
            tables: Default::default(),
            colors: Vec::new(),
            depth: None,
            pending: Vec::new(),
            captured_error,
            device_lost,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Reports device loss, or the first error the device raised since the last check.
    fn check(&self) -> Result<(), Error> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(Error::DeviceLost);
        }
        match self.captured_error.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn create_sampler(&self, filter: SamplerFilter, debug_name: &str) -> Arc<SamplerState<Self>> {
        let sampler = self
            .device
            .create_sampler(&sampler::sampler_descriptor(filter, debug_name));
        Arc::new(SamplerState::new(sampler, debug_name))
    }

    /// Wraps a texture view as a shader resource.
    pub fn texture_resource(
        &self,
        view: wgpu::TextureView,
        resource_type: ResourceType,
        default_sampler: Option<Arc<SamplerState<Self>>>,
        debug_name: &str,
    ) -> Arc<ShaderResource<Self>> {
        let resource = ShaderResource::new(WgpuView::Texture(view), resource_type, debug_name);
        Arc::new(match default_sampler {
            Some(sampler) => resource.with_default_sampler(sampler),
            None => resource,
        })
    }

    /// Wraps a storage buffer as a read-write resource.
    pub fn storage_buffer_resource(&self, buffer: wgpu::Buffer, debug_name: &str) -> Arc<RWResource<Self>> {
        Arc::new(RWResource::new(WgpuView::Buffer(buffer), ResourceType::Buffer, debug_name))
    }

    pub fn stage_module(&self, stage: Stage) -> Option<&wgpu::ShaderModule> {
        self.tables[stage.index()].shader.as_ref()
    }

    pub fn color_targets(&self) -> &[Option<Arc<RenderTarget<Self>>>] {
        &self.colors
    }

    pub fn depth_target(&self) -> Option<&Arc<DepthTarget<Self>>> {
        self.depth.as_ref()
    }

    /// The entries of `stage`'s bind group for what is currently bound, in binding order.
    pub fn bind_group_entries(&self, stage: Stage) -> Vec<wgpu::BindGroupEntry<'_>> {
        let table = &self.tables[stage.index()];
        let mut entries = Vec::new();
        let registers = table
            .constant_buffers
            .iter()
            .map(|(r, cb)| (ResourceCategory::ConstantBuffer, *r, cb.native().as_entire_binding()))
            .chain(
                table
                    .resources
                    .iter()
                    .map(|(r, res)| (ResourceCategory::Texture, *r, res.native().binding_resource())),
            )
            .chain(
                table
                    .samplers
                    .iter()
                    .map(|(r, s)| (ResourceCategory::Sampler, *r, wgpu::BindingResource::Sampler(s.native()))),
            )
            .chain(
                table
                    .uavs
                    .iter()
                    .map(|(r, uav)| (ResourceCategory::ReadWriteResource, *r, uav.native().binding_resource())),
            );
        for (category, register, resource) in registers {
            // update_table only admits registers that have a binding
            if let Some(binding) = binding_number(category, register) {
                entries.push(wgpu::BindGroupEntry { binding, resource });
            }
        }
        entries
    }

    /// Drains the draws and dispatches recorded since the last call.
    pub fn take_pending(&mut self) -> Vec<PendingCommand> {
        std::mem::take(&mut self.pending)
    }
}

impl Backend for WgpuBackend {
    type Buffer = wgpu::Buffer;
    type Sampler = wgpu::Sampler;
    type ShaderResourceView = WgpuView;
    type UnorderedAccessView = WgpuView;
    type RenderTargetView = wgpu::TextureView;
    type DepthStencilView = wgpu::TextureView;
    type StageShader = wgpu::ShaderModule;

    /// `bytecode` is WGSL source.
    fn create_stage_shader(&mut self, stage: Stage, bytecode: &[u8], debug_name: &str) -> Result<wgpu::ShaderModule, Error> {
        self.check()?;
        let source = std::str::from_utf8(bytecode)
            .map_err(|e| Error::Rejected(format!("{stage} shader is not WGSL text: {e}")))?;
        let label = format!("{debug_name}.{stage}");
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });
        self.check()?;
        Ok(module)
    }

    fn set_stage_shader(&mut self, stage: Stage, shader: Option<&wgpu::ShaderModule>) {
        self.tables[stage.index()].shader = shader.cloned();
    }

    fn create_uniform_buffer(&mut self, size: u32, debug_name: &str) -> Result<wgpu::Buffer, Error> {
        self.check()?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(debug_name),
            size: u64::from(size),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: &wgpu::Buffer, data: &[u8]) -> Result<(), Error> {
        self.check()?;
        self.queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    fn bind_constant_buffers(
        &mut self,
        stage: Stage,
        first_register: u32,
        buffers: &[Option<Arc<ConstantBuffer<Self>>>],
    ) -> Result<(), Error> {
        self.check()?;
        update_table(
            &mut self.tables[stage.index()].constant_buffers,
            ResourceCategory::ConstantBuffer,
            first_register,
            buffers,
        )
    }

    fn bind_samplers(
        &mut self,
        stage: Stage,
        first_register: u32,
        samplers: &[Option<Arc<SamplerState<Self>>>],
    ) -> Result<(), Error> {
        self.check()?;
        update_table(
            &mut self.tables[stage.index()].samplers,
            ResourceCategory::Sampler,
            first_register,
            samplers,
        )
    }

    fn bind_shader_resources(
        &mut self,
        stage: Stage,
        first_register: u32,
        resources: &[Option<Arc<ShaderResource<Self>>>],
    ) -> Result<(), Error> {
        self.check()?;
        update_table(
            &mut self.tables[stage.index()].resources,
            ResourceCategory::Texture,
            first_register,
            resources,
        )
    }

    fn bind_unordered_access_views(
        &mut self,
        stage: Stage,
        first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error> {
        self.check()?;
        update_table(
            &mut self.tables[stage.index()].uavs,
            ResourceCategory::ReadWriteResource,
            first_register,
            uavs,
        )
    }

    /// Replaces the targets and the whole set of fragment UAVs.
    fn bind_render_targets_and_uavs(
        &mut self,
        colors: &[Option<Arc<RenderTarget<Self>>>],
        depth: Option<&Arc<DepthTarget<Self>>>,
        uav_first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error> {
        self.check()?;
        let mut fragment_uavs = BTreeMap::new();
        update_table(
            &mut fragment_uavs,
            ResourceCategory::ReadWriteResource,
            uav_first_register,
            uavs,
        )?;
        self.tables[Stage::Fragment.index()].uavs = fragment_uavs;
        self.colors = colors.to_vec();
        self.depth = depth.cloned();
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), Error> {
        self.check()?;
        self.pending.push(PendingCommand::Draw(*command));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), Error> {
        self.check()?;
        self.pending.push(PendingCommand::Dispatch { x, y, z });
        Ok(())
    }
}
