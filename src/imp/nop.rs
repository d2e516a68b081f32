// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A backend with no device behind it.

Every successful call is appended to a log of [`BackendCall`]s, with handles recorded by debug
name, so callers can check exactly what reached the backend. A failure can be armed to make the
next fallible call, or one a given number of calls later, return an error.
*/

use crate::bindings::resource::{ConstantBuffer, DepthTarget, RWResource, RenderTarget, SamplerState, ShaderResource};
use crate::context::draw::DrawCommand;
use crate::imp::{Backend, Error};
use crate::shader::reflection::ResourceType;
use crate::shader::stage::Stage;
use std::sync::Arc;

/// A native object of the nop backend. It is nothing but its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NopHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateStageShader {
        stage: Stage,
        debug_name: String,
        bytecode_len: usize,
    },
    SetStageShader {
        stage: Stage,
        shader: Option<String>,
    },
    CreateUniformBuffer {
        size: u32,
        debug_name: String,
    },
    WriteBuffer {
        buffer: String,
        data: Vec<u8>,
    },
    BindConstantBuffers {
        stage: Stage,
        first_register: u32,
        buffers: Vec<Option<String>>,
    },
    BindSamplers {
        stage: Stage,
        first_register: u32,
        samplers: Vec<Option<String>>,
    },
    BindShaderResources {
        stage: Stage,
        first_register: u32,
        resources: Vec<Option<String>>,
    },
    BindUnorderedAccessViews {
        stage: Stage,
        first_register: u32,
        uavs: Vec<Option<String>>,
    },
    BindRenderTargetsAndUavs {
        colors: Vec<Option<String>>,
        depth: Option<String>,
        uav_first_register: u32,
        uavs: Vec<Option<String>>,
    },
    Draw(DrawCommand),
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
}

impl BackendCall {
    /// Whether this call binds resources or targets, as opposed to shaders, buffers or work.
    pub fn is_bind(&self) -> bool {
        matches!(
            self,
            BackendCall::BindConstantBuffers { .. }
                | BackendCall::BindSamplers { .. }
                | BackendCall::BindShaderResources { .. }
                | BackendCall::BindUnorderedAccessViews { .. }
                | BackendCall::BindRenderTargetsAndUavs { .. }
        )
    }
}

fn names<T>(handles: &[Option<Arc<T>>], name: impl Fn(&T) -> &str) -> Vec<Option<String>> {
    handles
        .iter()
        .map(|h| h.as_ref().map(|h| name(h).to_string()))
        .collect()
}

#[derive(Debug, Default)]
pub struct NopBackend {
    calls: Vec<BackendCall>,
    /// Successful calls still to go, then the error to fail with.
    armed_failure: Option<(usize, Error)>,
}

impl NopBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Returns the recorded calls and starts a fresh log.
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Makes the next fallible call fail with `error` instead of being recorded.
    pub fn fail_next_call(&mut self, error: Error) {
        self.fail_call_after(0, error);
    }

    /// Lets `successes` fallible calls through, then fails the one after them with `error`.
    pub fn fail_call_after(&mut self, successes: usize, error: Error) {
        self.armed_failure = Some((successes, error));
    }

    fn check(&mut self) -> Result<(), Error> {
        match self.armed_failure.take() {
            Some((0, error)) => Err(error),
            Some((left, error)) => {
                self.armed_failure = Some((left - 1, error));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record(&mut self, call: BackendCall) -> Result<(), Error> {
        self.check()?;
        self.calls.push(call);
        Ok(())
    }

    pub fn constant_buffer(name: &str, size: u32) -> Arc<ConstantBuffer<NopBackend>> {
        Arc::new(ConstantBuffer::new(NopHandle(name.to_string()), size, name))
    }

    pub fn sampler(name: &str) -> Arc<SamplerState<NopBackend>> {
        Arc::new(SamplerState::new(NopHandle(name.to_string()), name))
    }

    pub fn texture(name: &str, default_sampler: Option<Arc<SamplerState<NopBackend>>>) -> Arc<ShaderResource<NopBackend>> {
        let texture = ShaderResource::new(NopHandle(name.to_string()), ResourceType::Texture2D, name);
        Arc::new(match default_sampler {
            Some(sampler) => texture.with_default_sampler(sampler),
            None => texture,
        })
    }

    pub fn rw_resource(name: &str) -> Arc<RWResource<NopBackend>> {
        Arc::new(RWResource::new(NopHandle(name.to_string()), ResourceType::Buffer, name))
    }

    pub fn render_target(name: &str) -> Arc<RenderTarget<NopBackend>> {
        Arc::new(RenderTarget::new(NopHandle(name.to_string()), name))
    }

    pub fn depth_target(name: &str) -> Arc<DepthTarget<NopBackend>> {
        Arc::new(DepthTarget::new(NopHandle(name.to_string()), name))
    }
}

impl Backend for NopBackend {
    type Buffer = NopHandle;
    type Sampler = NopHandle;
    type ShaderResourceView = NopHandle;
    type UnorderedAccessView = NopHandle;
    type RenderTargetView = NopHandle;
    type DepthStencilView = NopHandle;
    type StageShader = NopHandle;

    fn create_stage_shader(&mut self, stage: Stage, bytecode: &[u8], debug_name: &str) -> Result<NopHandle, Error> {
        let label = format!("{debug_name}.{stage}");
        self.record(BackendCall::CreateStageShader {
            stage,
            debug_name: label.clone(),
            bytecode_len: bytecode.len(),
        })?;
        Ok(NopHandle(label))
    }

    fn set_stage_shader(&mut self, stage: Stage, shader: Option<&NopHandle>) {
        self.calls.push(BackendCall::SetStageShader {
            stage,
            shader: shader.map(|s| s.0.clone()),
        });
    }

    fn create_uniform_buffer(&mut self, size: u32, debug_name: &str) -> Result<NopHandle, Error> {
        self.record(BackendCall::CreateUniformBuffer {
            size,
            debug_name: debug_name.to_string(),
        })?;
        Ok(NopHandle(debug_name.to_string()))
    }

    fn write_buffer(&mut self, buffer: &NopHandle, data: &[u8]) -> Result<(), Error> {
        self.record(BackendCall::WriteBuffer {
            buffer: buffer.0.clone(),
            data: data.to_vec(),
        })
    }

    fn bind_constant_buffers(
        &mut self,
        stage: Stage,
        first_register: u32,
        buffers: &[Option<Arc<ConstantBuffer<Self>>>],
    ) -> Result<(), Error> {
        self.record(BackendCall::BindConstantBuffers {
            stage,
            first_register,
            buffers: names(buffers, ConstantBuffer::debug_name),
        })
    }

    fn bind_samplers(
        &mut self,
        stage: Stage,
        first_register: u32,
        samplers: &[Option<Arc<SamplerState<Self>>>],
    ) -> Result<(), Error> {
        self.record(BackendCall::BindSamplers {
            stage,
            first_register,
            samplers: names(samplers, SamplerState::debug_name),
        })
    }

    fn bind_shader_resources(
        &mut self,
        stage: Stage,
        first_register: u32,
        resources: &[Option<Arc<ShaderResource<Self>>>],
    ) -> Result<(), Error> {
        self.record(BackendCall::BindShaderResources {
            stage,
            first_register,
            resources: names(resources, ShaderResource::debug_name),
        })
    }

    fn bind_unordered_access_views(
        &mut self,
        stage: Stage,
        first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error> {
        self.record(BackendCall::BindUnorderedAccessViews {
            stage,
            first_register,
            uavs: names(uavs, RWResource::debug_name),
        })
    }

    fn bind_render_targets_and_uavs(
        &mut self,
        colors: &[Option<Arc<RenderTarget<Self>>>],
        depth: Option<&Arc<DepthTarget<Self>>>,
        uav_first_register: u32,
        uavs: &[Option<Arc<RWResource<Self>>>],
    ) -> Result<(), Error> {
        self.record(BackendCall::BindRenderTargetsAndUavs {
            colors: names(colors, RenderTarget::debug_name),
            depth: depth.map(|d| d.debug_name().to_string()),
            uav_first_register,
            uavs: names(uavs, RWResource::debug_name),
        })
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), Error> {
        self.record(BackendCall::Draw(*command))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), Error> {
        self.record(BackendCall::Dispatch { x, y, z })
    }
}
