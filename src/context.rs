// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The command-recording context.

A [`CommandContext`] owns a backend and the binding state for it. Callers bind resources by
global slot and set a [`ShaderProgram`]; nothing reaches the backend until a draw or dispatch
synchronizes, and then only the bindings that changed.

```
use shaders_and_slots::context::{CommandContext, ContextConfig};
use shaders_and_slots::imp::nop::NopBackend;

let mut context = CommandContext::new(NopBackend::new(), ContextConfig::default());
context.set_constant_buffer(0, Some(NopBackend::constant_buffer("Camera", 64)));
// nothing to draw: no program is needed and no backend call is made
context.draw(0, 0).unwrap();
assert!(context.backend().calls().is_empty());
```
*/

pub mod counters;
pub mod draw;
mod synchronizer;

pub use counters::Counters;
pub use draw::DrawCommand;

use crate::bindings::binding_state::{BindingLimits, CommandContextBindingState};
use crate::bindings::resource::{ConstantBuffer, DepthTarget, RWResource, RenderTarget, SamplerState, ShaderResource};
use crate::imp::{Backend, Error};
use crate::program::ShaderProgram;
use crate::shader::reflection::ResourceCategory;
use crate::shader::stage::Stage;
use logwise::privacy::LogIt;
use std::sync::Arc;
use synchronizer::RenderTargets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    pub debug_name: String,
    pub limits: BindingLimits,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            debug_name: "CommandContext".to_string(),
            limits: BindingLimits::default(),
        }
    }
}

impl ContextConfig {
    pub fn new(debug_name: impl Into<String>) -> Self {
        ContextConfig {
            debug_name: debug_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct CommandContext<B: Backend> {
    debug_name: String,
    backend: B,
    bindings: CommandContextBindingState<B>,
    program: Option<Arc<ShaderProgram<B>>>,
    targets: RenderTargets<B>,
    counters: Counters,
}

impl<B: Backend> CommandContext<B> {
    pub fn new(backend: B, config: ContextConfig) -> Self {
        CommandContext {
            debug_name: config.debug_name,
            backend,
            bindings: CommandContextBindingState::new(config.limits),
            program: None,
            targets: RenderTargets::default(),
            counters: Counters::default(),
        }
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, for creating resources or inspecting it.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn binding_state(&self) -> &CommandContextBindingState<B> {
        &self.bindings
    }

    /**
    Binds `buffer` at global constant-buffer slot `slot`, or unbinds it for `None`.

    # Panics
    If `slot` is outside the context's limits.
    */
    pub fn set_constant_buffer(&mut self, slot: usize, buffer: Option<Arc<ConstantBuffer<B>>>) {
        self.bindings.set_constant_buffer(slot, buffer);
    }

    /// Like [`Self::set_constant_buffer`], for samplers.
    pub fn set_sampler(&mut self, slot: usize, sampler: Option<Arc<SamplerState<B>>>) {
        self.bindings.set_sampler(slot, sampler);
    }

    /// Like [`Self::set_constant_buffer`], for read-only resources.
    pub fn set_resource(&mut self, slot: usize, resource: Option<Arc<ShaderResource<B>>>) {
        self.bindings.set_resource(slot, resource);
    }

    /// Like [`Self::set_constant_buffer`], for read-write resources.
    pub fn set_rw_resource(&mut self, slot: usize, resource: Option<Arc<RWResource<B>>>) {
        self.bindings.set_rw_resource(slot, resource);
    }

    pub fn shader_program(&self) -> Option<&Arc<ShaderProgram<B>>> {
        self.program.as_ref()
    }

    /**
    Makes `program` current.

    Stages the new program has are set; stages only the previous program had are unbound.
    Every logical slot is invalidated, since slot to register mappings differ between
    programs. Setting the program that is already current does nothing.

    # Panics
    If the program uses a slot or register beyond the context's limits.
    */
    pub fn set_shader_program(&mut self, program: Option<Arc<ShaderProgram<B>>>) {
        let unchanged = match (&self.program, &program) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        if let Some(program) = &program {
            self.assert_fits(program);
        }

        for stage in Stage::ALL {
            let new_shader = program.as_ref().and_then(|p| p.stage_shader(stage));
            let had_stage = self.program.as_ref().is_some_and(|p| p.has_stage(stage));
            if new_shader.is_some() || had_stage {
                self.backend.set_stage_shader(stage, new_shader);
            }
        }

        logwise::info_sync!(
            "{context}: shader program is now {program}",
            context = LogIt(&self.debug_name),
            program = LogIt(&program.as_ref().map(|p| p.debug_name().to_string()))
        );
        self.program = program;
        self.counters.shader_change();
        self.bindings.mark_all_logical_dirty();
    }

    fn assert_fits(&self, program: &ShaderProgram<B>) {
        let limits = *self.bindings.limits();
        let metadata = program.metadata();
        for category in [
            ResourceCategory::ConstantBuffer,
            ResourceCategory::Sampler,
            ResourceCategory::Texture,
            ResourceCategory::ReadWriteResource,
        ] {
            let table = metadata.tables().table(category);
            let limit = limits.for_category(category);
            assert!(
                table.slot_span() as usize <= limit,
                "{} uses {category} slot {} but the context has {limit}",
                program.debug_name(),
                table.slot_span() - 1
            );
            for stage in Stage::ALL {
                assert!(
                    table.register_span(stage) as usize <= limit,
                    "{} uses {stage} {category} register {} but the context has {limit}",
                    program.debug_name(),
                    table.register_span(stage) - 1
                );
            }
        }
        for stage in Stage::ALL {
            if let Some(register) = metadata.uniform_block().register(stage) {
                assert!(
                    (register as usize) < limits.constant_buffers,
                    "{} places its uniform block at {stage} register {register} but the context has {}",
                    program.debug_name(),
                    limits.constant_buffers
                );
            }
        }
    }

    /// Stores color and depth targets; they reach the backend at the next synchronization.
    pub fn set_render_targets(&mut self, colors: &[Option<Arc<RenderTarget<B>>>], depth: Option<Arc<DepthTarget<B>>>) {
        self.targets.colors = colors.to_vec();
        self.targets.depth = depth;
        self.targets.dirty = true;
    }

    /// Pushes every pending binding change to the backend.
    pub fn synchronize(&mut self) -> Result<(), Error> {
        synchronizer::synchronize(
            &mut self.backend,
            &mut self.bindings,
            self.program.as_ref(),
            &mut self.targets,
        )
    }

    /**
    Synchronizes and draws. Commands that would draw nothing return at once.

    # Panics
    If no program is bound.
    */
    pub fn submit_draw(&mut self, command: DrawCommand) -> Result<(), Error> {
        if command.is_empty() {
            return Ok(());
        }
        assert!(self.program.is_some(), "{}: draw without a shader program", self.debug_name);
        self.synchronize()?;
        if let Err(error) = self.backend.draw(&command) {
            logwise::error_sync!(
                "{context}: draw failed: {error}",
                context = LogIt(&self.debug_name),
                error = LogIt(&error)
            );
            return Err(error);
        }
        self.counters.draw();
        Ok(())
    }

    pub fn draw(&mut self, first_vertex: u32, vertex_count: u32) -> Result<(), Error> {
        self.submit_draw(DrawCommand::Draw {
            first_vertex,
            vertex_count,
        })
    }

    pub fn draw_instanced(&mut self, first_vertex: u32, vertex_count: u32, instance_count: u32) -> Result<(), Error> {
        self.submit_draw(DrawCommand::DrawInstanced {
            first_vertex,
            vertex_count,
            instance_count,
        })
    }

    pub fn draw_indexed(&mut self, start_index: u32, index_count: u32, base_vertex: i32) -> Result<(), Error> {
        self.submit_draw(DrawCommand::DrawIndexed {
            start_index,
            index_count,
            base_vertex,
        })
    }

    pub fn draw_indexed_instanced(
        &mut self,
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Result<(), Error> {
        self.submit_draw(DrawCommand::DrawIndexedInstanced {
            start_index,
            index_count,
            base_vertex,
            instance_count,
        })
    }

    /**
    Synchronizes and dispatches compute work.

    # Panics
    If no program is bound.
    */
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), Error> {
        assert!(self.program.is_some(), "{}: dispatch without a shader program", self.debug_name);
        self.synchronize()?;
        if let Err(error) = self.backend.dispatch(x, y, z) {
            logwise::error_sync!(
                "{context}: dispatch failed: {error}",
                context = LogIt(&self.debug_name),
                error = LogIt(&error)
            );
            return Err(error);
        }
        self.counters.draw();
        Ok(())
    }

    /**
    Unbinds the program, releases every binding and render target, and synchronizes so the
    backend sees the unbinds.
    */
    pub fn clear_state(&mut self) -> Result<(), Error> {
        self.set_shader_program(None);
        self.bindings.release_all();
        self.targets.colors.clear();
        self.targets.depth = None;
        self.targets.dirty = true;
        self.synchronize()
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn reset_frame_counters(&mut self) {
        self.counters.reset();
    }
}

impl<B: Backend> Drop for CommandContext<B> {
    fn drop(&mut self) {
        if let Err(error) = self.clear_state() {
            logwise::warn_sync!(
                "{context}: clearing state on drop failed: {error}",
                context = LogIt(&self.debug_name),
                error = LogIt(&error)
            );
        }
    }
}
