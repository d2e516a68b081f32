// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pushes pending binding changes to the backend.

Synchronization runs in three steps:

1. Upload the bound program's uniform block if it changed, and place its buffer in each
   stage's constant-buffer array at the block's register.
2. Translate the dirty span of every logical array into physical writes, using the bound
   program's slot tables. Physical arrays only turn dirty where a value actually changed.
3. For each stage, send the dirty span of each physical array to the backend in one call.

A backend failure stops synchronization at once. Whatever was not yet sent stays dirty, so
the next synchronization retries it.
*/

use crate::bindings::binding_array::BindingArray;
use crate::bindings::binding_state::CommandContextBindingState;
use crate::bindings::resource::{DepthTarget, RenderTarget, SamplerState};
use crate::imp::{Backend, Error};
use crate::program::ShaderProgram;
use crate::shader::stage::Stage;
use logwise::privacy::LogIt;
use std::sync::Arc;

/// Color and depth targets, applied lazily together with the fragment stage's UAVs.
#[derive(Debug)]
pub(crate) struct RenderTargets<B: Backend> {
    pub(crate) colors: Vec<Option<Arc<RenderTarget<B>>>>,
    pub(crate) depth: Option<Arc<DepthTarget<B>>>,
    pub(crate) dirty: bool,
}

impl<B: Backend> Default for RenderTargets<B> {
    fn default() -> Self {
        RenderTargets {
            colors: Vec::new(),
            depth: None,
            dirty: false,
        }
    }
}

pub(crate) fn synchronize<B: Backend>(
    backend: &mut B,
    state: &mut CommandContextBindingState<B>,
    program: Option<&Arc<ShaderProgram<B>>>,
    targets: &mut RenderTargets<B>,
) -> Result<(), Error> {
    if let Some(program) = program {
        if let Err(error) = program.upload_uniforms(backend) {
            logwise::error_sync!(
                "Uploading uniforms of {program} failed: {error}",
                program = LogIt(&program.debug_name()),
                error = LogIt(&error)
            );
            return Err(error);
        }
        bind_uniform_buffer(state, program);
        translate(state, program);
    }
    flush(backend, state, targets)
}

fn bind_uniform_buffer<B: Backend>(state: &mut CommandContextBindingState<B>, program: &ShaderProgram<B>) {
    let Some(buffer) = program.uniform_buffer() else {
        return;
    };
    let block = program.metadata().uniform_block();
    for stage in Stage::ALL {
        if let Some(register) = block.register(stage) {
            state.stages[stage.index()]
                .constant_buffers
                .set(register as usize, Some(buffer.clone()));
        }
    }
}

/// Writes the logical dirty spans into the physical arrays and clears them.
fn translate<B: Backend>(state: &mut CommandContextBindingState<B>, program: &ShaderProgram<B>) {
    let metadata = program.metadata();
    let tables = metadata.tables();

    if let Some(span) = state.constant_buffers.dirty().span() {
        logwise::trace_sync!(
            "Translating constant buffer slots {first}..={last}",
            first = *span.start(),
            last = *span.end()
        );
        for (_, entry) in tables.constant_buffers.entries_in_slots(*span.start(), *span.end()) {
            let value = state.constant_buffers.get(entry.global_slot as usize).cloned();
            for (stage, register) in entry.resource.used_stages() {
                state.stages[stage.index()]
                    .constant_buffers
                    .set(register as usize, value.clone());
            }
        }
        state.constant_buffers.clear_dirty();
    }

    if let Some(span) = state.samplers.dirty().span() {
        logwise::trace_sync!(
            "Translating sampler slots {first}..={last}",
            first = *span.start(),
            last = *span.end()
        );
        for (index, entry) in tables.samplers.entries_in_slots(*span.start(), *span.end()) {
            let linked_resource = metadata
                .resource_for_sampler(index)
                .and_then(|r| metadata.resource(r))
                .map(|r| r.global_slot as usize);
            let value = effective_sampler(state, entry.global_slot as usize, linked_resource);
            for (stage, register) in entry.resource.used_stages() {
                state.stages[stage.index()].samplers.set(register as usize, value.clone());
            }
        }
        state.samplers.clear_dirty();
    }

    if let Some(span) = state.resources.dirty().span() {
        logwise::trace_sync!(
            "Translating resource slots {first}..={last}",
            first = *span.start(),
            last = *span.end()
        );
        for (index, entry) in tables.resources.entries_in_slots(*span.start(), *span.end()) {
            let value = state.resources.get(entry.global_slot as usize).cloned();
            for (stage, register) in entry.resource.used_stages() {
                state.stages[stage.index()].resources.set(register as usize, value.clone());
            }
            // The paired sampler follows the texture when no sampler is explicitly bound.
            if let Some(sampler) = metadata.linked_sampler(index) {
                let effective = effective_sampler(
                    state,
                    sampler.global_slot as usize,
                    Some(entry.global_slot as usize),
                );
                for (stage, register) in sampler.resource.used_stages() {
                    state.stages[stage.index()].samplers.set(register as usize, effective.clone());
                }
            }
        }
        state.resources.clear_dirty();
    }

    if let Some(span) = state.rw_resources.dirty().span() {
        logwise::trace_sync!(
            "Translating rw resource slots {first}..={last}",
            first = *span.start(),
            last = *span.end()
        );
        for (_, entry) in tables.rw_resources.entries_in_slots(*span.start(), *span.end()) {
            let value = state.rw_resources.get(entry.global_slot as usize).cloned();
            for (stage, register) in entry.resource.used_stages() {
                state.stages[stage.index()].uavs.set(register as usize, value.clone());
            }
        }
        state.rw_resources.clear_dirty();
    }
}

/**
The sampler a linked sampler slot resolves to: the explicitly bound sampler if any, else the
default sampler of the texture bound in the linked resource slot.
*/
fn effective_sampler<B: Backend>(
    state: &CommandContextBindingState<B>,
    sampler_slot: usize,
    linked_resource_slot: Option<usize>,
) -> Option<Arc<SamplerState<B>>> {
    state.samplers.get(sampler_slot).cloned().or_else(|| {
        linked_resource_slot
            .and_then(|slot| state.resources.get(slot))
            .and_then(|texture| texture.default_sampler().cloned())
    })
}

/// Sends one physical array's dirty span through `bind`, clearing it only on success.
fn flush_array<T>(
    stage: Stage,
    what: &'static str,
    array: &mut BindingArray<T>,
    bind: impl FnOnce(u32, &[Option<Arc<T>>]) -> Result<(), Error>,
) -> Result<(), Error> {
    array.refresh_bound_count();
    let Some((first, slice)) = array.dirty_slice() else {
        return Ok(());
    };
    logwise::trace_sync!(
        "Binding {count} {what} to {stage} at register {first}",
        count = slice.len(),
        what = what,
        stage = LogIt(&stage),
        first = first
    );
    if let Err(error) = bind(first as u32, slice) {
        logwise::error_sync!(
            "Binding {what} to {stage} failed: {error}",
            what = what,
            stage = LogIt(&stage),
            error = LogIt(&error)
        );
        return Err(error);
    }
    array.clear_dirty();
    Ok(())
}

fn flush<B: Backend>(
    backend: &mut B,
    state: &mut CommandContextBindingState<B>,
    targets: &mut RenderTargets<B>,
) -> Result<(), Error> {
    for stage in Stage::ALL {
        let physical = &mut state.stages[stage.index()];
        flush_array(stage, "constant buffers", &mut physical.constant_buffers, |first, slice| {
            backend.bind_constant_buffers(stage, first, slice)
        })?;
        flush_array(stage, "resources", &mut physical.resources, |first, slice| {
            backend.bind_shader_resources(stage, first, slice)
        })?;
        flush_array(stage, "samplers", &mut physical.samplers, |first, slice| {
            backend.bind_samplers(stage, first, slice)
        })?;

        if stage == Stage::Fragment {
            let uavs = &mut physical.uavs;
            uavs.refresh_bound_count();
            if uavs.dirty().is_dirty() || targets.dirty {
                let bound = &uavs.slots()[..uavs.bound_count()];
                logwise::trace_sync!(
                    "Binding {colors} render targets and {count} fragment UAVs",
                    colors = targets.colors.len(),
                    count = bound.len()
                );
                if let Err(error) =
                    backend.bind_render_targets_and_uavs(&targets.colors, targets.depth.as_ref(), 0, bound)
                {
                    logwise::error_sync!(
                        "Binding render targets failed: {error}",
                        error = LogIt(&error)
                    );
                    return Err(error);
                }
                uavs.clear_dirty();
                targets.dirty = false;
            }
        } else {
            flush_array(stage, "UAVs", &mut physical.uavs, |first, slice| {
                backend.bind_unordered_access_views(stage, first, slice)
            })?;
        }
    }
    Ok(())
}
