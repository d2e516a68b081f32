// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Per-context binding state.

Callers write *logical* arrays, one per category, indexed by global slot. Synchronization
translates those into *physical* arrays, one per stage and category, indexed by native
register, and pushes the physical changes to the backend. Every array tracks its own dirty
range.

The state is owned by a single command context and is never shared.
*/

use crate::bindings::binding_array::BindingArray;
use crate::bindings::resource::{ConstantBuffer, RWResource, SamplerState, ShaderResource};
use crate::imp::Backend;
use crate::shader::reflection::ResourceCategory;
use crate::shader::stage::{NUM_STAGES, Stage};
use std::sync::Arc;

/// How many slots each category has, both logically and in every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingLimits {
    pub constant_buffers: usize,
    pub samplers: usize,
    pub resources: usize,
    pub rw_resources: usize,
}

impl Default for BindingLimits {
    /// Direct3D 11 per-stage register counts.
    fn default() -> Self {
        BindingLimits {
            constant_buffers: 14,
            samplers: 16,
            resources: 128,
            rw_resources: 8,
        }
    }
}

impl BindingLimits {
    pub fn for_category(&self, category: ResourceCategory) -> usize {
        match category {
            ResourceCategory::ConstantBuffer => self.constant_buffers,
            ResourceCategory::Sampler => self.samplers,
            ResourceCategory::Texture => self.resources,
            ResourceCategory::ReadWriteResource => self.rw_resources,
        }
    }
}

/// The physical arrays of one stage.
#[derive(Debug)]
pub struct StageBindings<B: Backend> {
    pub constant_buffers: BindingArray<ConstantBuffer<B>>,
    pub samplers: BindingArray<SamplerState<B>>,
    pub resources: BindingArray<ShaderResource<B>>,
    pub uavs: BindingArray<RWResource<B>>,
}

impl<B: Backend> StageBindings<B> {
    fn new(limits: &BindingLimits) -> Self {
        StageBindings {
            constant_buffers: BindingArray::new(limits.constant_buffers),
            samplers: BindingArray::new(limits.samplers),
            resources: BindingArray::new(limits.resources),
            uavs: BindingArray::new(limits.rw_resources),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.constant_buffers.dirty().is_dirty()
            || self.samplers.dirty().is_dirty()
            || self.resources.dirty().is_dirty()
            || self.uavs.dirty().is_dirty()
    }

    /// Drops every binding, marking what was bound dirty so the backend sees the unbinds.
    fn release_all(&mut self) {
        self.constant_buffers.mark_bound_dirty();
        self.constant_buffers.release_all();
        self.samplers.mark_bound_dirty();
        self.samplers.release_all();
        self.resources.mark_bound_dirty();
        self.resources.release_all();
        self.uavs.mark_bound_dirty();
        self.uavs.release_all();
    }
}

#[derive(Debug)]
pub struct CommandContextBindingState<B: Backend> {
    limits: BindingLimits,
    pub(crate) constant_buffers: BindingArray<ConstantBuffer<B>>,
    pub(crate) samplers: BindingArray<SamplerState<B>>,
    pub(crate) resources: BindingArray<ShaderResource<B>>,
    pub(crate) rw_resources: BindingArray<RWResource<B>>,
    pub(crate) stages: [StageBindings<B>; NUM_STAGES],
}

impl<B: Backend> CommandContextBindingState<B> {
    pub fn new(limits: BindingLimits) -> Self {
        CommandContextBindingState {
            limits,
            constant_buffers: BindingArray::new(limits.constant_buffers),
            samplers: BindingArray::new(limits.samplers),
            resources: BindingArray::new(limits.resources),
            rw_resources: BindingArray::new(limits.rw_resources),
            stages: std::array::from_fn(|_| StageBindings::new(&limits)),
        }
    }

    pub fn limits(&self) -> &BindingLimits {
        &self.limits
    }

    pub fn set_constant_buffer(&mut self, slot: usize, buffer: Option<Arc<ConstantBuffer<B>>>) -> bool {
        self.constant_buffers.set(slot, buffer)
    }

    pub fn set_sampler(&mut self, slot: usize, sampler: Option<Arc<SamplerState<B>>>) -> bool {
        self.samplers.set(slot, sampler)
    }

    pub fn set_resource(&mut self, slot: usize, resource: Option<Arc<ShaderResource<B>>>) -> bool {
        self.resources.set(slot, resource)
    }

    pub fn set_rw_resource(&mut self, slot: usize, resource: Option<Arc<RWResource<B>>>) -> bool {
        self.rw_resources.set(slot, resource)
    }

    pub fn constant_buffers(&self) -> &BindingArray<ConstantBuffer<B>> {
        &self.constant_buffers
    }

    pub fn samplers(&self) -> &BindingArray<SamplerState<B>> {
        &self.samplers
    }

    pub fn resources(&self) -> &BindingArray<ShaderResource<B>> {
        &self.resources
    }

    pub fn rw_resources(&self) -> &BindingArray<RWResource<B>> {
        &self.rw_resources
    }

    pub fn stage(&self, stage: Stage) -> &StageBindings<B> {
        &self.stages[stage.index()]
    }

    /// Whether any logical array has changes not yet translated.
    pub fn logical_dirty(&self) -> bool {
        self.constant_buffers.dirty().is_dirty()
            || self.samplers.dirty().is_dirty()
            || self.resources.dirty().is_dirty()
            || self.rw_resources.dirty().is_dirty()
    }

    /// Invalidates every logical slot, as when the program changes.
    pub fn mark_all_logical_dirty(&mut self) {
        self.constant_buffers.mark_all_dirty();
        self.samplers.mark_all_dirty();
        self.resources.mark_all_dirty();
        self.rw_resources.mark_all_dirty();
    }

    /// Releases every logical and physical binding and marks the affected ranges dirty.
    pub fn release_all(&mut self) {
        self.constant_buffers.release_all();
        self.samplers.release_all();
        self.resources.release_all();
        self.rw_resources.release_all();
        self.mark_all_logical_dirty();
        for stage in &mut self.stages {
            stage.release_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::nop::NopBackend;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn logical_writes_track_dirty_spans() {
        let mut state = CommandContextBindingState::<NopBackend>::new(BindingLimits::default());
        assert!(!state.logical_dirty());
        let texture = NopBackend::texture("Grass", None);
        assert!(state.set_resource(9, Some(texture.clone())));
        assert!(state.set_resource(3, Some(texture.clone())));
        assert_eq!(state.resources().dirty().span(), Some(3..=9));
        assert!(!state.samplers().dirty().is_dirty());
        assert!(state.logical_dirty());
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn release_all_drops_every_reference() {
        let mut state = CommandContextBindingState::<NopBackend>::new(BindingLimits::default());
        let buffer = NopBackend::constant_buffer("Lights", 256);
        state.set_constant_buffer(0, Some(buffer.clone()));
        state.stages[Stage::Fragment.index()]
            .constant_buffers
            .set(4, Some(buffer.clone()));
        state.stages[Stage::Fragment.index()].constant_buffers.refresh_bound_count();
        state.stages[Stage::Fragment.index()].constant_buffers.clear_dirty();
        assert_eq!(Arc::strong_count(&buffer), 3);

        state.release_all();
        assert_eq!(Arc::strong_count(&buffer), 1);
        assert_eq!(state.constant_buffers().dirty().span(), Some(0..=13));
        assert_eq!(
            state.stage(Stage::Fragment).constant_buffers.dirty().span(),
            Some(0..=4)
        );
        assert!(!state.stage(Stage::Vertex).is_dirty());
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[should_panic(expected = "out of range")]
    fn slots_beyond_the_limits_panic() {
        let mut state = CommandContextBindingState::<NopBackend>::new(BindingLimits::default());
        state.set_rw_resource(8, None);
    }
}
