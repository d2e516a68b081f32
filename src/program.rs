// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Loaded shader programs.

A [`ShaderProgram`] is built once from a [`ShaderCacheBlob`] and is then immutable apart from
its uniform values. Programs are shared between contexts through [`Arc`].
*/

use crate::bindings::resource::ConstantBuffer;
use crate::imp::{Backend, Error};
use crate::shader::cache_blob::{CacheCorruption, ShaderCacheBlob, validate_uniform_block};
use crate::shader::reflection::ShaderParameterType;
use crate::shader::slot_table::{ProgramSlotTables, SlotEntry, UniformBlockLayout, UniformDecl};
use crate::shader::stage::{NUM_STAGES, Stage};
use logwise::privacy::LogIt;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("corrupt shader cache blob: {0}")]
    Corrupt(#[from] CacheCorruption),
    #[error("the backend could not create the {stage} shader: {source}")]
    StageCreation {
        stage: Stage,
        #[source]
        source: Error,
    },
    #[error("the backend could not create the uniform buffer: {0}")]
    UniformBuffer(#[source] Error),
}

/**
The per-program binding metadata: slot tables, uniform block, and the sampler links in both
directions.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBindingMetadata {
    tables: ProgramSlotTables,
    uniform_block: UniformBlockLayout,
    /// For each sampler index, the resource index that links to it.
    sampler_links: Vec<Option<usize>>,
}

impl ProgramBindingMetadata {
    pub fn new(tables: ProgramSlotTables, uniform_block: UniformBlockLayout) -> Self {
        let mut sampler_links = vec![None; tables.samplers.len()];
        for (resource_index, entry) in tables.resources.entries().iter().enumerate() {
            if let Some(link) = entry.resource.linked_sampler_index
                && let Some(slot) = sampler_links.get_mut(link)
            {
                *slot = Some(resource_index);
            }
        }
        ProgramBindingMetadata {
            tables,
            uniform_block,
            sampler_links,
        }
    }

    pub fn tables(&self) -> &ProgramSlotTables {
        &self.tables
    }

    pub fn uniform_block(&self) -> &UniformBlockLayout {
        &self.uniform_block
    }

    pub fn constant_buffer_count(&self) -> usize {
        self.tables.constant_buffers.len()
    }

    pub fn constant_buffer(&self, index: usize) -> Option<&SlotEntry> {
        self.tables.constant_buffers.get(index)
    }

    pub fn constant_buffer_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.tables.constant_buffers.find(name).map(|(_, e)| e)
    }

    pub fn sampler_count(&self) -> usize {
        self.tables.samplers.len()
    }

    pub fn sampler(&self, index: usize) -> Option<&SlotEntry> {
        self.tables.samplers.get(index)
    }

    pub fn sampler_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.tables.samplers.find(name).map(|(_, e)| e)
    }

    pub fn resource_count(&self) -> usize {
        self.tables.resources.len()
    }

    pub fn resource(&self, index: usize) -> Option<&SlotEntry> {
        self.tables.resources.get(index)
    }

    pub fn resource_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.tables.resources.find(name).map(|(_, e)| e)
    }

    pub fn rw_resource_count(&self) -> usize {
        self.tables.rw_resources.len()
    }

    pub fn rw_resource(&self, index: usize) -> Option<&SlotEntry> {
        self.tables.rw_resources.get(index)
    }

    pub fn rw_resource_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.tables.rw_resources.find(name).map(|(_, e)| e)
    }

    /// The sampler entry a resource is paired with.
    pub fn linked_sampler(&self, resource_index: usize) -> Option<&SlotEntry> {
        self.resource(resource_index)
            .and_then(|e| e.resource.linked_sampler_index)
            .and_then(|i| self.sampler(i))
    }

    /// The index of the resource that links to sampler `sampler_index`, if any.
    pub fn resource_for_sampler(&self, sampler_index: usize) -> Option<usize> {
        self.sampler_links.get(sampler_index).copied().flatten()
    }
}

#[derive(Debug)]
struct UniformStorage {
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformStorage {
    /// Copies `value` to `offset`, returning whether any byte changed.
    fn write(&mut self, offset: usize, value: &[u8]) -> bool {
        let target = &mut self.bytes[offset..offset + value.len()];
        if target == value {
            return false;
        }
        target.copy_from_slice(value);
        self.dirty = true;
        true
    }
}

/// A program ready to bind: native per-stage shaders plus its binding metadata.
#[derive(Debug)]
pub struct ShaderProgram<B: Backend> {
    debug_name: String,
    metadata: ProgramBindingMetadata,
    stage_shaders: [Option<B::StageShader>; NUM_STAGES],
    uniform_buffer: Option<Arc<ConstantBuffer<B>>>,
    uniforms: Mutex<UniformStorage>,
}

impl<B: Backend> ShaderProgram<B> {
    /// Parses a cache blob and creates the program's native objects.
    pub fn load(backend: &mut B, bytes: &[u8], debug_name: &str) -> Result<Self, ProgramError> {
        let blob = ShaderCacheBlob::from_bytes(bytes)?;
        Self::from_blob(backend, blob, debug_name)
    }

    /// Creates the program's native objects from an already parsed blob.
    pub fn from_blob(backend: &mut B, blob: ShaderCacheBlob, debug_name: &str) -> Result<Self, ProgramError> {
        validate_uniform_block(&blob.uniform_block)?;
        let mut stage_shaders: [Option<B::StageShader>; NUM_STAGES] = Default::default();
        for stage in Stage::ALL {
            let bytecode = &blob.stage_bytecode[stage.index()];
            if bytecode.is_empty() {
                continue;
            }
            let shader = backend
                .create_stage_shader(stage, bytecode, debug_name)
                .map_err(|source| ProgramError::StageCreation { stage, source })?;
            stage_shaders[stage.index()] = Some(shader);
        }

        let block = blob.uniform_block;
        let uniform_buffer = if block.is_empty() {
            None
        } else {
            let name = format!("{debug_name}.$Globals");
            let native = backend
                .create_uniform_buffer(block.size, &name)
                .map_err(ProgramError::UniformBuffer)?;
            Some(Arc::new(ConstantBuffer::new(native, block.size, name)))
        };
        let uniforms = Mutex::new(UniformStorage {
            bytes: vec![0; block.size as usize],
            dirty: false,
        });

        let metadata = ProgramBindingMetadata::new(blob.tables, block);
        logwise::info_sync!(
            "Loaded program {name}: {stages} stages, {cbs} constant buffers, {samplers} samplers, {resources} resources, {rw} rw resources, {uniforms} uniforms",
            name = LogIt(&debug_name),
            stages = stage_shaders.iter().filter(|s| s.is_some()).count(),
            cbs = metadata.constant_buffer_count(),
            samplers = metadata.sampler_count(),
            resources = metadata.resource_count(),
            rw = metadata.rw_resource_count(),
            uniforms = metadata.uniform_block().uniforms.len()
        );
        Ok(ShaderProgram {
            debug_name: debug_name.to_string(),
            metadata,
            stage_shaders,
            uniform_buffer,
            uniforms,
        })
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn metadata(&self) -> &ProgramBindingMetadata {
        &self.metadata
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stage_shaders[stage.index()].is_some()
    }

    pub fn stage_shader(&self, stage: Stage) -> Option<&B::StageShader> {
        self.stage_shaders[stage.index()].as_ref()
    }

    /// The constant buffer backing the uniform block, if the program has loose uniforms.
    pub fn uniform_buffer(&self) -> Option<&Arc<ConstantBuffer<B>>> {
        self.uniform_buffer.as_ref()
    }

    pub fn uniform_count(&self) -> usize {
        self.metadata.uniform_block.uniforms.len()
    }

    pub fn uniform(&self, index: usize) -> Option<&UniformDecl> {
        self.metadata.uniform_block.uniforms.get(index)
    }

    pub fn uniform_by_name(&self, name: &str) -> Option<(usize, &UniformDecl)> {
        let index = self.metadata.uniform_block.find(name)?;
        Some((index, &self.metadata.uniform_block.uniforms[index]))
    }

    fn checked_uniform(&self, index: usize, ty: ShaderParameterType) -> &UniformDecl {
        let uniform = self
            .uniform(index)
            .unwrap_or_else(|| panic!("{} has no uniform {index}", self.debug_name));
        assert_eq!(
            uniform.ty, ty,
            "uniform '{}' of {} has type {:?}, not {:?}",
            uniform.name, self.debug_name, uniform.ty, ty
        );
        uniform
    }

    /**
    Writes the first element of uniform `index`. Returns whether the value changed.

    # Panics
    If there is no such uniform, `ty` is not its type, or `value` is not one element long.
    */
    pub fn set_uniform(&self, index: usize, ty: ShaderParameterType, value: &[u8]) -> bool {
        let uniform = self.checked_uniform(index, ty);
        let size = uniform.element_size() as usize;
        assert_eq!(value.len(), size, "uniform '{}' takes {size} bytes", uniform.name);
        let mut storage = self.uniforms.lock().unwrap_or_else(|e| e.into_inner());
        storage.write(uniform.buffer_offset as usize, value)
    }

    /**
    Writes `count` consecutive elements of array uniform `index`, starting at `first`.
    Returns whether any element changed, and `false` without writing when the elements run
    past the array.

    `values` holds the elements tightly packed; each is placed at its array stride.

    # Panics
    If there is no such uniform, `ty` is not its type, or `values` is not `count` elements
    long.
    */
    pub fn set_uniform_array(
        &self,
        index: usize,
        ty: ShaderParameterType,
        values: &[u8],
        first: u32,
        count: u32,
    ) -> bool {
        let uniform = self.checked_uniform(index, ty);
        let in_array = first.checked_add(count).is_some_and(|end| end <= uniform.array_size.max(1));
        if count == 0 || !in_array {
            return false;
        }
        let size = uniform.element_size() as usize;
        assert_eq!(
            values.len(),
            size * count as usize,
            "{count} elements of '{}' take {} bytes",
            uniform.name,
            size * count as usize
        );
        let stride = uniform.stride() as usize;

        let mut storage = self.uniforms.lock().unwrap_or_else(|e| e.into_inner());
        let mut changed = false;
        for (i, element) in values.chunks_exact(size).enumerate() {
            let offset = uniform.buffer_offset as usize + (first as usize + i) * stride;
            changed |= storage.write(offset, element);
        }
        changed
    }

    /// A copy of the CPU-side uniform block.
    pub fn uniform_bytes(&self) -> Vec<u8> {
        self.uniforms.lock().unwrap_or_else(|e| e.into_inner()).bytes.clone()
    }

    pub fn uniforms_dirty(&self) -> bool {
        self.uniforms.lock().unwrap_or_else(|e| e.into_inner()).dirty
    }

    /// Pushes the uniform block to its buffer if it changed since the last upload.
    pub(crate) fn upload_uniforms(&self, backend: &mut B) -> Result<(), Error> {
        let Some(buffer) = &self.uniform_buffer else {
            return Ok(());
        };
        let mut storage = self.uniforms.lock().unwrap_or_else(|e| e.into_inner());
        if storage.dirty {
            backend.write_buffer(buffer.native(), &storage.bytes)?;
            storage.dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::nop::{BackendCall, NopBackend};
    use crate::shader::reflection::{ReflectedResource, ResourceCategory, ResourceType};
    use crate::shader::slot_table::BindingSlotTable;

    fn blob() -> ShaderCacheBlob {
        let mut blob = ShaderCacheBlob::default();
        blob.stage_bytecode[Stage::Vertex.index()] = vec![1, 2, 3];
        blob.stage_bytecode[Stage::Fragment.index()] = vec![4, 5];
        blob.uniform_block = UniformBlockLayout {
            size: 64,
            stage_registers: [Some(0), None, None, None, Some(1), None],
            uniforms: vec![
                UniformDecl {
                    name: "Tint".to_string(),
                    ty: ShaderParameterType::Float4,
                    array_size: 1,
                    array_stride: 16,
                    buffer_offset: 0,
                },
                UniformDecl {
                    name: "Weights".to_string(),
                    ty: ShaderParameterType::Float,
                    array_size: 3,
                    array_stride: 16,
                    buffer_offset: 16,
                },
            ],
        };
        blob.tables.samplers = BindingSlotTable::from_entries(
            ResourceCategory::Sampler,
            vec![SlotEntry {
                resource: ReflectedResource::new("DiffuseMap_SamplerState", ResourceCategory::Sampler)
                    .with_register(Stage::Fragment, 0),
                global_slot: 0,
            }],
        );
        let mut diffuse = ReflectedResource::new("DiffuseMap", ResourceCategory::Texture)
            .with_register(Stage::Fragment, 0)
            .with_resource_type(ResourceType::Texture2D);
        diffuse.linked_sampler_index = Some(0);
        blob.tables.resources = BindingSlotTable::from_entries(
            ResourceCategory::Texture,
            vec![SlotEntry {
                resource: diffuse,
                global_slot: 0,
            }],
        );
        blob
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn load_creates_one_shader_per_present_stage() {
        let mut backend = NopBackend::new();
        let bytes = blob().to_bytes();
        let program = ShaderProgram::load(&mut backend, &bytes, "Lit").unwrap();
        assert!(program.has_stage(Stage::Vertex));
        assert!(!program.has_stage(Stage::Hull));
        assert_eq!(
            backend.calls(),
            &[
                BackendCall::CreateStageShader {
                    stage: Stage::Vertex,
                    debug_name: "Lit.vertex".to_string(),
                    bytecode_len: 3
                },
                BackendCall::CreateStageShader {
                    stage: Stage::Fragment,
                    debug_name: "Lit.fragment".to_string(),
                    bytecode_len: 2
                },
                BackendCall::CreateUniformBuffer {
                    size: 64,
                    debug_name: "Lit.$Globals".to_string()
                },
            ]
        );
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn corrupt_blobs_are_rejected() {
        let mut backend = NopBackend::new();
        let err = ShaderProgram::load(&mut backend, &[0, 1, 2, 3], "Broken").unwrap_err();
        assert!(matches!(err, ProgramError::Corrupt(CacheCorruption::Signature { .. })));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn stage_creation_failures_name_the_stage() {
        let mut backend = NopBackend::new();
        backend.fail_next_call(Error::OutOfMemory);
        let err = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap_err();
        assert!(matches!(
            err,
            ProgramError::StageCreation {
                stage: Stage::Vertex,
                source: Error::OutOfMemory
            }
        ));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn metadata_lookups() {
        let mut backend = NopBackend::new();
        let program = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap();
        let metadata = program.metadata();
        assert_eq!(metadata.resource_by_name("DiffuseMap").unwrap().global_slot, 0);
        assert!(metadata.resource_by_name("diffusemap").is_none());
        assert_eq!(
            metadata.linked_sampler(0).unwrap().name(),
            "DiffuseMap_SamplerState"
        );
        assert_eq!(metadata.resource_for_sampler(0), Some(0));
        assert_eq!(metadata.resource_for_sampler(1), None);
        assert_eq!(program.uniform_by_name("Weights").unwrap().0, 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn uniforms_mark_dirty_only_on_change() {
        let mut backend = NopBackend::new();
        let program = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap();
        let tint: Vec<u8> = [1.0f32, 0.5, 0.25, 1.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        assert!(program.set_uniform(0, ShaderParameterType::Float4, &tint));
        assert!(program.uniforms_dirty());

        backend.take_calls();
        program.upload_uniforms(&mut backend).unwrap();
        assert!(!program.uniforms_dirty());
        assert_eq!(backend.calls().len(), 1);

        assert!(!program.set_uniform(0, ShaderParameterType::Float4, &tint));
        assert!(!program.uniforms_dirty());
        program.upload_uniforms(&mut backend).unwrap();
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn array_elements_land_on_their_stride() {
        let mut backend = NopBackend::new();
        let program = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap();
        let values: Vec<u8> = [2.0f32, 3.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        assert!(program.set_uniform_array(1, ShaderParameterType::Float, &values, 1, 2));
        let bytes = program.uniform_bytes();
        assert_eq!(&bytes[32..36], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[48..52], &3.0f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &[0; 4]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[should_panic(expected = "not Float4")]
    fn mismatched_uniform_types_panic() {
        let mut backend = NopBackend::new();
        let program = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap();
        program.set_uniform(1, ShaderParameterType::Float4, &[0; 16]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn array_writes_past_the_end_are_refused() {
        let mut backend = NopBackend::new();
        let program = ShaderProgram::from_blob(&mut backend, blob(), "Lit").unwrap();
        assert!(!program.set_uniform_array(1, ShaderParameterType::Float, &[1; 8], 2, 2));
        assert!(!program.set_uniform_array(1, ShaderParameterType::Float, &[1; 8], u32::MAX, 2));
        assert!(!program.set_uniform_array(1, ShaderParameterType::Float, &[], 0, 0));
        assert!(!program.uniforms_dirty());
        assert!(program.uniform_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn uniforms_outside_the_block_are_rejected_before_any_backend_call() {
        let mut backend = NopBackend::new();
        let mut blob = blob();
        blob.uniform_block.uniforms[1].buffer_offset = 40;
        let err = ShaderProgram::from_blob(&mut backend, blob, "Lit").unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Corrupt(CacheCorruption::UniformOutOfBlock { end: 76, size: 64, .. })
        ));
        assert!(backend.calls().is_empty());
    }
}
