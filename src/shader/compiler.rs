// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Turns per-stage bytecode into a [`ShaderCacheBlob`].

Source compilation happens elsewhere; this step reflects each present stage, merges the
results across stages, allocates global slots, links samplers and packages everything up.
*/

use crate::shader::cache_blob::{ShaderCacheBlob, validate_uniform_block};
use crate::shader::reflection::{
    GLOBALS_NAME, GlobalConstantBufferLayout, InputKind, MergedResources, ReflectionError, ResourceCategory,
    ShaderParameterType, ShaderReflector, UniformVariable, VariableClass,
};
use crate::shader::sampler_linker::link_samplers;
use crate::shader::slot_allocator::allocate;
use crate::shader::slot_table::{ProgramSlotTables, UniformBlockLayout, UniformDecl};
use crate::shader::stage::{NUM_STAGES, Stage};
use logwise::privacy::LogIt;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Used in log lines.
    pub debug_name: String,
}

impl CompileOptions {
    pub fn new(debug_name: impl Into<String>) -> Self {
        CompileOptions {
            debug_name: debug_name.into(),
        }
    }
}

/// Derives the declaration of one reflected uniform, including its array layout.
pub fn uniform_decl(variable: &UniformVariable) -> Result<UniformDecl, ReflectionError> {
    let desc = &variable.type_desc;
    let (ty, element_size) = if desc.class == VariableClass::Struct {
        // columns counts the struct's size in floats
        (ShaderParameterType::Struct, desc.columns * 4)
    } else {
        let ty = ShaderParameterType::from_type_desc(desc).ok_or_else(|| ReflectionError::UnmappableUniformType {
            name: variable.name.clone(),
            desc: *desc,
        })?;
        (ty, ty.value_size())
    };

    let array_size = desc.elements.max(1);
    let mut array_stride = element_size;
    if array_stride * array_size != variable.size {
        // Array rows are aligned to 16 bytes, except the last element.
        let inconsistent = |stride: u32| ReflectionError::InconsistentUniformStride {
            name: variable.name.clone(),
            ty,
            stride,
            array_size,
            size: variable.size,
        };
        if !ty.pads_to_row() {
            return Err(inconsistent(array_stride));
        }
        array_stride = 16;
        if array_stride * (array_size - 1) + ty.value_size() != variable.size {
            return Err(inconsistent(array_stride));
        }
    }

    Ok(UniformDecl {
        name: variable.name.clone(),
        ty,
        array_size,
        array_stride,
        buffer_offset: variable.start_offset,
    })
}

/**
Merges one stage's `$Globals` layout into `block`.

`register` is where the stage binds the block; without it the stage's size isn't counted,
but its variables still are. Variables the stage never reads are skipped, and a name already
declared by an earlier stage keeps its first declaration.
*/
pub fn merge_uniform_block(
    block: &mut UniformBlockLayout,
    stage: Stage,
    register: Option<u32>,
    layout: &GlobalConstantBufferLayout,
) -> Result<(), ReflectionError> {
    if let Some(register) = register {
        block.size = block.size.max(layout.size);
        block.stage_registers[stage.index()] = Some(register);
    }
    for variable in layout.variables.iter().filter(|v| v.used) {
        if block.find(&variable.name).is_some() {
            continue;
        }
        block.uniforms.push(uniform_decl(variable)?);
    }
    Ok(())
}

/**
Builds a program from per-stage bytecode.

```
use shaders_and_slots::shader::compiler::{CompileOptions, ProgramCompiler};
use shaders_and_slots::shader::reflection::{InputDimension, RawInputBinding, StaticReflector};
use shaders_and_slots::shader::stage::Stage;

let reflector = StaticReflector::new().with_bindings(
    Stage::Fragment,
    vec![RawInputBinding::texture("Albedo", InputDimension::Texture2D, 0)],
);
let blob = ProgramCompiler::new(&reflector, CompileOptions::new("sprite"))
    .with_stage(Stage::Fragment, b"ps".to_vec())
    .compile()
    .unwrap();
assert_eq!(blob.tables.resources.len(), 1);
```
*/
#[derive(Debug)]
pub struct ProgramCompiler<'r, R> {
    reflector: &'r R,
    options: CompileOptions,
    stage_bytecode: [Vec<u8>; NUM_STAGES],
}

impl<'r, R: ShaderReflector> ProgramCompiler<'r, R> {
    pub fn new(reflector: &'r R, options: CompileOptions) -> Self {
        ProgramCompiler {
            reflector,
            options,
            stage_bytecode: Default::default(),
        }
    }

    pub fn with_stage(mut self, stage: Stage, bytecode: Vec<u8>) -> Self {
        self.stage_bytecode[stage.index()] = bytecode;
        self
    }

    pub fn compile(self) -> Result<ShaderCacheBlob, ReflectionError> {
        let mut merged = MergedResources::new();
        let mut uniform_block = UniformBlockLayout::default();

        for stage in Stage::ALL {
            let bytecode = &self.stage_bytecode[stage.index()];
            if bytecode.is_empty() {
                continue;
            }
            let bindings = self.reflector.list_resources(stage, bytecode)?;
            if let Some(layout) = self.reflector.global_constant_buffer_layout(stage, bytecode)? {
                let register = bindings
                    .iter()
                    .find(|b| b.kind == InputKind::ConstantBuffer && b.name == GLOBALS_NAME)
                    .map(|b| b.register);
                merge_uniform_block(&mut uniform_block, stage, register, &layout)?;
            }
            merged.add_stage(stage, &bindings)?;
        }
        validate_uniform_block(&uniform_block)?;

        let MergedResources {
            constant_buffers,
            samplers,
            resources,
            rw_resources,
        } = merged;
        let mut tables = ProgramSlotTables {
            constant_buffers: allocate(ResourceCategory::ConstantBuffer, constant_buffers),
            samplers: allocate(ResourceCategory::Sampler, samplers),
            resources: allocate(ResourceCategory::Texture, resources),
            rw_resources: allocate(ResourceCategory::ReadWriteResource, rw_resources),
        };
        link_samplers(&mut tables.resources, &tables.samplers);

        let blob = ShaderCacheBlob {
            stage_bytecode: self.stage_bytecode,
            uniform_block,
            tables,
        };
        log_program(&self.options.debug_name, &blob);
        Ok(blob)
    }
}

fn log_program(debug_name: &str, blob: &ShaderCacheBlob) {
    logwise::info_sync!(
        "Compiled program {name}: {uniforms} uniforms, {cbs} constant buffers, {samplers} samplers, {resources} resources, {rw} rw resources",
        name = LogIt(&debug_name),
        uniforms = blob.uniform_block.uniforms.len(),
        cbs = blob.tables.constant_buffers.len(),
        samplers = blob.tables.samplers.len(),
        resources = blob.tables.resources.len(),
        rw = blob.tables.rw_resources.len()
    );
    for (i, uniform) in blob.uniform_block.uniforms.iter().enumerate() {
        logwise::info_sync!(
            "Shader Uniform [{i}] : {name}, type {ty}",
            i = i,
            name = LogIt(&uniform.name),
            ty = LogIt(&uniform.ty)
        );
    }
    for (i, entry) in blob.tables.constant_buffers.entries().iter().enumerate() {
        logwise::info_sync!(
            "Shader Constant Buffer [{i}] : {name}, {size} bytes, slot {slot}",
            i = i,
            name = LogIt(&entry.name()),
            size = entry.resource.byte_size,
            slot = entry.global_slot
        );
    }
    for (i, entry) in blob.tables.samplers.entries().iter().enumerate() {
        logwise::info_sync!(
            "Shader Sampler [{i}] : {name}, slot {slot}",
            i = i,
            name = LogIt(&entry.name()),
            slot = entry.global_slot
        );
    }
    for (i, entry) in blob.tables.resources.entries().iter().enumerate() {
        logwise::info_sync!(
            "Shader Resource [{i}] : {name} ({ty}), slot {slot}",
            i = i,
            name = LogIt(&entry.name()),
            ty = LogIt(&entry.resource.resource_type),
            slot = entry.global_slot
        );
    }
    for (i, entry) in blob.tables.rw_resources.entries().iter().enumerate() {
        logwise::info_sync!(
            "Shader RW Resource [{i}] : {name} ({ty}), slot {slot}",
            i = i,
            name = LogIt(&entry.name()),
            ty = LogIt(&entry.resource.resource_type),
            slot = entry.global_slot
        );
    }
}
