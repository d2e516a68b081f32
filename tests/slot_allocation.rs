// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compiling programs from reflection: slot allocation, sampler links and the uniform block.

use shaders_and_slots::shader::compiler::{CompileOptions, ProgramCompiler};
use shaders_and_slots::shader::reflection::{
    GlobalConstantBufferLayout, InputDimension, InputKind, RawInputBinding, ReflectionError, ShaderParameterType,
    StaticReflector, UniformVariable, VariableBase, VariableClass, VariableTypeDesc,
};
use shaders_and_slots::shader::stage::Stage;

fn compile(reflector: &StaticReflector, stages: &[Stage]) -> Result<shaders_and_slots::shader::ShaderCacheBlob, ReflectionError> {
    let mut compiler = ProgramCompiler::new(reflector, CompileOptions::new("test"));
    for stage in stages {
        compiler = compiler.with_stage(*stage, format!("{stage} code").into_bytes());
    }
    compiler.compile()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn agreeing_registers_become_slots_and_conflicts_take_free_ones() {
    let reflector = StaticReflector::new()
        .with_bindings(Stage::Vertex, vec![RawInputBinding::constant_buffer("Camera", 2, 64)])
        .with_bindings(
            Stage::Fragment,
            vec![
                RawInputBinding::constant_buffer("Camera", 2, 64),
                RawInputBinding::constant_buffer("Material", 2, 32),
            ],
        );
    let blob = compile(&reflector, &[Stage::Vertex, Stage::Fragment]).unwrap();
    let table = &blob.tables.constant_buffers;

    let (_, camera) = table.find("Camera").unwrap();
    assert_eq!(camera.global_slot, 2);

    let (_, material) = table.find("Material").unwrap();
    assert_eq!(material.global_slot, 0);
    assert_eq!(material.register(Stage::Fragment), Some(2));
    assert_eq!(material.register(Stage::Vertex), None);
    assert_eq!(material.resource.byte_size, 32);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn disagreeing_registers_take_the_smallest_free_slot() {
    let reflector = StaticReflector::new()
        .with_bindings(
            Stage::Vertex,
            vec![
                RawInputBinding::texture("HeightMap", InputDimension::Texture2D, 0),
                RawInputBinding::texture("Noise", InputDimension::Texture3D, 3),
            ],
        )
        .with_bindings(
            Stage::Fragment,
            vec![
                RawInputBinding::texture("HeightMap", InputDimension::Texture2D, 1),
                RawInputBinding::texture("Albedo", InputDimension::Texture2D, 0),
            ],
        );
    let blob = compile(&reflector, &[Stage::Vertex, Stage::Fragment]).unwrap();
    let table = &blob.tables.resources;
    // Noise and Albedo agree with themselves and claim 3 and 0; HeightMap disagrees and takes 1.
    assert_eq!(table.find("Noise").unwrap().1.global_slot, 3);
    assert_eq!(table.find("Albedo").unwrap().1.global_slot, 0);
    assert_eq!(table.find("HeightMap").unwrap().1.global_slot, 1);
    assert_eq!(table.slot_span(), 4);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn allocation_is_deterministic() {
    let reflector = StaticReflector::new()
        .with_bindings(
            Stage::Vertex,
            vec![
                RawInputBinding::sampler("Linear", 4),
                RawInputBinding::sampler("Point", 1),
            ],
        )
        .with_bindings(Stage::Fragment, vec![RawInputBinding::sampler("Linear", 0)]);
    let first = compile(&reflector, &[Stage::Vertex, Stage::Fragment]).unwrap();
    let second = compile(&reflector, &[Stage::Vertex, Stage::Fragment]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn textures_link_to_their_sampler_state() {
    let reflector = StaticReflector::new().with_bindings(
        Stage::Fragment,
        vec![
            RawInputBinding::sampler("Clamp", 0),
            RawInputBinding::sampler("DiffuseMap_SamplerState", 1),
            RawInputBinding::texture("DiffuseMap", InputDimension::Texture2D, 0),
            RawInputBinding::texture("NormalMap", InputDimension::Texture2D, 1),
            RawInputBinding::new("Instances", InputKind::Structured, InputDimension::Buffer, 2),
        ],
    );
    let blob = compile(&reflector, &[Stage::Fragment]).unwrap();
    let (sampler_index, _) = blob.tables.samplers.find("DiffuseMap_SamplerState").unwrap();
    let (_, diffuse) = blob.tables.resources.find("DiffuseMap").unwrap();
    assert_eq!(diffuse.resource.linked_sampler_index, Some(sampler_index));
    let (_, normal) = blob.tables.resources.find("NormalMap").unwrap();
    assert_eq!(normal.resource.linked_sampler_index, None);
    let (_, instances) = blob.tables.resources.find("Instances").unwrap();
    assert_eq!(instances.resource.linked_sampler_index, None);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn multisampled_textures_fail_to_compile() {
    let reflector = StaticReflector::new().with_bindings(
        Stage::Fragment,
        vec![RawInputBinding::texture("Scene", InputDimension::Texture2DMultisample, 0)],
    );
    let err = compile(&reflector, &[Stage::Fragment]).unwrap_err();
    assert!(matches!(err, ReflectionError::UnknownDimension { .. }));
}

fn scalar_float(name: &str, offset: u32, elements: u32, size: u32) -> UniformVariable {
    UniformVariable {
        name: name.to_string(),
        used: true,
        type_desc: VariableTypeDesc {
            class: VariableClass::Scalar,
            base: VariableBase::Float,
            rows: 1,
            columns: 1,
            elements,
        },
        start_offset: offset,
        size,
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn globals_become_the_uniform_block() {
    let vertex_globals = GlobalConstantBufferLayout {
        size: 48,
        variables: vec![scalar_float("Time", 0, 0, 4), scalar_float("Weights", 16, 3, 36)],
    };
    let mut unused = scalar_float("Debug", 4, 0, 4);
    unused.used = false;
    let fragment_globals = GlobalConstantBufferLayout {
        size: 64,
        variables: vec![scalar_float("Time", 0, 0, 4), unused],
    };
    let reflector = StaticReflector::new()
        .with_bindings(Stage::Vertex, vec![RawInputBinding::constant_buffer("$Globals", 0, 48)])
        .with_globals(Stage::Vertex, vertex_globals)
        .with_bindings(Stage::Fragment, vec![RawInputBinding::constant_buffer("$Globals", 3, 64)])
        .with_globals(Stage::Fragment, fragment_globals);
    let blob = compile(&reflector, &[Stage::Vertex, Stage::Fragment]).unwrap();

    assert!(blob.tables.constant_buffers.is_empty());
    let block = &blob.uniform_block;
    assert_eq!(block.size, 64);
    assert_eq!(block.register(Stage::Vertex), Some(0));
    assert_eq!(block.register(Stage::Fragment), Some(3));
    assert_eq!(block.register(Stage::Compute), None);
    let names: Vec<&str> = block.uniforms.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Time", "Weights"]);

    let weights = &block.uniforms[1];
    assert_eq!(weights.ty, ShaderParameterType::Float);
    assert_eq!(weights.array_size, 3);
    // 36 bytes for 3 floats means each row was padded to 16
    assert_eq!(weights.array_stride, 16);
    assert_eq!(weights.buffer_offset, 16);
}
