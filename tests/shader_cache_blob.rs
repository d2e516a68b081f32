// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Writing a compiled program to a cache blob and loading it back.

use shaders_and_slots::imp::nop::{BackendCall, NopBackend};
use shaders_and_slots::program::{ProgramError, ShaderProgram};
use shaders_and_slots::shader::cache_blob::{MAX_UNIFORM_BLOCK_SIZE, SIGNATURE};
use shaders_and_slots::shader::compiler::{CompileOptions, ProgramCompiler};
use shaders_and_slots::shader::reflection::{
    GlobalConstantBufferLayout, InputDimension, InputKind, RawInputBinding, ShaderParameterType, StaticReflector,
    UniformVariable, VariableBase, VariableClass, VariableTypeDesc,
};
use shaders_and_slots::shader::stage::Stage;
use shaders_and_slots::shader::{CacheCorruption, ShaderCacheBlob};

fn terrain() -> ShaderCacheBlob {
    let tint = UniformVariable {
        name: "Tint".to_string(),
        used: true,
        type_desc: VariableTypeDesc {
            class: VariableClass::Vector,
            base: VariableBase::Float,
            rows: 1,
            columns: 4,
            elements: 0,
        },
        start_offset: 0,
        size: 16,
    };
    let reflector = StaticReflector::new()
        .with_bindings(
            Stage::Vertex,
            vec![
                RawInputBinding::constant_buffer("Camera", 0, 128),
                RawInputBinding::texture("HeightMap", InputDimension::Texture2D, 0),
                RawInputBinding::sampler("HeightMap_SamplerState", 0),
            ],
        )
        .with_bindings(
            Stage::Fragment,
            vec![
                RawInputBinding::constant_buffer("$Globals", 1, 16),
                RawInputBinding::texture("HeightMap", InputDimension::Texture2D, 2),
                RawInputBinding::sampler("HeightMap_SamplerState", 0),
                RawInputBinding::texture("Splat", InputDimension::Texture2DArray, 0),
                RawInputBinding::new("Counters", InputKind::RwByteAddress, InputDimension::Buffer, 1),
            ],
        )
        .with_globals(
            Stage::Fragment,
            GlobalConstantBufferLayout {
                size: 16,
                variables: vec![tint],
            },
        );
    ProgramCompiler::new(&reflector, CompileOptions::new("terrain"))
        .with_stage(Stage::Vertex, b"vertex bytecode".to_vec())
        .with_stage(Stage::Fragment, b"fragment bytecode".to_vec())
        .compile()
        .unwrap()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn compiled_programs_survive_the_blob() {
    let blob = terrain();
    let bytes = blob.to_bytes();
    assert_eq!(&bytes[0..4], &SIGNATURE.to_le_bytes());

    let parsed = ShaderCacheBlob::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, blob);
    assert_eq!(parsed.to_bytes(), bytes);
    assert!(parsed.has_stage(Stage::Vertex));
    assert!(!parsed.has_stage(Stage::Geometry));
    let (_, height) = parsed.tables.resources.find("HeightMap").unwrap();
    assert_eq!(height.register(Stage::Fragment), Some(2));
    assert!(height.resource.linked_sampler_index.is_some());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn loaded_programs_expose_their_metadata() {
    let mut backend = NopBackend::new();
    let program = ShaderProgram::load(&mut backend, &terrain().to_bytes(), "terrain").unwrap();
    let metadata = program.metadata();

    assert_eq!(metadata.constant_buffer_count(), 1);
    assert_eq!(metadata.constant_buffer_by_name("Camera").unwrap().resource.byte_size, 128);
    assert!(metadata.constant_buffer_by_name("$Globals").is_none());
    assert_eq!(metadata.resource_count(), 2);
    assert_eq!(metadata.rw_resource_by_name("Counters").unwrap().register(Stage::Fragment), Some(1));
    assert_eq!(
        metadata.sampler_by_name("HeightMap_SamplerState").unwrap().global_slot,
        0
    );

    let (index, tint) = program.uniform_by_name("Tint").unwrap();
    assert_eq!(tint.ty, ShaderParameterType::Float4);
    assert!(program.set_uniform(index, ShaderParameterType::Float4, &[0x3f; 16]));

    let created: Vec<&BackendCall> = backend
        .calls()
        .iter()
        .filter(|c| matches!(c, BackendCall::CreateStageShader { .. }))
        .collect();
    assert_eq!(created.len(), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn truncated_blobs_fail_to_load() {
    let bytes = terrain().to_bytes();
    let mut backend = NopBackend::new();
    let err = ShaderProgram::load(&mut backend, &bytes[..bytes.len() - 3], "terrain").unwrap_err();
    assert!(matches!(err, ProgramError::Corrupt(CacheCorruption::Truncated { .. })));
    assert!(backend.calls().is_empty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn foreign_blobs_fail_to_load() {
    let mut bytes = terrain().to_bytes();
    bytes[0] ^= 0xff;
    assert!(matches!(
        ShaderCacheBlob::from_bytes(&bytes),
        Err(CacheCorruption::Signature { .. })
    ));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn uniforms_past_the_block_fail_to_load() {
    let mut blob = terrain();
    assert_eq!(blob.uniform_block.size, 16);
    blob.uniform_block.uniforms[0].buffer_offset = 64;
    let bytes = blob.to_bytes();

    assert_eq!(
        ShaderCacheBlob::from_bytes(&bytes),
        Err(CacheCorruption::UniformOutOfBlock {
            name: "Tint".to_string(),
            end: 80,
            size: 16,
        })
    );
    let mut backend = NopBackend::new();
    let err = ShaderProgram::load(&mut backend, &bytes, "terrain").unwrap_err();
    assert!(matches!(err, ProgramError::Corrupt(CacheCorruption::UniformOutOfBlock { .. })));
    assert!(backend.calls().is_empty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn oversized_uniform_blocks_fail_to_load() {
    let mut blob = terrain();
    blob.uniform_block.size = MAX_UNIFORM_BLOCK_SIZE * 2;
    assert!(matches!(
        ShaderCacheBlob::from_bytes(&blob.to_bytes()),
        Err(CacheCorruption::UniformBlockTooLarge { .. })
    ));
}
