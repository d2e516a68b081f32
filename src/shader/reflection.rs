// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Reflection records and the interface to the external shader reflector.

A reflector looks at one compiled stage and reports raw input bindings plus the layout of
the stage's global uniform block. This module classifies raw bindings into the four
binding categories and merges them across stages by exact name, producing one
[`ReflectedResource`] per named resource with a register for every stage that uses it.
*/

use crate::shader::cache_blob::CacheCorruption;
use crate::shader::stage::{Stage, StageRegisters, UNUSED_REGISTERS};
use std::collections::HashMap;
use std::fmt::Display;

/// Name of the implicit constant buffer holding loose uniforms.
pub const GLOBALS_NAME: &str = "$Globals";

/// Suffix a sampler name must carry to pair with the texture of the same stem.
pub const SAMPLER_STATE_SUFFIX: &str = "_SamplerState";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    ConstantBuffer,
    Sampler,
    /// Read-only shader resources: textures and buffers viewed through a shader resource view.
    Texture,
    ReadWriteResource,
}

impl Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceCategory::ConstantBuffer => "constant buffer",
            ResourceCategory::Sampler => "sampler",
            ResourceCategory::Texture => "resource",
            ResourceCategory::ReadWriteResource => "rw resource",
        };
        f.write_str(name)
    }
}

/// The shape of a texture or rw resource as the shader declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResourceType {
    Buffer = 0,
    TextureBuffer = 1,
    Texture1D = 2,
    Texture1DArray = 3,
    Texture2D = 4,
    Texture2DArray = 5,
    Texture3D = 6,
    TextureCube = 7,
    TextureCubeArray = 8,
}

impl ResourceType {
    /// Whether this type can be sampled, and therefore paired with a sampler.
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            ResourceType::Texture1D
                | ResourceType::Texture1DArray
                | ResourceType::Texture2D
                | ResourceType::Texture2DArray
                | ResourceType::Texture3D
                | ResourceType::TextureCube
                | ResourceType::TextureCubeArray
        )
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<ResourceType> {
        Some(match value {
            0 => ResourceType::Buffer,
            1 => ResourceType::TextureBuffer,
            2 => ResourceType::Texture1D,
            3 => ResourceType::Texture1DArray,
            4 => ResourceType::Texture2D,
            5 => ResourceType::Texture2DArray,
            6 => ResourceType::Texture3D,
            7 => ResourceType::TextureCube,
            8 => ResourceType::TextureCubeArray,
            _ => return None,
        })
    }
}

/// Kind of a raw input binding, as reported by the reflector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    ConstantBuffer,
    TextureBuffer,
    Texture,
    Sampler,
    Structured,
    ByteAddress,
    RwTyped,
    RwStructured,
    RwByteAddress,
    AppendStructured,
    ConsumeStructured,
    RwStructuredWithCounter,
}

/// View dimension of a raw input binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDimension {
    Unknown,
    Buffer,
    BufferEx,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMultisample,
    Texture2DMultisampleArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

/// One bound input of one stage, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInputBinding {
    pub name: String,
    pub kind: InputKind,
    pub dimension: InputDimension,
    pub register: u32,
    /// Size of the backing block, for constant buffers. Zero otherwise.
    pub byte_size: u32,
}

impl RawInputBinding {
    pub fn new(name: impl Into<String>, kind: InputKind, dimension: InputDimension, register: u32) -> Self {
        RawInputBinding {
            name: name.into(),
            kind,
            dimension,
            register,
            byte_size: 0,
        }
    }

    pub fn constant_buffer(name: impl Into<String>, register: u32, byte_size: u32) -> Self {
        RawInputBinding {
            byte_size,
            ..RawInputBinding::new(name, InputKind::ConstantBuffer, InputDimension::Unknown, register)
        }
    }

    pub fn sampler(name: impl Into<String>, register: u32) -> Self {
        RawInputBinding::new(name, InputKind::Sampler, InputDimension::Unknown, register)
    }

    pub fn texture(name: impl Into<String>, dimension: InputDimension, register: u32) -> Self {
        RawInputBinding::new(name, InputKind::Texture, dimension, register)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableClass {
    Scalar,
    Vector,
    MatrixRows,
    MatrixColumns,
    Struct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableBase {
    Bool,
    Int,
    UInt,
    Float,
    Double,
}

/// Type description of a uniform variable as the reflector sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableTypeDesc {
    pub class: VariableClass,
    pub base: VariableBase,
    pub rows: u32,
    pub columns: u32,
    /// Array length, or 0 for a non-array.
    pub elements: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformVariable {
    pub name: String,
    /// Variables the stage never reads are dropped.
    pub used: bool,
    pub type_desc: VariableTypeDesc,
    pub start_offset: u32,
    /// Bytes occupied in the block, including interior array padding.
    pub size: u32,
}

/// Layout of the global uniform block of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalConstantBufferLayout {
    pub size: u32,
    pub variables: Vec<UniformVariable>,
}

/// Type of a loose uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderParameterType {
    Bool = 0,
    Int = 1,
    Int2 = 2,
    Int3 = 3,
    Int4 = 4,
    UInt = 5,
    UInt2 = 6,
    UInt3 = 7,
    UInt4 = 8,
    Float = 9,
    Float2 = 10,
    Float3 = 11,
    Float4 = 12,
    Float2x2 = 13,
    Float3x3 = 14,
    Float3x4 = 15,
    Float4x4 = 16,
    Struct = 17,
}

const PARAMETER_TRANSLATION: [(ShaderParameterType, VariableClass, VariableBase, u32, u32); 17] = [
    (ShaderParameterType::Bool, VariableClass::Scalar, VariableBase::Bool, 1, 1),
    (ShaderParameterType::Int, VariableClass::Scalar, VariableBase::Int, 1, 1),
    (ShaderParameterType::Int2, VariableClass::Vector, VariableBase::Int, 1, 2),
    (ShaderParameterType::Int3, VariableClass::Vector, VariableBase::Int, 1, 3),
    (ShaderParameterType::Int4, VariableClass::Vector, VariableBase::Int, 1, 4),
    (ShaderParameterType::UInt, VariableClass::Scalar, VariableBase::UInt, 1, 1),
    (ShaderParameterType::UInt2, VariableClass::Vector, VariableBase::UInt, 1, 2),
    (ShaderParameterType::UInt3, VariableClass::Vector, VariableBase::UInt, 1, 3),
    (ShaderParameterType::UInt4, VariableClass::Vector, VariableBase::UInt, 1, 4),
    (ShaderParameterType::Float, VariableClass::Scalar, VariableBase::Float, 1, 1),
    (ShaderParameterType::Float2, VariableClass::Vector, VariableBase::Float, 1, 2),
    (ShaderParameterType::Float3, VariableClass::Vector, VariableBase::Float, 1, 3),
    (ShaderParameterType::Float4, VariableClass::Vector, VariableBase::Float, 1, 4),
    (ShaderParameterType::Float2x2, VariableClass::MatrixRows, VariableBase::Float, 2, 2),
    (ShaderParameterType::Float3x3, VariableClass::MatrixRows, VariableBase::Float, 3, 3),
    (ShaderParameterType::Float3x4, VariableClass::MatrixRows, VariableBase::Float, 3, 4),
    (ShaderParameterType::Float4x4, VariableClass::MatrixRows, VariableBase::Float, 4, 4),
];

impl ShaderParameterType {
    /// Size in bytes of one element. Structs report 0; their size comes from reflection.
    pub fn value_size(self) -> u32 {
        match self {
            ShaderParameterType::Bool
            | ShaderParameterType::Int
            | ShaderParameterType::UInt
            | ShaderParameterType::Float => 4,
            ShaderParameterType::Int2 | ShaderParameterType::UInt2 | ShaderParameterType::Float2 => 8,
            ShaderParameterType::Int3 | ShaderParameterType::UInt3 | ShaderParameterType::Float3 => 12,
            ShaderParameterType::Int4
            | ShaderParameterType::UInt4
            | ShaderParameterType::Float4
            | ShaderParameterType::Float2x2 => 16,
            ShaderParameterType::Float3x3 => 36,
            ShaderParameterType::Float3x4 => 48,
            ShaderParameterType::Float4x4 => 64,
            ShaderParameterType::Struct => 0,
        }
    }

    /// Types whose array elements are padded out to a 16-byte row.
    pub fn pads_to_row(self) -> bool {
        matches!(
            self,
            ShaderParameterType::Bool
                | ShaderParameterType::Int
                | ShaderParameterType::Int2
                | ShaderParameterType::Int3
                | ShaderParameterType::UInt
                | ShaderParameterType::UInt2
                | ShaderParameterType::UInt3
                | ShaderParameterType::Float
                | ShaderParameterType::Float2
                | ShaderParameterType::Float3
        )
    }

    /// Maps a non-struct reflected type. Returns `None` for anything without a counterpart.
    pub fn from_type_desc(desc: &VariableTypeDesc) -> Option<ShaderParameterType> {
        PARAMETER_TRANSLATION
            .iter()
            .find(|(_, class, base, rows, columns)| {
                *class == desc.class && *base == desc.base && *rows == desc.rows && *columns == desc.columns
            })
            .map(|(ty, ..)| *ty)
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<ShaderParameterType> {
        if value == ShaderParameterType::Struct as u32 {
            return Some(ShaderParameterType::Struct);
        }
        PARAMETER_TRANSLATION
            .iter()
            .map(|(ty, ..)| *ty)
            .find(|ty| *ty as u32 == value)
    }
}

/**
One named shader resource, merged across every stage that uses it.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedResource {
    pub name: String,
    pub category: ResourceCategory,
    pub stage_registers: StageRegisters,
    /// Constant buffers only.
    pub byte_size: u32,
    /// Textures and rw resources only.
    pub resource_type: Option<ResourceType>,
    /// Textures only; index into the program's sampler table.
    pub linked_sampler_index: Option<usize>,
}

impl ReflectedResource {
    pub fn new(name: impl Into<String>, category: ResourceCategory) -> Self {
        ReflectedResource {
            name: name.into(),
            category,
            stage_registers: UNUSED_REGISTERS,
            byte_size: 0,
            resource_type: None,
            linked_sampler_index: None,
        }
    }

    pub fn with_register(mut self, stage: Stage, register: u32) -> Self {
        self.stage_registers[stage.index()] = Some(register);
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn with_byte_size(mut self, byte_size: u32) -> Self {
        self.byte_size = byte_size;
        self
    }

    pub fn register(&self, stage: Stage) -> Option<u32> {
        self.stage_registers[stage.index()]
    }

    /// Stages this resource is bound in, paired with the register it occupies there.
    pub fn used_stages(&self) -> impl Iterator<Item = (Stage, u32)> + '_ {
        Stage::ALL
            .into_iter()
            .filter_map(|stage| self.register(stage).map(|register| (stage, register)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("unhandled input dimension {dimension:?} for '{name}'")]
    UnknownDimension { name: String, dimension: InputDimension },
    #[error("failed to map the type of uniform '{name}' ({desc:?})")]
    UnmappableUniformType { name: String, desc: VariableTypeDesc },
    #[error(
        "uniform '{name}' of type {ty:?} has an array layout that doesn't fit its size (stride {stride}, {array_size} elements, {size} bytes)"
    )]
    InconsistentUniformStride {
        name: String,
        ty: ShaderParameterType,
        stride: u32,
        array_size: u32,
        size: u32,
    },
    #[error("reflection of the {stage} stage failed: {message}")]
    Reflector { stage: Stage, message: String },
    #[error("the merged uniform block would not load: {0}")]
    UniformBlock(#[from] CacheCorruption),
}

/**
The external shader reflector.

Implementations introspect one compiled stage. Registers in the results are the native
registers of that stage.
*/
pub trait ShaderReflector {
    fn list_resources(&self, stage: Stage, bytecode: &[u8]) -> Result<Vec<RawInputBinding>, ReflectionError>;

    /// Layout of the stage's `$Globals` block, if it has one.
    fn global_constant_buffer_layout(
        &self,
        stage: Stage,
        bytecode: &[u8],
    ) -> Result<Option<GlobalConstantBufferLayout>, ReflectionError>;
}

/**
A reflector serving reflection results that were computed ahead of time.

Useful when reflection data ships alongside the bytecode, and in tests.
*/
#[derive(Debug, Clone, Default)]
pub struct StaticReflector {
    resources: HashMap<Stage, Vec<RawInputBinding>>,
    globals: HashMap<Stage, GlobalConstantBufferLayout>,
}

impl StaticReflector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(mut self, stage: Stage, bindings: Vec<RawInputBinding>) -> Self {
        self.resources.insert(stage, bindings);
        self
    }

    pub fn with_globals(mut self, stage: Stage, layout: GlobalConstantBufferLayout) -> Self {
        self.globals.insert(stage, layout);
        self
    }
}

impl ShaderReflector for StaticReflector {
    fn list_resources(&self, stage: Stage, _bytecode: &[u8]) -> Result<Vec<RawInputBinding>, ReflectionError> {
        Ok(self.resources.get(&stage).cloned().unwrap_or_default())
    }

    fn global_constant_buffer_layout(
        &self,
        stage: Stage,
        _bytecode: &[u8],
    ) -> Result<Option<GlobalConstantBufferLayout>, ReflectionError> {
        Ok(self.globals.get(&stage).cloned())
    }
}

fn resource_type_for_dimension(name: &str, dimension: InputDimension, buffer: ResourceType) -> Result<ResourceType, ReflectionError> {
    match dimension {
        InputDimension::Buffer | InputDimension::BufferEx => Ok(buffer),
        InputDimension::Texture1D => Ok(ResourceType::Texture1D),
        InputDimension::Texture1DArray => Ok(ResourceType::Texture1DArray),
        InputDimension::Texture2D => Ok(ResourceType::Texture2D),
        InputDimension::Texture2DArray => Ok(ResourceType::Texture2DArray),
        InputDimension::Texture3D => Ok(ResourceType::Texture3D),
        InputDimension::TextureCube => Ok(ResourceType::TextureCube),
        InputDimension::TextureCubeArray => Ok(ResourceType::TextureCubeArray),
        InputDimension::Unknown
        | InputDimension::Texture2DMultisample
        | InputDimension::Texture2DMultisampleArray => Err(ReflectionError::UnknownDimension {
            name: name.to_string(),
            dimension,
        }),
    }
}

/// Sorts a raw binding into its category, and for textures and rw resources, its type.
pub fn classify(binding: &RawInputBinding) -> Result<(ResourceCategory, Option<ResourceType>), ReflectionError> {
    match binding.kind {
        InputKind::ConstantBuffer => Ok((ResourceCategory::ConstantBuffer, None)),
        InputKind::Sampler => Ok((ResourceCategory::Sampler, None)),
        InputKind::Texture => {
            let ty = resource_type_for_dimension(&binding.name, binding.dimension, ResourceType::TextureBuffer)?;
            Ok((ResourceCategory::Texture, Some(ty)))
        }
        InputKind::TextureBuffer | InputKind::Structured | InputKind::ByteAddress => {
            Ok((ResourceCategory::Texture, Some(ResourceType::Buffer)))
        }
        InputKind::RwTyped => {
            let ty = resource_type_for_dimension(&binding.name, binding.dimension, ResourceType::Buffer)?;
            Ok((ResourceCategory::ReadWriteResource, Some(ty)))
        }
        InputKind::RwStructured
        | InputKind::RwByteAddress
        | InputKind::AppendStructured
        | InputKind::ConsumeStructured
        | InputKind::RwStructuredWithCounter => Ok((ResourceCategory::ReadWriteResource, Some(ResourceType::Buffer))),
    }
}

/**
Resources of every category, merged across stages by exact name.

Order within a category is first appearance, scanning stages in [`Stage::ALL`] order.
*/
#[derive(Debug, Clone, Default)]
pub struct MergedResources {
    pub constant_buffers: Vec<ReflectedResource>,
    pub samplers: Vec<ReflectedResource>,
    pub resources: Vec<ReflectedResource>,
    pub rw_resources: Vec<ReflectedResource>,
}

impl MergedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self, category: ResourceCategory) -> &[ReflectedResource] {
        match category {
            ResourceCategory::ConstantBuffer => &self.constant_buffers,
            ResourceCategory::Sampler => &self.samplers,
            ResourceCategory::Texture => &self.resources,
            ResourceCategory::ReadWriteResource => &self.rw_resources,
        }
    }

    fn category_mut(&mut self, category: ResourceCategory) -> &mut Vec<ReflectedResource> {
        match category {
            ResourceCategory::ConstantBuffer => &mut self.constant_buffers,
            ResourceCategory::Sampler => &mut self.samplers,
            ResourceCategory::Texture => &mut self.resources,
            ResourceCategory::ReadWriteResource => &mut self.rw_resources,
        }
    }

    /// Folds one stage's bindings in. `$Globals` is skipped; it is the uniform block.
    pub fn add_stage(&mut self, stage: Stage, bindings: &[RawInputBinding]) -> Result<(), ReflectionError> {
        for binding in bindings {
            if binding.kind == InputKind::ConstantBuffer && binding.name == GLOBALS_NAME {
                continue;
            }
            let (category, resource_type) = classify(binding)?;
            let list = self.category_mut(category);
            match list.iter_mut().find(|r| r.name == binding.name) {
                Some(existing) => {
                    existing.stage_registers[stage.index()] = Some(binding.register);
                }
                None => {
                    let mut resource = ReflectedResource::new(binding.name.clone(), category)
                        .with_register(stage, binding.register)
                        .with_byte_size(binding.byte_size);
                    resource.resource_type = resource_type;
                    list.push(resource);
                }
            }
        }
        Ok(())
    }
}
