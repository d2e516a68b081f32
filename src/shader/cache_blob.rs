// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The shader cache blob: the only artifact that crosses from the program compiler to the loader.

All fields are little-endian 32-bit words. Registers and the linked sampler index are signed,
with `-1` meaning unused.

```text
Header {
  signature
  stage_bytecode_size[NUM_STAGES]
  uniform_count, uniform_buffer_size
  uniform_buffer_register[NUM_STAGES]
  constant_buffer_count, sampler_count, resource_count, rw_resource_count
}
stage bytecode, concatenated in stage order
uniform_count       x { name_len, type, array_size, array_stride, buffer_offset, name }
constant_buffer_count x { name_len, slot, byte_size, register[NUM_STAGES], name }
sampler_count       x { name_len, slot, register[NUM_STAGES], name }
resource_count      x { name_len, slot, type, register[NUM_STAGES], linked_sampler, name }
rw_resource_count   x { name_len, slot, type, register[NUM_STAGES], name }
```

A resource `type` of `0xffffffff` means the record carries no resource type. Every uniform
must lie inside the uniform block, and the block is at most [`MAX_UNIFORM_BLOCK_SIZE`] bytes.

No forward or backward compatibility is attempted; the signature gates the format.
*/

use crate::shader::reflection::{ReflectedResource, ResourceCategory, ResourceType, ShaderParameterType};
use crate::shader::slot_table::{BindingSlotTable, ProgramSlotTables, SlotEntry, UniformBlockLayout, UniformDecl};
use crate::shader::stage::{NUM_STAGES, Stage, StageRegisters, UNUSED_REGISTERS};

/// Format tag at the start of every blob.
pub const SIGNATURE: u32 = u32::from_le_bytes(*b"SSB1");

/// Longest resource or uniform name a blob may carry.
pub const MAX_NAME_LENGTH: u32 = 256;

/// Registers at or beyond this are rejected as corrupt.
pub const REGISTER_CEILING: u32 = 4096;

/// Largest uniform block a blob may declare, the Direct3D constant buffer limit.
pub const MAX_UNIFORM_BLOCK_SIZE: u32 = 65536;

const NO_RESOURCE_TYPE: u32 = u32::MAX;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheCorruption {
    #[error("bad signature {found:#010x}, expected {expected:#010x}", expected = SIGNATURE)]
    Signature { found: u32 },
    #[error("blob truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated { offset: usize, needed: usize, available: usize },
    #[error("name at offset {offset} is {length} bytes, longer than {max}", max = MAX_NAME_LENGTH)]
    NameTooLong { offset: usize, length: u32 },
    #[error("name at offset {offset} is not UTF-8")]
    NameNotUtf8 { offset: usize },
    #[error("unknown {what} discriminant {value} at offset {offset}")]
    UnknownDiscriminant { what: &'static str, value: u32, offset: usize },
    #[error("register {value} at offset {offset} is out of range")]
    InvalidRegister { value: i32, offset: usize },
    #[error("global slot {slot} appears twice in the {category} table")]
    DuplicateSlot { category: ResourceCategory, slot: u32 },
    #[error("'{name}' links to sampler {index}, but there are only {count} samplers")]
    DanglingSamplerLink { name: String, index: i32, count: u32 },
    #[error("uniform block of {size} bytes is larger than {max}", max = MAX_UNIFORM_BLOCK_SIZE)]
    UniformBlockTooLarge { size: u32 },
    #[error("uniform '{name}' ends at byte {end}, outside the {size} byte uniform block")]
    UniformOutOfBlock { name: String, end: u64, size: u32 },
    #[error("{0} bytes left over after the last record")]
    TrailingBytes(usize),
}

/**
Checks that the uniform block is within [`MAX_UNIFORM_BLOCK_SIZE`] and that every element of
every uniform lies inside it.
*/
pub fn validate_uniform_block(block: &UniformBlockLayout) -> Result<(), CacheCorruption> {
    if block.size > MAX_UNIFORM_BLOCK_SIZE {
        return Err(CacheCorruption::UniformBlockTooLarge { size: block.size });
    }
    for uniform in &block.uniforms {
        let end = uniform.end();
        if block.size == 0 || end > u64::from(block.size) {
            return Err(CacheCorruption::UniformOutOfBlock {
                name: uniform.name.clone(),
                end,
                size: block.size,
            });
        }
    }
    Ok(())
}

/// A compiled program: per-stage bytecode, its uniform block and its slot tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderCacheBlob {
    /// Empty for stages the program doesn't have.
    pub stage_bytecode: [Vec<u8>; NUM_STAGES],
    pub uniform_block: UniformBlockLayout,
    pub tables: ProgramSlotTables,
}

fn register_word(register: Option<u32>) -> i32 {
    register.map_or(-1, |r| r as i32)
}

struct BlobWriter {
    bytes: Vec<u8>,
}

impl BlobWriter {
    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn registers(&mut self, registers: &StageRegisters) {
        for register in registers {
            self.i32(register_word(*register));
        }
    }

    fn name(&mut self, name: &str) {
        self.bytes.extend_from_slice(name.as_bytes());
    }
}

impl ShaderCacheBlob {
    pub fn has_stage(&self, stage: Stage) -> bool {
        !self.stage_bytecode[stage.index()].is_empty()
    }

    /**
    Serializes the blob.

    # Panics
    If a name exceeds [`MAX_NAME_LENGTH`] bytes; the compiler never produces one.
    */
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BlobWriter { bytes: Vec::new() };
        let tables = &self.tables;

        w.u32(SIGNATURE);
        for code in &self.stage_bytecode {
            w.u32(code.len() as u32);
        }
        w.u32(self.uniform_block.uniforms.len() as u32);
        w.u32(self.uniform_block.size);
        w.registers(&self.uniform_block.stage_registers);
        w.u32(tables.constant_buffers.len() as u32);
        w.u32(tables.samplers.len() as u32);
        w.u32(tables.resources.len() as u32);
        w.u32(tables.rw_resources.len() as u32);

        for code in &self.stage_bytecode {
            w.bytes.extend_from_slice(code);
        }

        let name_len = |name: &str| {
            assert!(name.len() as u32 <= MAX_NAME_LENGTH, "name '{name}' is too long for a cache blob");
            name.len() as u32
        };

        for uniform in &self.uniform_block.uniforms {
            w.u32(name_len(&uniform.name));
            w.u32(uniform.ty.to_u32());
            w.u32(uniform.array_size);
            w.u32(uniform.array_stride);
            w.u32(uniform.buffer_offset);
            w.name(&uniform.name);
        }
        for entry in tables.constant_buffers.entries() {
            w.u32(name_len(entry.name()));
            w.u32(entry.global_slot);
            w.u32(entry.resource.byte_size);
            w.registers(&entry.resource.stage_registers);
            w.name(entry.name());
        }
        for entry in tables.samplers.entries() {
            w.u32(name_len(entry.name()));
            w.u32(entry.global_slot);
            w.registers(&entry.resource.stage_registers);
            w.name(entry.name());
        }
        for entry in tables.resources.entries() {
            w.u32(name_len(entry.name()));
            w.u32(entry.global_slot);
            w.u32(resource_type_word(&entry.resource));
            w.registers(&entry.resource.stage_registers);
            w.i32(entry.resource.linked_sampler_index.map_or(-1, |i| i as i32));
            w.name(entry.name());
        }
        for entry in tables.rw_resources.entries() {
            w.u32(name_len(entry.name()));
            w.u32(entry.global_slot);
            w.u32(resource_type_word(&entry.resource));
            w.registers(&entry.resource.stage_registers);
            w.name(entry.name());
        }
        w.bytes
    }

    /// Parses a blob, validating every length, discriminant and index against the stream.
    pub fn from_bytes(bytes: &[u8]) -> Result<ShaderCacheBlob, CacheCorruption> {
        let mut r = BlobReader { bytes, offset: 0 };

        let found = r.u32()?;
        if found != SIGNATURE {
            return Err(CacheCorruption::Signature { found });
        }
        let mut stage_sizes = [0u32; NUM_STAGES];
        for size in &mut stage_sizes {
            *size = r.u32()?;
        }
        let uniform_count = r.u32()?;
        let uniform_buffer_size = r.u32()?;
        let uniform_registers = r.registers()?;
        let constant_buffer_count = r.u32()?;
        let sampler_count = r.u32()?;
        let resource_count = r.u32()?;
        let rw_resource_count = r.u32()?;

        let mut stage_bytecode: [Vec<u8>; NUM_STAGES] = Default::default();
        for (code, size) in stage_bytecode.iter_mut().zip(stage_sizes) {
            *code = r.take(size as usize)?.to_vec();
        }

        let mut uniforms = Vec::new();
        for _ in 0..uniform_count {
            let name_length = r.name_length()?;
            let type_offset = r.offset;
            let ty_word = r.u32()?;
            let ty = ShaderParameterType::from_u32(ty_word).ok_or(CacheCorruption::UnknownDiscriminant {
                what: "uniform type",
                value: ty_word,
                offset: type_offset,
            })?;
            let array_size = r.u32()?;
            let array_stride = r.u32()?;
            let buffer_offset = r.u32()?;
            let name = r.name(name_length)?;
            uniforms.push(UniformDecl {
                name,
                ty,
                array_size,
                array_stride,
                buffer_offset,
            });
        }

        let mut constant_buffers = Vec::new();
        for _ in 0..constant_buffer_count {
            let name_length = r.name_length()?;
            let global_slot = r.u32()?;
            let byte_size = r.u32()?;
            let stage_registers = r.registers()?;
            let name = r.name(name_length)?;
            let mut resource = ReflectedResource::new(name, ResourceCategory::ConstantBuffer).with_byte_size(byte_size);
            resource.stage_registers = stage_registers;
            constant_buffers.push(SlotEntry { resource, global_slot });
        }

        let mut samplers = Vec::new();
        for _ in 0..sampler_count {
            let name_length = r.name_length()?;
            let global_slot = r.u32()?;
            let stage_registers = r.registers()?;
            let name = r.name(name_length)?;
            let mut resource = ReflectedResource::new(name, ResourceCategory::Sampler);
            resource.stage_registers = stage_registers;
            samplers.push(SlotEntry { resource, global_slot });
        }

        let mut resources = Vec::new();
        for _ in 0..resource_count {
            let name_length = r.name_length()?;
            let global_slot = r.u32()?;
            let resource_type = r.resource_type()?;
            let stage_registers = r.registers()?;
            let linked = r.i32()?;
            let name = r.name(name_length)?;
            let linked_sampler_index = match linked {
                -1 => None,
                index if index >= 0 && (index as u32) < sampler_count => Some(index as usize),
                index => {
                    return Err(CacheCorruption::DanglingSamplerLink {
                        name,
                        index,
                        count: sampler_count,
                    });
                }
            };
            let mut resource = ReflectedResource::new(name, ResourceCategory::Texture);
            resource.resource_type = resource_type;
            resource.stage_registers = stage_registers;
            resource.linked_sampler_index = linked_sampler_index;
            resources.push(SlotEntry { resource, global_slot });
        }

        let mut rw_resources = Vec::new();
        for _ in 0..rw_resource_count {
            let name_length = r.name_length()?;
            let global_slot = r.u32()?;
            let resource_type = r.resource_type()?;
            let stage_registers = r.registers()?;
            let name = r.name(name_length)?;
            let mut resource = ReflectedResource::new(name, ResourceCategory::ReadWriteResource);
            resource.resource_type = resource_type;
            resource.stage_registers = stage_registers;
            rw_resources.push(SlotEntry { resource, global_slot });
        }

        let left = bytes.len() - r.offset;
        if left != 0 {
            return Err(CacheCorruption::TrailingBytes(left));
        }

        let uniform_block = UniformBlockLayout {
            size: uniform_buffer_size,
            stage_registers: uniform_registers,
            uniforms,
        };
        validate_uniform_block(&uniform_block)?;

        Ok(ShaderCacheBlob {
            stage_bytecode,
            uniform_block,
            tables: ProgramSlotTables {
                constant_buffers: table_from_entries(ResourceCategory::ConstantBuffer, constant_buffers)?,
                samplers: table_from_entries(ResourceCategory::Sampler, samplers)?,
                resources: table_from_entries(ResourceCategory::Texture, resources)?,
                rw_resources: table_from_entries(ResourceCategory::ReadWriteResource, rw_resources)?,
            },
        })
    }
}

fn resource_type_word(resource: &ReflectedResource) -> u32 {
    resource.resource_type.map_or(NO_RESOURCE_TYPE, ResourceType::to_u32)
}

fn table_from_entries(category: ResourceCategory, entries: Vec<SlotEntry>) -> Result<BindingSlotTable, CacheCorruption> {
    for (i, entry) in entries.iter().enumerate() {
        if entries[..i].iter().any(|e| e.global_slot == entry.global_slot) {
            return Err(CacheCorruption::DuplicateSlot {
                category,
                slot: entry.global_slot,
            });
        }
    }
    Ok(BindingSlotTable::from_entries(category, entries))
}

struct BlobReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> BlobReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CacheCorruption> {
        let end = self.offset.checked_add(len).filter(|&end| end <= self.bytes.len());
        let slice = end
            .and_then(|end| self.bytes.get(self.offset..end))
            .ok_or(CacheCorruption::Truncated {
                offset: self.offset,
                needed: len,
                available: self.bytes.len().saturating_sub(self.offset),
            })?;
        self.offset += len;
        Ok(slice)
    }

    fn word(&mut self) -> Result<[u8; 4], CacheCorruption> {
        let slice = self.take(4)?;
        Ok([slice[0], slice[1], slice[2], slice[3]])
    }

    fn u32(&mut self) -> Result<u32, CacheCorruption> {
        Ok(u32::from_le_bytes(self.word()?))
    }

    fn i32(&mut self) -> Result<i32, CacheCorruption> {
        Ok(i32::from_le_bytes(self.word()?))
    }

    fn registers(&mut self) -> Result<StageRegisters, CacheCorruption> {
        let mut registers = UNUSED_REGISTERS;
        for register in &mut registers {
            let offset = self.offset;
            *register = match self.i32()? {
                -1 => None,
                value if value >= 0 && (value as u32) < REGISTER_CEILING => Some(value as u32),
                value => return Err(CacheCorruption::InvalidRegister { value, offset }),
            };
        }
        Ok(registers)
    }

    fn resource_type(&mut self) -> Result<Option<ResourceType>, CacheCorruption> {
        let offset = self.offset;
        let value = self.u32()?;
        if value == NO_RESOURCE_TYPE {
            return Ok(None);
        }
        ResourceType::from_u32(value)
            .map(Some)
            .ok_or(CacheCorruption::UnknownDiscriminant {
                what: "resource type",
                value,
                offset,
            })
    }

    fn name_length(&mut self) -> Result<u32, CacheCorruption> {
        let offset = self.offset;
        let length = self.u32()?;
        if length > MAX_NAME_LENGTH {
            return Err(CacheCorruption::NameTooLong { offset, length });
        }
        Ok(length)
    }

    fn name(&mut self, length: u32) -> Result<String, CacheCorruption> {
        let offset = self.offset;
        let raw = self.take(length as usize)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CacheCorruption::NameNotUtf8 { offset })
    }
}
