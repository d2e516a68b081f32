// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Binding slot tables.

A compiled program owns one table per category. Each entry pairs a reflected resource with
the global slot callers bind it through; the per-stage native registers ride along on the
resource, so the slot to register mapping for any stage is always derivable from the table.
Tables are immutable once built.
*/

use crate::shader::reflection::{ReflectedResource, ResourceCategory, ShaderParameterType};
use crate::shader::stage::{Stage, StageRegisters, UNUSED_REGISTERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub resource: ReflectedResource,
    pub global_slot: u32,
}

impl SlotEntry {
    pub fn name(&self) -> &str {
        &self.resource.name
    }

    pub fn register(&self, stage: Stage) -> Option<u32> {
        self.resource.register(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlotTable {
    category: ResourceCategory,
    entries: Vec<SlotEntry>,
}

impl BindingSlotTable {
    pub fn new(category: ResourceCategory) -> Self {
        BindingSlotTable {
            category,
            entries: Vec::new(),
        }
    }

    /// Builds a table from entries that already carry their slots.
    ///
    /// # Panics
    /// If two entries share a global slot, or an entry belongs to another category.
    pub fn from_entries(category: ResourceCategory, entries: Vec<SlotEntry>) -> Self {
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(
                entry.resource.category, category,
                "'{}' is a {} but was placed in a {} table",
                entry.resource.name, entry.resource.category, category
            );
            assert!(
                entries[..i].iter().all(|e| e.global_slot != entry.global_slot),
                "global slot {} is double-booked in the {} table",
                entry.global_slot,
                category
            );
        }
        BindingSlotTable { category, entries }
    }

    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    pub fn entries(&self) -> &[SlotEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [SlotEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SlotEntry> {
        self.entries.get(index)
    }

    /// Looks up an entry by exact name, returning its index too.
    pub fn find(&self, name: &str) -> Option<(usize, &SlotEntry)> {
        self.entries.iter().enumerate().find(|(_, e)| e.name() == name)
    }

    pub fn by_slot(&self, global_slot: u32) -> Option<&SlotEntry> {
        self.entries.iter().find(|e| e.global_slot == global_slot)
    }

    /// One past the highest global slot in use; 0 for an empty table.
    pub fn slot_span(&self) -> u32 {
        self.entries.iter().map(|e| e.global_slot + 1).max().unwrap_or(0)
    }

    /// One past the highest register this table uses in `stage`.
    pub fn register_span(&self, stage: Stage) -> u32 {
        self.entries
            .iter()
            .filter_map(|e| e.register(stage))
            .map(|r| r + 1)
            .max()
            .unwrap_or(0)
    }

    /// Entries whose global slot lies within `first..=last`.
    pub fn entries_in_slots(&self, first: usize, last: usize) -> impl Iterator<Item = (usize, &SlotEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| (first..=last).contains(&(e.global_slot as usize)))
    }
}

/// The four tables of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSlotTables {
    pub constant_buffers: BindingSlotTable,
    pub samplers: BindingSlotTable,
    pub resources: BindingSlotTable,
    pub rw_resources: BindingSlotTable,
}

impl Default for ProgramSlotTables {
    fn default() -> Self {
        ProgramSlotTables {
            constant_buffers: BindingSlotTable::new(ResourceCategory::ConstantBuffer),
            samplers: BindingSlotTable::new(ResourceCategory::Sampler),
            resources: BindingSlotTable::new(ResourceCategory::Texture),
            rw_resources: BindingSlotTable::new(ResourceCategory::ReadWriteResource),
        }
    }
}

impl ProgramSlotTables {
    pub fn table(&self, category: ResourceCategory) -> &BindingSlotTable {
        match category {
            ResourceCategory::ConstantBuffer => &self.constant_buffers,
            ResourceCategory::Sampler => &self.samplers,
            ResourceCategory::Texture => &self.resources,
            ResourceCategory::ReadWriteResource => &self.rw_resources,
        }
    }
}

/// A loose uniform inside the global uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: ShaderParameterType,
    pub array_size: u32,
    pub array_stride: u32,
    pub buffer_offset: u32,
}

impl UniformDecl {
    /// Bytes in one element as callers supply it.
    pub fn element_size(&self) -> u32 {
        match self.ty {
            ShaderParameterType::Struct => self.array_stride,
            ty => ty.value_size(),
        }
    }

    /// Distance between array elements. A zero stride means elements are packed.
    pub fn stride(&self) -> u32 {
        if self.array_stride == 0 {
            self.element_size()
        } else {
            self.array_stride
        }
    }

    /// One past the last byte of the last element.
    pub fn end(&self) -> u64 {
        u64::from(self.buffer_offset)
            + u64::from(self.stride()) * u64::from(self.array_size.max(1) - 1)
            + u64::from(self.element_size())
    }
}

/// The global uniform block, merged across stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    /// Largest block size any stage reported.
    pub size: u32,
    /// The constant-buffer register the block occupies in each stage.
    pub stage_registers: StageRegisters,
    pub uniforms: Vec<UniformDecl>,
}

impl Default for UniformBlockLayout {
    fn default() -> Self {
        UniformBlockLayout {
            size: 0,
            stage_registers: UNUSED_REGISTERS,
            uniforms: Vec::new(),
        }
    }
}

impl UniformBlockLayout {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn register(&self, stage: Stage) -> Option<u32> {
        self.stage_registers[stage.index()]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(name: &str, slot: u32, registers: &[(Stage, u32)]) -> SlotEntry {
        let mut resource = ReflectedResource::new(name, ResourceCategory::Texture);
        for (stage, register) in registers {
            resource = resource.with_register(*stage, *register);
        }
        SlotEntry {
            resource,
            global_slot: slot,
        }
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn spans_and_lookups() {
        let table = BindingSlotTable::from_entries(
            ResourceCategory::Texture,
            vec![
                texture("Albedo", 0, &[(Stage::Fragment, 0)]),
                texture("Heightmap", 3, &[(Stage::Vertex, 5), (Stage::Fragment, 2)]),
            ],
        );
        assert_eq!(table.slot_span(), 4);
        assert_eq!(table.register_span(Stage::Vertex), 6);
        assert_eq!(table.register_span(Stage::Compute), 0);
        assert_eq!(table.find("Heightmap").map(|(i, _)| i), Some(1));
        assert_eq!(table.by_slot(3).map(SlotEntry::name), Some("Heightmap"));
        let in_range: Vec<_> = table.entries_in_slots(1, 3).map(|(i, _)| i).collect();
        assert_eq!(in_range, vec![1]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn uniform_extent_counts_the_last_element_only() {
        let weights = UniformDecl {
            name: "Weights".into(),
            ty: ShaderParameterType::Float,
            array_size: 3,
            array_stride: 16,
            buffer_offset: 16,
        };
        assert_eq!(weights.end(), 16 + 2 * 16 + 4);
        let packed = UniformDecl {
            array_stride: 0,
            ..weights
        };
        assert_eq!(packed.stride(), 4);
        assert_eq!(packed.end(), 16 + 12);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[should_panic(expected = "double-booked")]
    fn double_booking_panics() {
        BindingSlotTable::from_entries(
            ResourceCategory::Texture,
            vec![texture("A", 1, &[]), texture("B", 1, &[])],
        );
    }
}
