// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Global slot allocation.

Every resource of a category receives a global slot unique within that category. Allocation
runs in two passes over the resources in input order:

1. Common-slot pass. If every stage that uses a resource places it in the same native
   register, that register is the resource's candidate slot. The candidate is taken unless an
   earlier resource already holds it.
2. Conflict pass. Each resource still without a slot takes the smallest non-negative slot
   nobody holds yet.

The result depends only on the input order, so recompiling the same stages reproduces the same
slots. Allocation never fails.
*/

use crate::shader::reflection::{ReflectedResource, ResourceCategory};
use crate::shader::slot_table::{BindingSlotTable, SlotEntry};
use crate::shader::stage::StageRegisters;
use std::collections::BTreeSet;

/// The register all using stages agree on, if any stage uses the resource and they all agree.
pub fn common_register(registers: &StageRegisters) -> Option<u32> {
    let mut used = registers.iter().flatten();
    let first = *used.next()?;
    used.all(|&r| r == first).then_some(first)
}

/// Assigns global slots; `result[i]` is the slot of `resources[i]`.
pub fn allocate_slots(resources: &[ReflectedResource]) -> Vec<u32> {
    let mut slots: Vec<Option<u32>> = vec![None; resources.len()];
    let mut claimed = BTreeSet::new();

    for (resource, slot) in resources.iter().zip(slots.iter_mut()) {
        if let Some(candidate) = common_register(&resource.stage_registers)
            && claimed.insert(candidate)
        {
            *slot = Some(candidate);
        }
    }

    let mut next_free = 0;
    slots
        .into_iter()
        .map(|slot| match slot {
            Some(slot) => slot,
            None => {
                while claimed.contains(&next_free) {
                    next_free += 1;
                }
                claimed.insert(next_free);
                next_free
            }
        })
        .collect()
}

/// Allocates slots for one category's resources and packages them as a table.
///
/// # Panics
/// If a resource belongs to a different category.
pub fn allocate(category: ResourceCategory, resources: Vec<ReflectedResource>) -> BindingSlotTable {
    let slots = allocate_slots(&resources);
    let entries = resources
        .into_iter()
        .zip(slots)
        .map(|(resource, global_slot)| SlotEntry { resource, global_slot })
        .collect();
    BindingSlotTable::from_entries(category, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::stage::{Stage, UNUSED_REGISTERS};

    fn cbuffer(name: &str, registers: &[(Stage, u32)]) -> ReflectedResource {
        registers
            .iter()
            .fold(ReflectedResource::new(name, ResourceCategory::ConstantBuffer), |r, (stage, reg)| {
                r.with_register(*stage, *reg)
            })
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn common_register_requires_agreement() {
        let mut registers = UNUSED_REGISTERS;
        assert_eq!(common_register(&registers), None);
        registers[Stage::Vertex.index()] = Some(3);
        registers[Stage::Fragment.index()] = Some(3);
        assert_eq!(common_register(&registers), Some(3));
        registers[Stage::Geometry.index()] = Some(1);
        assert_eq!(common_register(&registers), None);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn agreeing_registers_become_slots() {
        let slots = allocate_slots(&[
            cbuffer("A", &[(Stage::Vertex, 4)]),
            cbuffer("B", &[(Stage::Vertex, 1), (Stage::Fragment, 1)]),
        ]);
        assert_eq!(slots, vec![4, 1]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn conflicts_take_the_lowest_free_slot() {
        let slots = allocate_slots(&[
            cbuffer("Shared", &[(Stage::Vertex, 2), (Stage::Fragment, 2)]),
            cbuffer("Clash", &[(Stage::Fragment, 2)]),
            cbuffer("Split", &[(Stage::Vertex, 0), (Stage::Fragment, 5)]),
            cbuffer("Unused", &[]),
        ]);
        assert_eq!(slots, vec![2, 0, 1, 3]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn earlier_candidate_wins() {
        let slots = allocate_slots(&[cbuffer("First", &[(Stage::Compute, 0)]), cbuffer("Second", &[(Stage::Compute, 0)])]);
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn conflict_pass_skips_candidates_claimed_later_in_order() {
        // "Late" claims slot 0 during the common pass even though "Early" comes first.
        let slots = allocate_slots(&[
            cbuffer("Early", &[(Stage::Vertex, 1), (Stage::Fragment, 2)]),
            cbuffer("Late", &[(Stage::Vertex, 0)]),
        ]);
        assert_eq!(slots, vec![1, 0]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn allocation_is_deterministic() {
        let input = vec![
            cbuffer("A", &[(Stage::Vertex, 7)]),
            cbuffer("B", &[(Stage::Vertex, 7)]),
            cbuffer("C", &[(Stage::Vertex, 1), (Stage::Hull, 2)]),
        ];
        let first = allocate(ResourceCategory::ConstantBuffer, input.clone());
        let second = allocate(ResourceCategory::ConstantBuffer, input);
        assert_eq!(first, second);
    }
}
