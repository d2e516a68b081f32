// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pairs textures with the sampler named `<texture>_SamplerState`.

use crate::shader::reflection::SAMPLER_STATE_SUFFIX;
use crate::shader::slot_table::BindingSlotTable;
use logwise::privacy::LogIt;

/// The sampler name a texture called `texture_name` pairs with.
pub fn sampler_name_for(texture_name: &str) -> String {
    format!("{texture_name}{SAMPLER_STATE_SUFFIX}")
}

/**
Links every texture in `resources` to its same-named sampler in `samplers`.

Only sampleable texture types link; buffers never do. Matching is exact and case-sensitive.
Returns how many links were made.
*/
pub fn link_samplers(resources: &mut BindingSlotTable, samplers: &BindingSlotTable) -> usize {
    let mut linked = 0;
    for entry in resources.entries_mut() {
        let resource = &mut entry.resource;
        resource.linked_sampler_index = None;
        if !resource.resource_type.is_some_and(|t| t.is_texture()) {
            continue;
        }
        let wanted = sampler_name_for(&resource.name);
        if let Some((sampler_index, sampler)) = samplers.find(&wanted) {
            logwise::info_sync!(
                "Linked '{texture}' to '{sampler}'",
                texture = LogIt(&resource.name),
                sampler = LogIt(&sampler.resource.name)
            );
            resource.linked_sampler_index = Some(sampler_index);
            linked += 1;
        }
    }
    linked
}
