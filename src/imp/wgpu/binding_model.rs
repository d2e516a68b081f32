// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
How native registers map onto wgpu bind groups.

Each stage gets its own bind group:

| stage    | group |
|----------|-------|
| vertex   | 0     |
| fragment | 1     |
| compute  | 2     |
| hull     | 3     |
| domain   | 4     |
| geometry | 5     |

Within a group every register category has a disjoint `@binding` range, so `b#`, `t#`, `s#`
and `u#` registers coexist:

- constant buffers: `[0, 32)`
- textures: `[32, 160)`
- samplers: `[160, 176)`
- UAVs: `[176, 184)`
*/

use crate::shader::reflection::ResourceCategory;
use crate::shader::stage::Stage;

pub const BINDING_BASE_CONSTANT_BUFFER: u32 = 0;
pub const BINDING_BASE_TEXTURE: u32 = 32;
pub const BINDING_BASE_SAMPLER: u32 = 160;
pub const BINDING_BASE_UAV: u32 = BINDING_BASE_SAMPLER + MAX_SAMPLER_REGISTERS;

pub const MAX_CONSTANT_BUFFER_REGISTERS: u32 = BINDING_BASE_TEXTURE - BINDING_BASE_CONSTANT_BUFFER;
pub const MAX_TEXTURE_REGISTERS: u32 = BINDING_BASE_SAMPLER - BINDING_BASE_TEXTURE;
pub const MAX_SAMPLER_REGISTERS: u32 = 16;
pub const MAX_UAV_REGISTERS: u32 = 8;

pub const fn bind_group_index(stage: Stage) -> u32 {
    match stage {
        Stage::Vertex => 0,
        Stage::Fragment => 1,
        Stage::Compute => 2,
        Stage::Hull => 3,
        Stage::Domain => 4,
        Stage::Geometry => 5,
    }
}

/// The `@binding` number of `register`, or `None` if the register falls outside its range.
pub fn binding_number(category: ResourceCategory, register: u32) -> Option<u32> {
    let (base, count) = match category {
        ResourceCategory::ConstantBuffer => (BINDING_BASE_CONSTANT_BUFFER, MAX_CONSTANT_BUFFER_REGISTERS),
        ResourceCategory::Texture => (BINDING_BASE_TEXTURE, MAX_TEXTURE_REGISTERS),
        ResourceCategory::Sampler => (BINDING_BASE_SAMPLER, MAX_SAMPLER_REGISTERS),
        ResourceCategory::ReadWriteResource => (BINDING_BASE_UAV, MAX_UAV_REGISTERS),
    };
    (register < count).then_some(base + register)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn groups_are_distinct() {
        let mut groups: Vec<u32> = Stage::ALL.iter().map(|s| bind_group_index(*s)).collect();
        groups.sort();
        assert_eq!(groups, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(bind_group_index(Stage::Fragment), 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn ranges_do_not_overlap() {
        assert_eq!(binding_number(ResourceCategory::ConstantBuffer, 13), Some(13));
        assert_eq!(binding_number(ResourceCategory::ConstantBuffer, 32), None);
        assert_eq!(binding_number(ResourceCategory::Texture, 0), Some(32));
        assert_eq!(binding_number(ResourceCategory::Texture, 127), Some(159));
        assert_eq!(binding_number(ResourceCategory::Sampler, 15), Some(175));
        assert_eq!(binding_number(ResourceCategory::Sampler, 16), None);
        assert_eq!(binding_number(ResourceCategory::ReadWriteResource, 0), Some(176));
        assert_eq!(binding_number(ResourceCategory::ReadWriteResource, 8), None);
    }
}
