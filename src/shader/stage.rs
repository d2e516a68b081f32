// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Pipeline stages. */

use std::fmt::Display;

/// Number of programmable pipeline stages.
pub const NUM_STAGES: usize = 6;

/**
A programmable step of the pipeline.

The discriminants are stable; they index every per-stage array in this crate
and are the order in which stages appear in a shader cache blob.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex = 0,
    Hull = 1,
    Domain = 2,
    Geometry = 3,
    /// Also called the pixel stage.
    Fragment = 4,
    Compute = 5,
}

impl Stage {
    pub const ALL: [Stage; NUM_STAGES] = [
        Stage::Vertex,
        Stage::Hull,
        Stage::Domain,
        Stage::Geometry,
        Stage::Fragment,
        Stage::Compute,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Stage::ALL.get(index).copied()
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Vertex => "vertex",
            Stage::Hull => "hull",
            Stage::Domain => "domain",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// The native register a resource occupies in each stage, or `None` where the stage doesn't use it.
pub type StageRegisters = [Option<u32>; NUM_STAGES];

/// Registers for a resource used by no stage.
pub const UNUSED_REGISTERS: StageRegisters = [None; NUM_STAGES];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn index_round_trips() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_index(stage.index()), Some(stage));
        }
        assert_eq!(Stage::from_index(NUM_STAGES), None);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn fragment_is_fifth() {
        assert_eq!(Stage::Fragment.index(), 4);
        assert_eq!(Stage::Fragment.to_string(), "fragment");
    }
}
