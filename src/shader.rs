// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Offline side of the binding model.

Per-stage reflection goes in; a [`cache_blob::ShaderCacheBlob`] comes out, carrying the
bytecode and one [`slot_table::BindingSlotTable`] per category.
*/

pub mod cache_blob;
pub mod compiler;
pub mod reflection;
pub mod sampler_linker;
pub mod slot_allocator;
pub mod slot_table;
pub mod stage;

pub use cache_blob::{CacheCorruption, ShaderCacheBlob};
pub use compiler::{CompileOptions, ProgramCompiler};
pub use reflection::{ReflectedResource, ReflectionError, ResourceCategory, ResourceType, ShaderReflector};
pub use slot_table::{BindingSlotTable, ProgramSlotTables, SlotEntry};
pub use stage::{NUM_STAGES, Stage};
