// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Draw commands, as handed to the backend.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    Draw {
        first_vertex: u32,
        vertex_count: u32,
    },
    DrawInstanced {
        first_vertex: u32,
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
    },
    DrawIndexedInstanced {
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        instance_count: u32,
    },
}

impl DrawCommand {
    /// True if the command would draw nothing.
    pub fn is_empty(&self) -> bool {
        match *self {
            DrawCommand::Draw { vertex_count, .. } => vertex_count == 0,
            DrawCommand::DrawInstanced {
                vertex_count,
                instance_count,
                ..
            } => vertex_count == 0 || instance_count == 0,
            DrawCommand::DrawIndexed { index_count, .. } => index_count == 0,
            DrawCommand::DrawIndexedInstanced {
                index_count,
                instance_count,
                ..
            } => index_count == 0 || instance_count == 0,
        }
    }
}
