//! Unit quad shared by every sprite batch
//!
//! Corners span `[-1, 1]` in X and Y, wound counter-clockwise from the
//! bottom-left, drawn as two triangles.

use bytemuck::{Pod, Zeroable};

/// Homogeneous vertex position
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadPosition {
    /// `[x, y, z, w]`
    pub xyzw: [f32; 4],
}

/// Texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadTexCoord {
    /// `[u, v]`
    pub uv: [f32; 2],
}

/// Corner positions
pub static QUAD_POSITIONS: [QuadPosition; 4] = [
    QuadPosition { xyzw: [-1.0, -1.0, 0.0, 1.0] },
    QuadPosition { xyzw: [1.0, -1.0, 0.0, 1.0] },
    QuadPosition { xyzw: [1.0, 1.0, 0.0, 1.0] },
    QuadPosition { xyzw: [-1.0, 1.0, 0.0, 1.0] },
];

/// Corner texture coordinates, one per position
pub static QUAD_TEX_COORDS: [QuadTexCoord; 4] = [
    QuadTexCoord { uv: [0.0, 0.0] },
    QuadTexCoord { uv: [1.0, 0.0] },
    QuadTexCoord { uv: [1.0, 1.0] },
    QuadTexCoord { uv: [0.0, 1.0] },
];

/// Two triangles
pub static QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Index count passed to every draw
pub const QUAD_INDEX_COUNT: u32 = 6;

/// Floats per position
pub const POSITION_COMPONENTS: u32 = 4;

/// Floats per texture coordinate
pub const TEX_COORD_COMPONENTS: u32 = 2;

/// Position data as bytes
pub fn position_bytes() -> &'static [u8] {
    bytemuck::cast_slice(&QUAD_POSITIONS)
}

/// Texture coordinate data as bytes
pub fn tex_coord_bytes() -> &'static [u8] {
    bytemuck::cast_slice(&QUAD_TEX_COORDS)
}

/// Index data as bytes
pub fn index_bytes() -> &'static [u8] {
    bytemuck::cast_slice(&QUAD_INDICES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_sizes() {
        assert_eq!(position_bytes().len(), 4 * 4 * 4);
        assert_eq!(tex_coord_bytes().len(), 4 * 2 * 4);
        assert_eq!(index_bytes().len(), 6 * 2);
        assert_eq!(QUAD_INDEX_COUNT as usize, QUAD_INDICES.len());
    }

    #[test]
    fn test_indices_reference_all_corners() {
        for corner in 0..QUAD_POSITIONS.len() as u16 {
            assert!(QUAD_INDICES.contains(&corner));
        }
    }
}
