//! Shader program interface consumed by the batcher
//!
//! Compiling and linking shaders is somebody else's job. By the time a program
//! reaches the batcher it is described by its handle and the attribute and
//! uniform locations the batcher needs to feed it.

use super::{DeviceError, DeviceResult, ProgramHandle};

/// Attribute and uniform locations of a linked sprite program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramLayout {
    /// Vertex position attribute (vec4)
    pub position: u32,
    /// Texture coordinate attribute (vec2), absent for untextured programs
    pub tex_coords: Option<u32>,
    /// Constant color attribute (vec4), absent when the program has none
    pub color: Option<u32>,
    /// Model-view-projection matrix uniform
    pub mvp_uniform: u32,
}

impl ProgramLayout {
    /// Layout with only the mandatory position attribute and MVP uniform
    pub fn new(position: u32, mvp_uniform: u32) -> Self {
        Self {
            position,
            tex_coords: None,
            color: None,
            mvp_uniform,
        }
    }

    /// Add a texture coordinate attribute
    pub fn with_tex_coords(mut self, location: u32) -> Self {
        self.tex_coords = Some(location);
        self
    }

    /// Add a color attribute
    pub fn with_color(mut self, location: u32) -> Self {
        self.color = Some(location);
        self
    }

    /// Build a layout from raw API locations
    ///
    /// Graphics APIs report a missing attribute as a negative location. A
    /// negative texcoord or color location means the program lacks that input
    /// and becomes `None`; the position attribute and MVP uniform are required.
    ///
    /// # Errors
    /// [`DeviceError::InvalidAttribute`] if `position` or `mvp_uniform` is negative.
    pub fn from_raw(position: i32, tex_coords: i32, color: i32, mvp_uniform: i32) -> DeviceResult<Self> {
        let position = u32::try_from(position)
            .map_err(|_| DeviceError::InvalidAttribute { name: "vertex position attribute", location: position })?;
        let mvp_uniform = u32::try_from(mvp_uniform)
            .map_err(|_| DeviceError::InvalidAttribute { name: "MVP uniform", location: mvp_uniform })?;

        Ok(Self {
            position,
            tex_coords: u32::try_from(tex_coords).ok(),
            color: u32::try_from(color).ok(),
            mvp_uniform,
        })
    }

    /// Whether the program samples a texture
    pub fn has_tex_coords(&self) -> bool {
        self.tex_coords.is_some()
    }
}

/// A linked program as handed over by the shader loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgramInfo {
    /// Program handle
    pub handle: ProgramHandle,
    /// Locations the batcher writes to
    pub layout: ProgramLayout,
}

impl ShaderProgramInfo {
    /// Pair a program handle with its layout
    pub fn new(handle: ProgramHandle, layout: ProgramLayout) -> Self {
        Self { handle, layout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_maps_negative_optionals_to_none() {
        let layout = ProgramLayout::from_raw(0, -1, -1, 3).unwrap();
        assert_eq!(layout, ProgramLayout::new(0, 3));
        assert!(!layout.has_tex_coords());
    }

    #[test]
    fn test_from_raw_keeps_present_locations() {
        let layout = ProgramLayout::from_raw(1, 2, 4, 0).unwrap();
        assert_eq!(layout.tex_coords, Some(2));
        assert_eq!(layout.color, Some(4));
    }

    #[test]
    fn test_from_raw_rejects_missing_position() {
        let err = ProgramLayout::from_raw(-1, 2, 3, 0).unwrap_err();
        assert_eq!(err, DeviceError::InvalidAttribute { name: "vertex position attribute", location: -1 });
    }

    #[test]
    fn test_from_raw_rejects_missing_mvp() {
        assert!(ProgramLayout::from_raw(0, 1, 2, -1).is_err());
    }
}
