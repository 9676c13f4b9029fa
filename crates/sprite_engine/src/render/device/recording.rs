//! Headless graphics device
//!
//! `RecordingDevice` implements [`GraphicsDevice`] without a GPU. It hands out
//! monotonically increasing handles, tracks which resources are alive, counts
//! state changes and draws, and can optionally keep a full command log. Tests
//! use it to assert on the exact call stream; the demo binary uses it as its
//! render target.

use std::collections::BTreeSet;

use super::{
    BufferHandle, BufferTarget, DeviceError, DeviceResult, GraphicsDevice, ProgramHandle,
    TextureHandle, VertexArrayHandle,
};
use crate::foundation::math::Mat4;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Buffer allocated
    CreateBuffer(BufferHandle),
    /// Buffer released
    DeleteBuffer(BufferHandle),
    /// Vertex array allocated
    CreateVertexArray(VertexArrayHandle),
    /// Vertex array released
    DeleteVertexArray(VertexArrayHandle),
    /// Buffer contents uploaded
    UploadBuffer {
        /// Destination buffer
        buffer: BufferHandle,
        /// Binding point
        target: BufferTarget,
        /// Payload size in bytes
        bytes: usize,
    },
    /// Vertex array bound or cleared
    BindVertexArray(Option<VertexArrayHandle>),
    /// Attribute wired to a buffer
    EnableVertexAttribute {
        /// Attribute location
        location: u32,
        /// Source buffer
        buffer: BufferHandle,
        /// Floats per vertex
        components: u32,
    },
    /// Index buffer attached
    BindIndexBuffer(BufferHandle),
    /// Program made current or cleared
    UseProgram(Option<ProgramHandle>),
    /// Texture bound
    BindTexture(TextureHandle),
    /// Blending toggled
    SetBlending(bool),
    /// Constant color attribute set
    SetVertexColor {
        /// Attribute location
        location: u32,
        /// RGBA
        color: [f32; 4],
    },
    /// Matrix uniform written
    SetUniformMatrix {
        /// Uniform location
        location: u32,
        /// Value
        matrix: Mat4,
    },
    /// Indexed draw issued, with the state it was issued under
    DrawIndexed {
        /// Index count
        index_count: u32,
        /// Program current at draw time
        program: Option<ProgramHandle>,
        /// Texture bound at draw time
        texture: TextureHandle,
    },
}

/// Running totals kept regardless of whether the command log is enabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    /// Buffers ever created
    pub buffers_created: u64,
    /// Buffers ever deleted
    pub buffers_deleted: u64,
    /// Vertex arrays ever created
    pub vertex_arrays_created: u64,
    /// Vertex arrays ever deleted
    pub vertex_arrays_deleted: u64,
    /// `use_program(Some(_))` calls
    pub program_binds: u64,
    /// `bind_texture` calls with a real texture
    pub texture_binds: u64,
    /// Indexed draws
    pub draw_calls: u64,
}

/// In-memory [`GraphicsDevice`] implementation
#[derive(Debug)]
pub struct RecordingDevice {
    next_id: u32,
    log_commands: bool,
    commands: Vec<DeviceCommand>,
    counters: DeviceCounters,
    live_buffers: BTreeSet<BufferHandle>,
    live_vertex_arrays: BTreeSet<VertexArrayHandle>,
    current_program: Option<ProgramHandle>,
    current_texture: TextureHandle,
    current_vertex_array: Option<VertexArrayHandle>,
    blending: bool,
    buffer_failure_countdown: Option<u32>,
    fail_next_vertex_array: bool,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Create a device with command logging enabled
    pub fn new() -> Self {
        Self {
            next_id: 1,
            log_commands: true,
            commands: Vec::new(),
            counters: DeviceCounters::default(),
            live_buffers: BTreeSet::new(),
            live_vertex_arrays: BTreeSet::new(),
            current_program: None,
            current_texture: TextureHandle::NONE,
            current_vertex_array: None,
            blending: false,
            buffer_failure_countdown: None,
            fail_next_vertex_array: false,
        }
    }

    /// Enable or disable the command log; counters are always maintained
    pub fn set_command_log(&mut self, enabled: bool) {
        self.log_commands = enabled;
        if !enabled {
            self.commands.clear();
        }
    }

    /// Stand-in for the shader loader: mint a fresh program handle
    pub fn create_program(&mut self) -> ProgramHandle {
        ProgramHandle(self.next_handle())
    }

    /// Stand-in for the texture loader: mint a fresh texture handle
    pub fn create_texture(&mut self) -> TextureHandle {
        TextureHandle(self.next_handle())
    }

    /// Let `successes` further buffer creations succeed, then fail one
    pub fn fail_buffer_creation_after(&mut self, successes: u32) {
        self.buffer_failure_countdown = Some(successes);
    }

    /// Fail the next vertex array creation
    pub fn fail_next_vertex_array(&mut self) {
        self.fail_next_vertex_array = true;
    }

    /// Recorded commands since the last [`RecordingDevice::take_commands`]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Running totals
    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    /// Buffers created and not yet deleted
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    /// Vertex arrays created and not yet deleted
    pub fn live_vertex_array_count(&self) -> usize {
        self.live_vertex_arrays.len()
    }

    /// Whether `buffer` is currently allocated
    pub fn is_buffer_live(&self, buffer: BufferHandle) -> bool {
        self.live_buffers.contains(&buffer)
    }

    /// Whether blending is currently enabled
    pub fn blending_enabled(&self) -> bool {
        self.blending
    }

    /// Program current right now
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    /// Texture bound right now
    pub fn current_texture(&self) -> TextureHandle {
        self.current_texture
    }

    /// Draw commands in the log, as `(program, texture)` pairs
    pub fn draws(&self) -> Vec<(Option<ProgramHandle>, TextureHandle)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::DrawIndexed { program, texture, .. } => Some((*program, *texture)),
                _ => None,
            })
            .collect()
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: DeviceCommand) {
        if self.log_commands {
            self.commands.push(command);
        }
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&mut self) -> DeviceResult<BufferHandle> {
        if let Some(remaining) = self.buffer_failure_countdown {
            if remaining == 0 {
                self.buffer_failure_countdown = None;
                return Err(DeviceError::OutOfMemory("buffer"));
            }
            self.buffer_failure_countdown = Some(remaining - 1);
        }

        let buffer = BufferHandle(self.next_handle());
        self.live_buffers.insert(buffer);
        self.counters.buffers_created += 1;
        self.record(DeviceCommand::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.live_buffers.remove(&buffer) {
            self.counters.buffers_deleted += 1;
        } else {
            log::warn!("Deleting unknown buffer {buffer:?}");
        }
        self.record(DeviceCommand::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle> {
        if std::mem::take(&mut self.fail_next_vertex_array) {
            return Err(DeviceError::OutOfMemory("vertex array"));
        }

        let vertex_array = VertexArrayHandle(self.next_handle());
        self.live_vertex_arrays.insert(vertex_array);
        self.counters.vertex_arrays_created += 1;
        self.record(DeviceCommand::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.live_vertex_arrays.remove(&vertex_array) {
            self.counters.vertex_arrays_deleted += 1;
        } else {
            log::warn!("Deleting unknown vertex array {vertex_array:?}");
        }
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
        self.record(DeviceCommand::DeleteVertexArray(vertex_array));
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, target: BufferTarget, data: &[u8]) {
        self.record(DeviceCommand::UploadBuffer { buffer, target, bytes: data.len() });
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.current_vertex_array = vertex_array;
        self.record(DeviceCommand::BindVertexArray(vertex_array));
    }

    fn enable_vertex_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32) {
        self.record(DeviceCommand::EnableVertexAttribute { location, buffer, components });
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.record(DeviceCommand::BindIndexBuffer(buffer));
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        if program.is_some() {
            self.counters.program_binds += 1;
        }
        self.current_program = program;
        self.record(DeviceCommand::UseProgram(program));
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        if texture.is_valid() {
            self.counters.texture_binds += 1;
        }
        self.current_texture = texture;
        self.record(DeviceCommand::BindTexture(texture));
    }

    fn set_blending(&mut self, enabled: bool) {
        self.blending = enabled;
        self.record(DeviceCommand::SetBlending(enabled));
    }

    fn set_vertex_color(&mut self, location: u32, color: [f32; 4]) {
        self.record(DeviceCommand::SetVertexColor { location, color });
    }

    fn set_uniform_matrix(&mut self, location: u32, matrix: &Mat4) {
        self.record(DeviceCommand::SetUniformMatrix { location, matrix: *matrix });
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.counters.draw_calls += 1;
        self.record(DeviceCommand::DrawIndexed {
            index_count,
            program: self.current_program,
            texture: self.current_texture,
        });
    }
}
