//! A [`GpuBackend`] that records calls instead of talking to a GPU.
//!
//! Handles are plain structs carrying the parameters they were created with.
//! Buffer contents are tracked so tests can decode what would have been
//! uploaded. Creation of any resource whose label was passed to
//! [`RecordingBackend::fail_label`] fails with a validation error.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Range;

use crate::backend::{GpuBackend, PassTargets, PipelineDescriptor};
use crate::error::{GpuError, GpuErrorKind, RenderError};

#[derive(Clone, Debug, PartialEq)]
pub struct MockBuffer {
    pub id: usize,
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockTexture {
    pub id: usize,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockView {
    pub id: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockShader {
    pub id: usize,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockPipeline {
    pub id: usize,
    pub group_min_sizes: Vec<Option<u64>>,
    pub vertex_strides: Vec<u64>,
    pub depth_format: Option<wgpu::TextureFormat>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockBindGroup {
    pub id: usize,
    pub group: u32,
}

#[derive(Debug)]
pub struct MockHandle {
    pub id: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateBuffer { label: String, size: u64 },
    WriteBuffer { label: String, offset: u64, len: usize },
    CreateTexture { label: String, width: u32, height: u32 },
    CreateTextureView,
    CreateShaderModule { label: String },
    CreateRenderPipeline { label: String },
    CreateBindGroup { label: String, group: u32 },
    AcquireSurfaceTexture,
    CreateEncoder,
    BeginRenderPass { clear: wgpu::Color },
    SetPipeline { id: usize },
    SetBindGroup { index: u32, id: usize },
    SetVertexBuffer { slot: u32, label: String },
    SetIndexBuffer { label: String },
    DrawIndexed { indices: Range<u32>, instances: Range<u32> },
    EndRenderPass,
    Finish,
    Submit,
    Present,
    ResizeSurface { width: u32, height: u32 },
}

pub struct RecordingBackend {
    calls: RefCell<Vec<Call>>,
    contents: RefCell<HashMap<usize, Vec<u8>>>,
    failing: RefCell<Vec<String>>,
    fail_surface: Cell<bool>,
    next_id: Cell<usize>,
    size: (u32, u32),
    max_buffer_size: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            calls: RefCell::default(),
            contents: RefCell::default(),
            failing: RefCell::default(),
            fail_surface: Cell::new(false),
            next_id: Cell::new(0),
            size: (800, 600),
            max_buffer_size: 256 << 20,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_buffer_size(mut self, max: u64) -> Self {
        self.max_buffer_size = max;
        self
    }

    /// Makes every later creation of a resource labelled `label` fail.
    pub fn fail_label(&self, label: &str) {
        self.failing.borrow_mut().push(label.to_string());
    }

    pub fn heal_label(&self, label: &str) {
        self.failing.borrow_mut().retain(|l| l != label);
    }

    pub fn fail_surface(&self, fail: bool) {
        self.fail_surface.set(fail);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| matches(c)).count()
    }

    pub fn buffers_created(&self, label: &str) -> usize {
        self.count(|c| matches!(c, Call::CreateBuffer { label: l, .. } if l == label))
    }

    pub fn submits(&self) -> usize {
        self.count(|c| matches!(c, Call::Submit))
    }

    /// `(index range, instance range)` of every draw, in order.
    pub fn draws(&self) -> Vec<(Range<u32>, Range<u32>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::DrawIndexed { indices, instances } => {
                    Some((indices.clone(), instances.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Latest bytes uploaded to `buffer`.
    pub fn contents(&self, buffer: &MockBuffer) -> Option<Vec<u8>> {
        self.contents.borrow().get(&buffer.id).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn check(&self, label: &str) -> Result<(), GpuError> {
        if self.failing.borrow().iter().any(|l| l == label) {
            return Err(GpuError::new(
                GpuErrorKind::Validation,
                format!("injected failure for '{label}'"),
            ));
        }
        Ok(())
    }
}

impl GpuBackend for RecordingBackend {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type TextureView = MockView;
    type ShaderModule = MockShader;
    type Pipeline = MockPipeline;
    type BindGroup = MockBindGroup;
    type SurfaceTexture = MockHandle;
    type Encoder = MockHandle;
    type Pass = MockHandle;
    type CommandBuffer = MockHandle;

    fn surface_format(&self) -> wgpu::TextureFormat {
        wgpu::TextureFormat::Bgra8UnormSrgb
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
            self.record(Call::ResizeSurface { width, height });
        }
    }

    fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> Result<MockBuffer, GpuError> {
        let label = desc.label.unwrap_or_default().to_string();
        self.record(Call::CreateBuffer {
            label: label.clone(),
            size: desc.size,
        });
        self.check(&label)?;
        Ok(MockBuffer {
            id: self.id(),
            label,
            size: desc.size,
            usage: desc.usage,
        })
    }

    fn create_buffer_init(
        &self,
        desc: &wgpu::util::BufferInitDescriptor<'_>,
    ) -> Result<MockBuffer, GpuError> {
        let buffer = self.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.contents.len() as u64,
            usage: desc.usage,
            mapped_at_creation: true,
        })?;
        self.contents
            .borrow_mut()
            .insert(buffer.id, desc.contents.to_vec());
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: &MockBuffer, offset: u64, data: &[u8]) {
        self.record(Call::WriteBuffer {
            label: buffer.label.clone(),
            offset,
            len: data.len(),
        });
        let mut contents = self.contents.borrow_mut();
        let stored = contents
            .entry(buffer.id)
            .or_insert_with(|| vec![0; buffer.size as usize]);
        let start = offset as usize;
        stored[start..start + data.len()].copy_from_slice(data);
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor<'_>) -> Result<MockTexture, GpuError> {
        let label = desc.label.unwrap_or_default().to_string();
        self.record(Call::CreateTexture {
            label: label.clone(),
            width: desc.size.width,
            height: desc.size.height,
        });
        self.check(&label)?;
        Ok(MockTexture {
            id: self.id(),
            label,
            width: desc.size.width,
            height: desc.size.height,
            format: desc.format,
        })
    }

    fn create_texture_view(
        &self,
        _texture: &MockTexture,
        _desc: &wgpu::TextureViewDescriptor<'_>,
    ) -> MockView {
        self.record(Call::CreateTextureView);
        MockView { id: self.id() }
    }

    fn create_shader_module(&self, label: &str, _wgsl: &str) -> Result<MockShader, GpuError> {
        self.record(Call::CreateShaderModule {
            label: label.to_string(),
        });
        self.check(label)?;
        Ok(MockShader {
            id: self.id(),
            label: label.to_string(),
        })
    }

    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_, MockShader>,
    ) -> Result<MockPipeline, GpuError> {
        self.record(Call::CreateRenderPipeline {
            label: desc.label.to_string(),
        });
        self.check(desc.label)?;
        let group_min_sizes = desc
            .bind_group_layouts
            .iter()
            .map(|entries| match entries.first().map(|e| e.ty) {
                Some(wgpu::BindingType::Buffer {
                    min_binding_size, ..
                }) => min_binding_size.map(|s| s.get()),
                _ => None,
            })
            .collect();
        Ok(MockPipeline {
            id: self.id(),
            group_min_sizes,
            vertex_strides: desc.vertex_buffers.iter().map(|b| b.array_stride).collect(),
            depth_format: desc.depth_stencil.as_ref().map(|d| d.format),
        })
    }

    fn create_uniform_bind_group(
        &self,
        label: &str,
        _pipeline: &MockPipeline,
        group: u32,
        _buffer: &MockBuffer,
    ) -> Result<MockBindGroup, GpuError> {
        self.record(Call::CreateBindGroup {
            label: label.to_string(),
            group,
        });
        self.check(label)?;
        Ok(MockBindGroup {
            id: self.id(),
            group,
        })
    }

    fn acquire_surface_texture(&self) -> Result<MockHandle, RenderError> {
        self.record(Call::AcquireSurfaceTexture);
        if self.fail_surface.get() {
            return Err(RenderError::Surface(wgpu::SurfaceError::Timeout));
        }
        Ok(MockHandle { id: self.id() })
    }

    fn surface_texture_view(&self, _texture: &MockHandle) -> MockView {
        self.record(Call::CreateTextureView);
        MockView { id: self.id() }
    }

    fn create_command_encoder(&self, _label: &str) -> MockHandle {
        self.record(Call::CreateEncoder);
        MockHandle { id: self.id() }
    }

    fn begin_render_pass(
        &self,
        _encoder: &mut MockHandle,
        targets: &PassTargets<'_, MockView>,
    ) -> MockHandle {
        self.record(Call::BeginRenderPass {
            clear: targets.clear_color,
        });
        MockHandle { id: self.id() }
    }

    fn set_pipeline(&self, _pass: &mut MockHandle, pipeline: &MockPipeline) {
        self.record(Call::SetPipeline { id: pipeline.id });
    }

    fn set_bind_group(&self, _pass: &mut MockHandle, index: u32, group: &MockBindGroup) {
        self.record(Call::SetBindGroup {
            index,
            id: group.id,
        });
    }

    fn set_vertex_buffer(&self, _pass: &mut MockHandle, slot: u32, buffer: &MockBuffer) {
        self.record(Call::SetVertexBuffer {
            slot,
            label: buffer.label.clone(),
        });
    }

    fn set_index_buffer(&self, _pass: &mut MockHandle, buffer: &MockBuffer) {
        self.record(Call::SetIndexBuffer {
            label: buffer.label.clone(),
        });
    }

    fn draw_indexed(
        &self,
        _pass: &mut MockHandle,
        indices: Range<u32>,
        _base_vertex: i32,
        instances: Range<u32>,
    ) {
        self.record(Call::DrawIndexed { indices, instances });
    }

    fn end_render_pass(&self, _pass: MockHandle) {
        self.record(Call::EndRenderPass);
    }

    fn finish(&self, _encoder: MockHandle) -> MockHandle {
        self.record(Call::Finish);
        MockHandle { id: self.id() }
    }

    fn submit(&self, _commands: MockHandle) {
        self.record(Call::Submit);
    }

    fn present(&self, _texture: MockHandle) {
        self.record(Call::Present);
    }
}
