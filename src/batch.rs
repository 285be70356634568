//! Per-frame render batch assembly.
//!
//! Gathering runs in two stages:
//!
//! 1. **Host**: for one geometry tag, query the world, count the matches, and
//!    copy each entity's final model matrix and color into flat arrays
//!    ([`collect_instances`]).
//! 2. **GPU**: resolve the kind's static vertex/index buffers, pack and upload
//!    the instance data, and attach the shared pipeline ([`gather_batches`]).
//!
//! Kinds are visited in [`GeometryKind::ALL`] order. A kind with no entities
//! produces no batch and touches the GPU not at all. A kind whose buffers
//! cannot be created is logged and skipped; the others still draw.
//!
//! Entity order inside a batch follows the ECS query and is not stable across
//! frames.

use std::rc::Rc;

use glam::Mat4;
use hecs::World;

use crate::backend::GpuBackend;
use crate::ecs::{Cuboid, GeometryTag, Rectangle, Rgb, Transform3};
use crate::error::ResourceError;
use crate::geometry::GeometryKind;
use crate::instance::{INSTANCE_STRIDE, pack_instances};
use crate::pipeline::{GeometryPipeline, PipelineCache};
use crate::resources;

/// Instance data for one geometry kind, copied out of the world.
///
/// `transforms` and `colors` always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBatch {
    pub kind: GeometryKind,
    pub transforms: Vec<Mat4>,
    pub colors: Vec<Rgb>,
}

impl HostBatch {
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }
}

/// Copies every entity tagged with `S` into a [`HostBatch`].
///
/// Only entities that also carry a [`Transform3`] match. Returns `None` when
/// nothing does. The model matrix is the transform times the tag's dimension
/// scale; a missing [`Rgb`] becomes white.
pub fn collect_instances<S: GeometryTag>(world: &World) -> Option<HostBatch> {
    let mut query = world.query::<(&Transform3, Option<&Rgb>, &S)>();

    let count = query.iter().count();
    if count == 0 {
        return None;
    }

    let mut transforms = Vec::with_capacity(count);
    let mut colors = Vec::with_capacity(count);
    for (_, (transform, color, shape)) in query.iter() {
        transforms.push(transform.value * Mat4::from_scale(shape.scale()));
        colors.push(color.copied().unwrap_or(Rgb::WHITE));
    }

    Some(HostBatch {
        kind: S::KIND,
        transforms,
        colors,
    })
}

/// Host stage for one kind.
pub fn collect_kind(world: &World, kind: GeometryKind) -> Option<HostBatch> {
    match kind {
        GeometryKind::Box => collect_instances::<Cuboid>(world),
        GeometryKind::Rectangle => collect_instances::<Rectangle>(world),
    }
}

/// Static buffers for one geometry kind.
pub struct GeometryBuffers<B: GpuBackend> {
    pub vertex: B::Buffer,
    pub index: B::Buffer,
    pub index_count: u32,
}

/// Static geometry buffers, created at most once per kind.
pub struct GeometryCache<B: GpuBackend> {
    entries: [Option<Rc<GeometryBuffers<B>>>; GeometryKind::ALL.len()],
}

impl<B: GpuBackend> Default for GeometryCache<B> {
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
        }
    }
}

impl<B: GpuBackend> GeometryCache<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffers for `kind`, uploading them on first use.
    ///
    /// Failures are not cached, so the next frame retries.
    pub fn resolve(
        &mut self,
        gpu: &B,
        kind: GeometryKind,
    ) -> Result<Rc<GeometryBuffers<B>>, ResourceError> {
        let slot = &mut self.entries[kind.index()];
        if let Some(existing) = slot {
            return Ok(Rc::clone(existing));
        }

        let desc = kind.descriptor();
        let vertex = resources::create_buffer(
            gpu,
            &format!("{} Vertex Buffer", kind.name()),
            desc.vertex_bytes().len() as u64,
            wgpu::BufferUsages::VERTEX,
            Some(desc.vertex_bytes()),
        )?;
        let index = resources::create_buffer(
            gpu,
            &format!("{} Index Buffer", kind.name()),
            desc.index_bytes().len() as u64,
            wgpu::BufferUsages::INDEX,
            Some(desc.index_bytes()),
        )?;

        log::debug!(
            "{} geometry uploaded: {} vertices, {} indices",
            kind.name(),
            desc.vertex_count(),
            desc.index_count()
        );

        let buffers = Rc::new(GeometryBuffers {
            vertex,
            index,
            index_count: desc.index_count(),
        });
        *slot = Some(Rc::clone(&buffers));
        Ok(buffers)
    }

    pub fn is_resolved(&self, kind: GeometryKind) -> bool {
        self.entries[kind.index()].is_some()
    }
}

/// Everything needed to draw one kind this frame.
///
/// The instance buffer belongs to the frame and is dropped with the batch.
/// Geometry buffers and the pipeline are shared with the caches.
pub struct RenderBatch<B: GpuBackend> {
    pub kind: GeometryKind,
    pub instance_count: u32,
    pub transforms: Vec<Mat4>,
    pub colors: Vec<Rgb>,
    pub geometry: Rc<GeometryBuffers<B>>,
    pub instance_buffer: B::Buffer,
    pub pipeline: Rc<GeometryPipeline<B>>,
}

/// GPU-side caches the gatherer draws from.
pub struct BatchResources<B: GpuBackend> {
    pub geometry: GeometryCache<B>,
    pub pipelines: PipelineCache<B>,
}

impl<B: GpuBackend> Default for BatchResources<B> {
    fn default() -> Self {
        Self {
            geometry: GeometryCache::new(),
            pipelines: PipelineCache::new(),
        }
    }
}

impl<B: GpuBackend> BatchResources<B> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builds this frame's batches, one per kind that has entities.
pub fn gather_batches<B: GpuBackend>(
    world: &World,
    gpu: &B,
    caches: &mut BatchResources<B>,
) -> Vec<RenderBatch<B>> {
    let mut batches = Vec::with_capacity(GeometryKind::ALL.len());

    for kind in GeometryKind::ALL {
        let Some(host) = collect_kind(world, kind) else {
            continue;
        };

        match build_batch(gpu, caches, host) {
            Ok(batch) => batches.push(batch),
            Err(error) => log::warn!("skipping {} batch: {error}", kind.name()),
        }
    }

    batches
}

fn build_batch<B: GpuBackend>(
    gpu: &B,
    caches: &mut BatchResources<B>,
    host: HostBatch,
) -> Result<RenderBatch<B>, ResourceError> {
    let kind = host.kind;
    let count = host.instance_count();

    let geometry = caches.geometry.resolve(gpu, kind)?;
    let packed = pack_instances(Some(&host.transforms), Some(&host.colors), count)?;
    let instance_buffer = resources::create_buffer(
        gpu,
        &format!("{} Instance Buffer", kind.name()),
        (count * INSTANCE_STRIDE) as u64,
        wgpu::BufferUsages::VERTEX,
        Some(&packed),
    )?;
    let pipeline = caches.pipelines.get_or_create(gpu)?;

    log::trace!("{} batch: {count} instances", kind.name());

    Ok(RenderBatch {
        kind,
        instance_count: count as u32,
        transforms: host.transforms,
        colors: host.colors,
        geometry,
        instance_buffer,
        pipeline,
    })
}
