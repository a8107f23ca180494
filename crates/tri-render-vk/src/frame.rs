// SPDX-License-Identifier: CEPL-1.0
//! Per-frame resources and the single-frame-in-flight cycle.
//!
//! ```text
//! IDLE → ACQUIRING → RECORDING → SUBMITTED → PRESENTING → IDLE
//! ```
//!
//! The in-flight fence is reset before anything is guaranteed to signal it
//! again. A frame abandoned after that point makes up for it with an empty
//! submission, so the next wait always has something to wait for.

use std::fmt;

use ash::vk;
use tracing::{debug, trace, warn};

use crate::error::RenderError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramePhase {
  #[default]
  Idle,
  Acquiring,
  Recording,
  Submitted,
  Presenting,
}

impl fmt::Display for FramePhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      FramePhase::Idle => "idle",
      FramePhase::Acquiring => "acquiring",
      FramePhase::Recording => "recording",
      FramePhase::Submitted => "submitted",
      FramePhase::Presenting => "presenting",
    })
  }
}

/// The GPU calls one frame is made of.
pub trait FrameOps {
  /// Blocks until the in-flight fence is signaled.
  fn wait_in_flight(&mut self) -> Result<(), RenderError>;
  fn reset_in_flight(&mut self) -> Result<(), RenderError>;
  /// Signals "image available" once the returned image can be drawn to.
  fn acquire_image(&mut self) -> Result<u32, RenderError>;
  fn reset_commands(&mut self) -> Result<(), RenderError>;
  fn record(&mut self, image_index: u32) -> Result<(), RenderError>;
  /// Waits on "image available", signals "render finished" and the fence.
  fn submit(&mut self) -> Result<(), RenderError>;
  fn present(&mut self, image_index: u32) -> Result<(), RenderError>;
  /// Submits no work but signals the in-flight fence, consuming "image
  /// available" first when `wait_image_available` is set.
  fn signal_skipped(&mut self, wait_image_available: bool) -> Result<(), RenderError>;
}

/// Drives [`FrameOps`] through one frame at a time.
#[derive(Debug, Default)]
pub struct FrameCycle {
  phase: FramePhase,
  // Set when the fence was reset and the make-up submission failed too.
  owed: Option<bool>,
}

impl FrameCycle {
  pub fn phase(&self) -> FramePhase {
    self.phase
  }

  /// Whether the fence is known to be unsignaled with nothing queued to signal it.
  pub fn fence_owed(&self) -> bool {
    self.owed.is_some()
  }

  pub fn run(&mut self, ops: &mut impl FrameOps) -> Result<(), RenderError> {
    if let Some(wait_image_available) = self.owed {
      ops.signal_skipped(wait_image_available)?;
      debug!("in-flight fence re-armed");
      self.owed = None;
    }
    let result = self.cycle(ops);
    self.enter(FramePhase::Idle);
    result
  }

  fn cycle(&mut self, ops: &mut impl FrameOps) -> Result<(), RenderError> {
    ops.wait_in_flight()?;
    ops.reset_in_flight()?;

    self.enter(FramePhase::Acquiring);
    let image = ops
      .acquire_image()
      .map_err(|e| self.abandon(&mut *ops, false, e))?;

    self.enter(FramePhase::Recording);
    ops.reset_commands()
      .and_then(|()| ops.record(image))
      .map_err(|e| self.abandon(&mut *ops, true, e))?;

    ops.submit().map_err(|e| self.abandon(&mut *ops, true, e))?;
    self.enter(FramePhase::Submitted);

    self.enter(FramePhase::Presenting);
    ops.present(image)
  }

  fn enter(&mut self, phase: FramePhase) {
    if self.phase != phase {
      trace!("frame: {} → {}", self.phase, phase);
      self.phase = phase;
    }
  }

  fn abandon(
    &mut self,
    ops: &mut impl FrameOps,
    wait_image_available: bool,
    err: RenderError,
  ) -> RenderError {
    warn!("frame abandoned while {}", self.phase);
    if let Err(e) = ops.signal_skipped(wait_image_available) {
      warn!("could not signal the in-flight fence: {e}");
      self.owed = Some(wait_image_available);
    }
    err
  }
}

/// "image available", "render finished" and the in-flight fence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSync {
  pub image_available: vk::Semaphore,
  pub render_finished: vk::Semaphore,
  pub in_flight: vk::Fence,
}

/// Fills `sync` one object at a time, so whatever exists when a creation
/// fails is still reachable through it. The fence starts signaled.
///
/// # Safety
/// `device` must be a live logical device.
pub unsafe fn create_sync_objects(
  device: &ash::Device,
  sync: &mut FrameSync,
) -> Result<(), RenderError> {
  debug!("Creating sync objects...");
  let sem_ci = vk::SemaphoreCreateInfo::default();
  let fence_ci = vk::FenceCreateInfo {
    s_type: vk::StructureType::FENCE_CREATE_INFO,
    flags: vk::FenceCreateFlags::SIGNALED,
    ..Default::default()
  };
  unsafe {
    sync.image_available = device
      .create_semaphore(&sem_ci, None)
      .map_err(RenderError::SyncObjects)?;
    sync.render_finished = device
      .create_semaphore(&sem_ci, None)
      .map_err(RenderError::SyncObjects)?;
    sync.in_flight = device
      .create_fence(&fence_ci, None)
      .map_err(RenderError::SyncObjects)?;
  }
  Ok(())
}

/// One framebuffer per view, pushed into `out` as each is created.
///
/// # Safety
/// `render_pass` and `views` must belong to `device`.
pub unsafe fn create_framebuffers(
  device: &ash::Device,
  render_pass: vk::RenderPass,
  views: &[vk::ImageView],
  extent: vk::Extent2D,
  out: &mut Vec<vk::Framebuffer>,
) -> Result<(), RenderError> {
  debug!("Creating framebuffers...");
  for (index, view) in views.iter().enumerate() {
    let fb_info = vk::FramebufferCreateInfo {
      s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
      render_pass,
      attachment_count: 1,
      p_attachments: view,
      width: extent.width,
      height: extent.height,
      layers: 1,
      ..Default::default()
    };
    let fb = unsafe { device.create_framebuffer(&fb_info, None) }
      .map_err(|result| RenderError::Framebuffer { index, result })?;
    out.push(fb);
  }
  Ok(())
}

/// # Safety
/// `family` must be a queue family of `device`.
pub unsafe fn create_command_pool(
  device: &ash::Device,
  family: u32,
) -> Result<vk::CommandPool, RenderError> {
  let pool_info = vk::CommandPoolCreateInfo {
    s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
    flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
    queue_family_index: family,
    ..Default::default()
  };
  unsafe { device.create_command_pool(&pool_info, None) }.map_err(RenderError::CommandPool)
}

/// # Safety
/// `pool` must belong to `device`.
pub unsafe fn allocate_command_buffer(
  device: &ash::Device,
  pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, RenderError> {
  let alloc = vk::CommandBufferAllocateInfo {
    s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
    command_pool: pool,
    level: vk::CommandBufferLevel::PRIMARY,
    command_buffer_count: 1,
    ..Default::default()
  };
  let bufs = unsafe { device.allocate_command_buffers(&alloc) }
    .map_err(RenderError::CommandBuffer)?;
  bufs.first()
    .copied()
    .ok_or(RenderError::CommandBuffer(vk::Result::ERROR_UNKNOWN))
}

/// Everything one recording of the triangle needs.
pub struct RecordTarget {
  pub cmd: vk::CommandBuffer,
  pub render_pass: vk::RenderPass,
  pub framebuffer: vk::Framebuffer,
  pub pipeline: vk::Pipeline,
  pub extent: vk::Extent2D,
  pub clear_color: [f32; 4],
}

/// Viewport covering the whole target, depth 0..1.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
  vk::Viewport {
    x: 0.0,
    y: 0.0,
    width: extent.width as f32,
    height: extent.height as f32,
    min_depth: 0.0,
    max_depth: 1.0,
  }
}

/// # Safety
/// `target.cmd` must be reset and every handle in `target` must belong to `device`.
pub unsafe fn record_triangle(
  device: &ash::Device,
  target: &RecordTarget,
) -> Result<(), RenderError> {
  let begin = vk::CommandBufferBeginInfo {
    s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
    ..Default::default()
  };
  let clear = vk::ClearValue {
    color: vk::ClearColorValue {
      float32: target.clear_color,
    },
  };
  let area = vk::Rect2D {
    offset: vk::Offset2D { x: 0, y: 0 },
    extent: target.extent,
  };
  let rp_begin = vk::RenderPassBeginInfo {
    s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
    render_pass: target.render_pass,
    framebuffer: target.framebuffer,
    render_area: area,
    clear_value_count: 1,
    p_clear_values: &clear,
    ..Default::default()
  };

  unsafe {
    device
      .begin_command_buffer(target.cmd, &begin)
      .map_err(RenderError::frame("beginning the command buffer"))?;
    device.cmd_begin_render_pass(target.cmd, &rp_begin, vk::SubpassContents::INLINE);
    device.cmd_bind_pipeline(target.cmd, vk::PipelineBindPoint::GRAPHICS, target.pipeline);
    device.cmd_set_viewport(target.cmd, 0, &[full_viewport(target.extent)]);
    device.cmd_set_scissor(target.cmd, 0, &[area]);
    device.cmd_draw(target.cmd, 3, 1, 0, 0);
    device.cmd_end_render_pass(target.cmd);
    device
      .end_command_buffer(target.cmd)
      .map_err(RenderError::frame("ending the command buffer"))?;
  }
  Ok(())
}
