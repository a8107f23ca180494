// SPDX-License-Identifier: CEPL-1.0
use std::mem;

use ash::vk;
use tracing::debug;

use crate::frame::FrameSync;

/// Every handle the renderer creates, in creation order. Null (or empty, or
/// `false`) means "not created" or "already destroyed".
#[derive(Debug, Default)]
pub struct OwnedHandles {
  pub instance: bool,
  pub debug_messenger: vk::DebugUtilsMessengerEXT,
  pub surface: vk::SurfaceKHR,
  pub device: bool,
  pub swapchain: vk::SwapchainKHR,
  pub image_views: Vec<vk::ImageView>,
  pub render_pass: vk::RenderPass,
  pub pipeline_layout: vk::PipelineLayout,
  pub pipeline: vk::Pipeline,
  pub framebuffers: Vec<vk::Framebuffer>,
  pub command_pool: vk::CommandPool,
  pub command_buffer: vk::CommandBuffer,
  pub sync: FrameSync,
}

/// The destroy calls teardown is made of.
pub trait Destroyer {
  fn destroy_fence(&mut self, fence: vk::Fence);
  fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);
  fn free_command_buffer(&mut self, pool: vk::CommandPool, buffer: vk::CommandBuffer);
  fn destroy_command_pool(&mut self, pool: vk::CommandPool);
  fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);
  fn destroy_pipeline(&mut self, pipeline: vk::Pipeline);
  fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout);
  fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);
  fn destroy_image_view(&mut self, view: vk::ImageView);
  fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);
  fn destroy_device(&mut self);
  fn destroy_surface(&mut self, surface: vk::SurfaceKHR);
  fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);
  fn destroy_instance(&mut self);
}

/// Takes a handle out, leaving null behind. `None` when it was already null.
fn take<H: vk::Handle + Default + PartialEq>(slot: &mut H) -> Option<H> {
  let handle = mem::take(slot);
  (handle != H::default()).then_some(handle)
}

impl OwnedHandles {
  pub fn is_empty(&self) -> bool {
    !self.instance
      && !self.device
      && self.swapchain == vk::SwapchainKHR::null()
      && self.image_views.is_empty()
      && self.framebuffers.is_empty()
      && self.surface == vk::SurfaceKHR::null()
      && self.debug_messenger == vk::DebugUtilsMessengerEXT::null()
  }

  /// Destroys everything still held, newest first. Each handle is cleared
  /// as it goes, so a second call destroys nothing.
  ///
  /// The device must be idle before this is called.
  pub fn release(&mut self, d: &mut impl Destroyer) {
    // STRICT TEARDOWN ORDER (reverse of creation):
    // 1) sync objects
    if let Some(f) = take(&mut self.sync.in_flight) {
      d.destroy_fence(f);
    }
    if let Some(s) = take(&mut self.sync.render_finished) {
      d.destroy_semaphore(s);
    }
    if let Some(s) = take(&mut self.sync.image_available) {
      d.destroy_semaphore(s);
    }

    // 2) command buffer before its pool
    let buffer = take(&mut self.command_buffer);
    if let Some(pool) = take(&mut self.command_pool) {
      if let Some(buffer) = buffer {
        d.free_command_buffer(pool, buffer);
      }
      d.destroy_command_pool(pool);
    }

    // 3) framebuffers, then the pipeline objects they were built against
    for fb in self.framebuffers.drain(..).rev() {
      d.destroy_framebuffer(fb);
    }
    if let Some(p) = take(&mut self.pipeline) {
      d.destroy_pipeline(p);
    }
    if let Some(l) = take(&mut self.pipeline_layout) {
      d.destroy_pipeline_layout(l);
    }
    if let Some(rp) = take(&mut self.render_pass) {
      d.destroy_render_pass(rp);
    }

    // 4) views before the swapchain that owns their images
    for iv in self.image_views.drain(..).rev() {
      d.destroy_image_view(iv);
    }
    if let Some(sc) = take(&mut self.swapchain) {
      d.destroy_swapchain(sc);
    }

    // 5) device, then instance-level objects, instance last
    if mem::take(&mut self.device) {
      d.destroy_device();
    }
    if let Some(s) = take(&mut self.surface) {
      d.destroy_surface(s);
    }
    if let Some(m) = take(&mut self.debug_messenger) {
      d.destroy_debug_messenger(m);
    }
    if mem::take(&mut self.instance) {
      d.destroy_instance();
    }
    debug!("teardown complete");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ash::vk::Handle;

  #[derive(Default)]
  struct Recorder(Vec<String>);

  impl Destroyer for Recorder {
    fn destroy_fence(&mut self, fence: vk::Fence) {
      self.0.push(format!("fence:{}", fence.as_raw()));
    }
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
      self.0.push(format!("semaphore:{}", semaphore.as_raw()));
    }
    fn free_command_buffer(&mut self, _pool: vk::CommandPool, _buffer: vk::CommandBuffer) {
      self.0.push("command_buffer".into());
    }
    fn destroy_command_pool(&mut self, _pool: vk::CommandPool) {
      self.0.push("command_pool".into());
    }
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
      self.0.push(format!("framebuffer:{}", framebuffer.as_raw()));
    }
    fn destroy_pipeline(&mut self, _pipeline: vk::Pipeline) {
      self.0.push("pipeline".into());
    }
    fn destroy_pipeline_layout(&mut self, _layout: vk::PipelineLayout) {
      self.0.push("pipeline_layout".into());
    }
    fn destroy_render_pass(&mut self, _render_pass: vk::RenderPass) {
      self.0.push("render_pass".into());
    }
    fn destroy_image_view(&mut self, view: vk::ImageView) {
      self.0.push(format!("image_view:{}", view.as_raw()));
    }
    fn destroy_swapchain(&mut self, _swapchain: vk::SwapchainKHR) {
      self.0.push("swapchain".into());
    }
    fn destroy_device(&mut self) {
      self.0.push("device".into());
    }
    fn destroy_surface(&mut self, _surface: vk::SurfaceKHR) {
      self.0.push("surface".into());
    }
    fn destroy_debug_messenger(&mut self, _messenger: vk::DebugUtilsMessengerEXT) {
      self.0.push("debug_messenger".into());
    }
    fn destroy_instance(&mut self) {
      self.0.push("instance".into());
    }
  }

  fn fully_built() -> OwnedHandles {
    OwnedHandles {
      instance: true,
      debug_messenger: vk::DebugUtilsMessengerEXT::from_raw(1),
      surface: vk::SurfaceKHR::from_raw(2),
      device: true,
      swapchain: vk::SwapchainKHR::from_raw(3),
      image_views: vec![vk::ImageView::from_raw(10), vk::ImageView::from_raw(11)],
      render_pass: vk::RenderPass::from_raw(4),
      pipeline_layout: vk::PipelineLayout::from_raw(5),
      pipeline: vk::Pipeline::from_raw(6),
      framebuffers: vec![vk::Framebuffer::from_raw(20), vk::Framebuffer::from_raw(21)],
      command_pool: vk::CommandPool::from_raw(7),
      command_buffer: vk::CommandBuffer::from_raw(8),
      sync: FrameSync {
        image_available: vk::Semaphore::from_raw(30),
        render_finished: vk::Semaphore::from_raw(31),
        in_flight: vk::Fence::from_raw(32),
      },
    }
  }

  #[test]
  fn release_runs_in_reverse_creation_order() {
    let mut handles = fully_built();
    let mut rec = Recorder::default();
    handles.release(&mut rec);
    assert_eq!(
      rec.0,
      [
        "fence:32",
        "semaphore:31",
        "semaphore:30",
        "command_buffer",
        "command_pool",
        "framebuffer:21",
        "framebuffer:20",
        "pipeline",
        "pipeline_layout",
        "render_pass",
        "image_view:11",
        "image_view:10",
        "swapchain",
        "device",
        "surface",
        "debug_messenger",
        "instance",
      ]
    );
    assert!(handles.is_empty());
  }

  #[test]
  fn second_release_destroys_nothing() {
    let mut handles = fully_built();
    let mut rec = Recorder::default();
    handles.release(&mut rec);
    let first = rec.0.len();
    handles.release(&mut rec);
    assert_eq!(rec.0.len(), first);
  }

  #[test]
  fn partial_init_only_destroys_what_exists() {
    let mut handles = OwnedHandles {
      instance: true,
      debug_messenger: vk::DebugUtilsMessengerEXT::from_raw(1),
      surface: vk::SurfaceKHR::from_raw(2),
      device: true,
      swapchain: vk::SwapchainKHR::from_raw(3),
      image_views: vec![vk::ImageView::from_raw(10)],
      ..Default::default()
    };
    let mut rec = Recorder::default();
    handles.release(&mut rec);
    assert_eq!(
      rec.0,
      [
        "image_view:10",
        "swapchain",
        "device",
        "surface",
        "debug_messenger",
        "instance"
      ]
    );
  }

  #[test]
  fn nothing_built_nothing_destroyed() {
    let mut handles = OwnedHandles::default();
    assert!(handles.is_empty());
    let mut rec = Recorder::default();
    handles.release(&mut rec);
    assert!(rec.0.is_empty());
  }
}
