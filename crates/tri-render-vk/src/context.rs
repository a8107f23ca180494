// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use anyhow::Result;
use ash::{
  ext::debug_utils,
  khr::{surface, swapchain},
  vk, Entry,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, trace, warn};
use tri_render::{RenderSize, Renderer};

use crate::device::{create_logical_device, pick_physical_device, plan_queues, Queues};
use crate::error::RenderError;
use crate::frame::{
  allocate_command_buffer, create_command_pool, create_framebuffers, create_sync_objects,
  record_triangle, FrameCycle, FrameOps, RecordTarget,
};
use crate::instance::{create_instance, setup_debug_messenger};
use crate::pipeline::{
  create_graphics_pipeline, create_pipeline_layout, create_render_pass, load_shader_or_builtin,
  BUILTIN_FRAGMENT_SHADER, BUILTIN_VERTEX_SHADER,
};
use crate::settings::RenderSettings;
use crate::swapchain::{create_image_views, create_swapchain, SwapchainChoice};
use crate::teardown::{Destroyer, OwnedHandles};

/// Owns every GPU object the triangle needs. Built in one go by
/// [`RenderContext::new`]; whatever was created before a failure is torn
/// down when the half-built context is dropped.
pub struct RenderContext {
  entry: Entry,
  instance: Option<ash::Instance>,
  debug_loader: Option<debug_utils::Instance>,
  surface_loader: Option<surface::Instance>,
  device: Option<ash::Device>,
  swapchain_loader: Option<swapchain::Device>,

  device_name: String,
  queues: Queues,
  swapchain: Option<SwapchainChoice>,
  images: Vec<vk::Image>,
  handles: OwnedHandles,

  clear_color: [f32; 4],
  cycle: FrameCycle,
}

impl RenderContext {
  pub fn new(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    settings: &RenderSettings,
  ) -> Result<Self, RenderError> {
    let entry = unsafe { Entry::load() }?;
    let mut ctx = Self {
      entry,
      instance: None,
      debug_loader: None,
      surface_loader: None,
      device: None,
      swapchain_loader: None,
      device_name: String::new(),
      queues: Queues::default(),
      swapchain: None,
      images: Vec::new(),
      handles: OwnedHandles::default(),
      clear_color: settings.clear_color,
      cycle: FrameCycle::default(),
    };
    ctx.init(window, display, size, settings)?;
    Ok(ctx)
  }

  // STRICT ORDER:
  // instance → debug messenger → surface → physical device → queues →
  // logical device → swapchain → views → render pass → pipeline →
  // framebuffers → command pool/buffer → sync objects.
  // Each handle lands in `self.handles` the moment it exists.
  fn init(
    &mut self,
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    settings: &RenderSettings,
  ) -> Result<(), RenderError> {
    let display_raw = display.display_handle()?.as_raw();
    let window_raw = window.window_handle()?.as_raw();

    // --- Instance (+ diagnostics) ---
    let app_name = CString::new(settings.app_name.as_str()).unwrap_or_default();
    let instance =
      unsafe { create_instance(&self.entry, display_raw, &app_name, settings.validation) }?;
    self.instance = Some(instance.clone());
    self.handles.instance = true;

    if settings.validation {
      let messenger = unsafe { setup_debug_messenger(&self.entry, &instance) }?;
      self.handles.debug_messenger = messenger.handle;
      self.debug_loader = Some(messenger.loader);
    }

    // --- Surface from THIS instance ---
    let surface_loader = surface::Instance::new(&self.entry, &instance);
    self.surface_loader = Some(surface_loader.clone());
    let surface = unsafe {
      ash_window::create_surface(&self.entry, &instance, display_raw, window_raw, None)
    }
    .map_err(RenderError::Surface)?;
    self.handles.surface = surface;

    // --- Physical device, queue plan, logical device ---
    let phys = unsafe {
      pick_physical_device(&instance, &surface_loader, surface, settings.allow_integrated)
    }?;
    self.device_name = phys.name.clone();
    let plan = unsafe { plan_queues(&instance, &surface_loader, surface, phys.handle) }?;

    let device = unsafe { create_logical_device(&instance, phys.handle, &plan) }?;
    self.device = Some(device.clone());
    self.handles.device = true;
    self.queues = unsafe { Queues::fetch(&device, &plan) };

    // --- Swapchain, images, views ---
    let swapchain_loader = swapchain::Device::new(&instance, &device);
    self.swapchain_loader = Some(swapchain_loader.clone());
    let choice = SwapchainChoice::negotiate(&phys.support, size, settings.present_mode)?;
    let swapchain = unsafe {
      create_swapchain(&swapchain_loader, surface, &phys.support, &choice, &plan.assignment)
    }?;
    self.handles.swapchain = swapchain;
    self.swapchain = Some(choice);

    self.images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
      .map_err(RenderError::Swapchain)?;
    unsafe {
      create_image_views(
        &device,
        &self.images,
        choice.format.format,
        &mut self.handles.image_views,
      )
    }?;

    // --- Render pass + pipeline ---
    self.handles.render_pass = unsafe { create_render_pass(&device, choice.format.format) }?;
    let vert = load_shader_or_builtin(&settings.vertex_shader, BUILTIN_VERTEX_SHADER)?;
    let frag = load_shader_or_builtin(&settings.fragment_shader, BUILTIN_FRAGMENT_SHADER)?;
    self.handles.pipeline_layout = unsafe { create_pipeline_layout(&device) }?;
    self.handles.pipeline = unsafe {
      create_graphics_pipeline(
        &device,
        self.handles.pipeline_layout,
        self.handles.render_pass,
        &vert,
        &frag,
      )
    }?;

    // --- Frame resources ---
    unsafe {
      create_framebuffers(
        &device,
        self.handles.render_pass,
        &self.handles.image_views,
        choice.extent,
        &mut self.handles.framebuffers,
      )
    }?;
    self.handles.command_pool =
      unsafe { create_command_pool(&device, plan.assignment.graphics.family) }?;
    self.handles.command_buffer =
      unsafe { allocate_command_buffer(&device, self.handles.command_pool) }?;
    unsafe { create_sync_objects(&device, &mut self.handles.sync) }?;

    info!(
      "Renderer ready on `{}`: {} image(s), {}x{}",
      self.device_name,
      self.images.len(),
      choice.extent.width,
      choice.extent.height
    );
    Ok(())
  }

  pub fn device_name(&self) -> &str {
    &self.device_name
  }

  /// One frame. Errors mean the frame was skipped; the context stays usable.
  pub fn draw_frame(&mut self) -> Result<(), RenderError> {
    let (Some(device), Some(loader), Some(choice)) =
      (&self.device, &self.swapchain_loader, &self.swapchain)
    else {
      return Err(RenderError::ShutDown);
    };
    let mut driver = FrameDriver {
      device,
      loader,
      queues: self.queues,
      handles: &self.handles,
      extent: choice.extent,
      clear_color: self.clear_color,
    };
    self.cycle.run(&mut driver)
  }

  /// Waits for the device to go idle, then destroys everything in reverse
  /// creation order. Safe to call more than once.
  pub fn shutdown(&mut self) {
    if self.handles.is_empty() {
      return;
    }
    if let Some(device) = &self.device {
      if let Err(e) = unsafe { device.device_wait_idle() } {
        warn!("device_wait_idle failed during shutdown: {e}");
      }
    }

    let mut destroyer = VkDestroyer {
      instance: self.instance.as_ref(),
      debug: self.debug_loader.as_ref(),
      surface: self.surface_loader.as_ref(),
      device: self.device.as_ref(),
      swapchain: self.swapchain_loader.as_ref(),
    };
    self.handles.release(&mut destroyer);

    self.images.clear();
    self.swapchain = None;
    self.swapchain_loader = None;
    self.device = None;
    self.surface_loader = None;
    self.debug_loader = None;
    self.instance = None;
    info!("Renderer shut down");
  }
}

impl Drop for RenderContext {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl Renderer for RenderContext {
  fn render(&mut self) -> Result<()> {
    Ok(self.draw_frame()?)
  }

  fn set_clear_color(&mut self, rgba: [f32; 4]) {
    self.clear_color = rgba;
  }

  fn size(&self) -> RenderSize {
    self.swapchain
      .map(|c| RenderSize::new(c.extent.width, c.extent.height))
      .unwrap_or(RenderSize::new(0, 0))
  }

  fn shutdown(&mut self) {
    RenderContext::shutdown(self);
  }
}

/// [`FrameOps`] over the live handles of one context.
struct FrameDriver<'a> {
  device: &'a ash::Device,
  loader: &'a swapchain::Device,
  queues: Queues,
  handles: &'a OwnedHandles,
  extent: vk::Extent2D,
  clear_color: [f32; 4],
}

const WAIT_STAGES: [vk::PipelineStageFlags; 1] = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];

impl FrameOps for FrameDriver<'_> {
  fn wait_in_flight(&mut self) -> Result<(), RenderError> {
    unsafe {
      self.device
        .wait_for_fences(&[self.handles.sync.in_flight], true, u64::MAX)
    }
    .map_err(RenderError::frame("waiting for the in-flight fence"))
  }

  fn reset_in_flight(&mut self) -> Result<(), RenderError> {
    unsafe { self.device.reset_fences(&[self.handles.sync.in_flight]) }
      .map_err(RenderError::frame("resetting the in-flight fence"))
  }

  fn acquire_image(&mut self) -> Result<u32, RenderError> {
    let (index, suboptimal) = unsafe {
      self.loader.acquire_next_image(
        self.handles.swapchain,
        u64::MAX,
        self.handles.sync.image_available,
        vk::Fence::null(),
      )
    }
    .map_err(RenderError::frame("acquiring an image"))?;
    if suboptimal {
      trace!("swapchain is suboptimal for the surface");
    }
    Ok(index)
  }

  fn reset_commands(&mut self) -> Result<(), RenderError> {
    unsafe {
      self.device.reset_command_buffer(
        self.handles.command_buffer,
        vk::CommandBufferResetFlags::empty(),
      )
    }
    .map_err(RenderError::frame("resetting the command buffer"))
  }

  fn record(&mut self, image_index: u32) -> Result<(), RenderError> {
    let framebuffer = self
      .handles
      .framebuffers
      .get(image_index as usize)
      .copied()
      .ok_or(RenderError::Frame {
        phase: "looking up the framebuffer",
        result: vk::Result::ERROR_OUT_OF_DATE_KHR,
      })?;
    let target = RecordTarget {
      cmd: self.handles.command_buffer,
      render_pass: self.handles.render_pass,
      framebuffer,
      pipeline: self.handles.pipeline,
      extent: self.extent,
      clear_color: self.clear_color,
    };
    unsafe { record_triangle(self.device, &target) }
  }

  fn submit(&mut self) -> Result<(), RenderError> {
    let sync = &self.handles.sync;
    let submit = vk::SubmitInfo {
      s_type: vk::StructureType::SUBMIT_INFO,
      wait_semaphore_count: 1,
      p_wait_semaphores: &sync.image_available,
      p_wait_dst_stage_mask: WAIT_STAGES.as_ptr(),
      command_buffer_count: 1,
      p_command_buffers: &self.handles.command_buffer,
      signal_semaphore_count: 1,
      p_signal_semaphores: &sync.render_finished,
      ..Default::default()
    };
    unsafe {
      self.device.queue_submit(
        self.queues.graphics,
        std::slice::from_ref(&submit),
        sync.in_flight,
      )
    }
    .map_err(RenderError::frame("submitting"))
  }

  fn present(&mut self, image_index: u32) -> Result<(), RenderError> {
    let present = vk::PresentInfoKHR {
      s_type: vk::StructureType::PRESENT_INFO_KHR,
      wait_semaphore_count: 1,
      p_wait_semaphores: &self.handles.sync.render_finished,
      swapchain_count: 1,
      p_swapchains: &self.handles.swapchain,
      p_image_indices: &image_index,
      ..Default::default()
    };
    let suboptimal = unsafe { self.loader.queue_present(self.queues.present, &present) }
      .map_err(RenderError::frame("presenting"))?;
    if suboptimal {
      trace!("present reported a suboptimal swapchain");
    }
    Ok(())
  }

  fn signal_skipped(&mut self, wait_image_available: bool) -> Result<(), RenderError> {
    let sync = &self.handles.sync;
    let submit = if wait_image_available {
      vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        wait_semaphore_count: 1,
        p_wait_semaphores: &sync.image_available,
        p_wait_dst_stage_mask: WAIT_STAGES.as_ptr(),
        ..Default::default()
      }
    } else {
      vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        ..Default::default()
      }
    };
    unsafe {
      self.device.queue_submit(
        self.queues.graphics,
        std::slice::from_ref(&submit),
        sync.in_flight,
      )
    }
    .map_err(RenderError::frame("signaling a skipped frame"))
  }
}

/// [`Destroyer`] backed by the real loaders. Objects whose loader is gone are
/// skipped; `release` never hands those out.
struct VkDestroyer<'a> {
  instance: Option<&'a ash::Instance>,
  debug: Option<&'a debug_utils::Instance>,
  surface: Option<&'a surface::Instance>,
  device: Option<&'a ash::Device>,
  swapchain: Option<&'a swapchain::Device>,
}

impl Destroyer for VkDestroyer<'_> {
  fn destroy_fence(&mut self, fence: vk::Fence) {
    if let Some(d) = self.device {
      unsafe { d.destroy_fence(fence, None) };
    }
  }

  fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
    if let Some(d) = self.device {
      unsafe { d.destroy_semaphore(semaphore, None) };
    }
  }

  fn free_command_buffer(&mut self, pool: vk::CommandPool, buffer: vk::CommandBuffer) {
    if let Some(d) = self.device {
      unsafe { d.free_command_buffers(pool, &[buffer]) };
    }
  }

  fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
    if let Some(d) = self.device {
      unsafe { d.destroy_command_pool(pool, None) };
    }
  }

  fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
    if let Some(d) = self.device {
      unsafe { d.destroy_framebuffer(framebuffer, None) };
    }
  }

  fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
    if let Some(d) = self.device {
      unsafe { d.destroy_pipeline(pipeline, None) };
    }
  }

  fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
    if let Some(d) = self.device {
      unsafe { d.destroy_pipeline_layout(layout, None) };
    }
  }

  fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
    if let Some(d) = self.device {
      unsafe { d.destroy_render_pass(render_pass, None) };
    }
  }

  fn destroy_image_view(&mut self, view: vk::ImageView) {
    if let Some(d) = self.device {
      unsafe { d.destroy_image_view(view, None) };
    }
  }

  fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
    if let Some(s) = self.swapchain {
      unsafe { s.destroy_swapchain(swapchain, None) };
    }
  }

  fn destroy_device(&mut self) {
    if let Some(d) = self.device {
      unsafe { d.destroy_device(None) };
    }
  }

  fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
    if let Some(s) = self.surface {
      unsafe { s.destroy_surface(surface, None) };
    }
  }

  fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
    if let Some(dbg) = self.debug {
      unsafe { dbg.destroy_debug_utils_messenger(messenger, None) };
    }
  }

  fn destroy_instance(&mut self) {
    if let Some(i) = self.instance {
      unsafe { i.destroy_instance(None) };
    }
  }
}
