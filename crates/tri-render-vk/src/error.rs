// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use ash::vk;

use crate::queues::QueueRole;

/// Every fallible step of bring-up and of the frame cycle, in creation order.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
  #[error("failed to load the Vulkan library: {0}")]
  Loader(#[from] ash::LoadingError),
  #[error("window handle unavailable: {0}")]
  Handle(#[from] raw_window_handle::HandleError),

  #[error("failed to create instance: {0}")]
  Instance(vk::Result),
  #[error("`{0}` is not exported by the instance")]
  MissingEntryPoint(&'static str),
  #[error("failed to create debug messenger: {0}")]
  DebugMessenger(vk::Result),
  #[error("failed to create surface: {0}")]
  Surface(vk::Result),

  #[error("failed to find GPUs with Vulkan support")]
  NoPhysicalDevice,
  #[error("no physical device is both of an accepted type and able to present")]
  NoSuitableDevice,
  #[error("swapchain support query failed: {0}")]
  SupportQuery(vk::Result),
  #[error("surface reports no formats")]
  NoSurfaceFormats,
  #[error("surface reports no present modes")]
  NoPresentModes,
  #[error("queue family indexes not found for {0:?}")]
  QueueFamiliesNotFound(Vec<QueueRole>),

  #[error("failed to create logical device: {0}")]
  Device(vk::Result),
  #[error("failed to create swapchain: {0}")]
  Swapchain(vk::Result),
  #[error("failed to create image view {index}: {result}")]
  ImageView { index: usize, result: vk::Result },

  #[error("failed to create render pass: {0}")]
  RenderPass(vk::Result),
  #[error("failed to read shader `{}`: {source}", path.display())]
  ShaderIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to create {stage} shader module: {result}")]
  ShaderModule {
    stage: &'static str,
    result: vk::Result,
  },
  #[error("failed to create pipeline layout: {0}")]
  PipelineLayout(vk::Result),
  #[error("failed to create graphics pipeline: {0}")]
  Pipeline(vk::Result),
  #[error("failed to create framebuffer {index}: {result}")]
  Framebuffer { index: usize, result: vk::Result },
  #[error("failed to create command pool: {0}")]
  CommandPool(vk::Result),
  #[error("failed to allocate command buffer: {0}")]
  CommandBuffer(vk::Result),
  #[error("failed to create sync objects: {0}")]
  SyncObjects(vk::Result),

  #[error("frame failed while {phase}: {result}")]
  Frame {
    phase: &'static str,
    result: vk::Result,
  },

  #[error("renderer has been shut down")]
  ShutDown,
}

impl RenderError {
  pub(crate) fn frame(phase: &'static str) -> impl FnOnce(vk::Result) -> Self {
    move |result| RenderError::Frame { phase, result }
  }
}
