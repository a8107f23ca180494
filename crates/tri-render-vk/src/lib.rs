// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: brings up instance, device, swapchain and the triangle
//! pipeline, then drives one frame in flight at a time.
#![deny(unsafe_op_in_unsafe_fn)]

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

mod context;
mod device;
mod error;
mod frame;
mod instance;
mod pipeline;
mod queues;
mod settings;
mod swapchain;
mod teardown;

pub use context::RenderContext;
pub use device::{accepts_device_type, select_first};
pub use error::RenderError;
pub use frame::{FrameCycle, FrameOps, FramePhase};
pub use pipeline::{
  load_shader_code, load_shader_or_builtin, BUILTIN_FRAGMENT_SHADER, BUILTIN_VERTEX_SHADER,
  FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH,
};
pub use queues::{
  partition_queue_families, QueueAssignment, QueueIndex, QueuePlan, QueueRequest, QueueRole,
  QUEUE_PRIORITIES,
};
pub use settings::{present_mode_from_name, RenderSettings, DEFAULT_CLEAR_COLOR};
pub use swapchain::{
  choose_present_mode, choose_surface_format, clamp_extent, image_count, SwapchainChoice,
  SwapchainSupport,
};
pub use teardown::{Destroyer, OwnedHandles};

pub use ash::vk;

/// Writes the built-in shader binaries into `dir` under the file names the
/// renderer loads by default. Returns the written paths.
pub fn export_shaders(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
  let io = |path: &Path| {
    let path = path.to_path_buf();
    move |source| RenderError::ShaderIo { path, source }
  };
  fs::create_dir_all(dir).map_err(io(dir))?;

  let mut written = Vec::with_capacity(2);
  for (default_path, bytes) in [
    (VERTEX_SHADER_PATH, BUILTIN_VERTEX_SHADER),
    (FRAGMENT_SHADER_PATH, BUILTIN_FRAGMENT_SHADER),
  ] {
    let name = Path::new(default_path).file_name().unwrap_or_default();
    let path = dir.join(name);
    fs::write(&path, bytes).map_err(io(&path))?;
    info!("wrote `{}` ({} bytes)", path.display(), bytes.len());
    written.push(path);
  }
  Ok(written)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exported_shaders_load_back() {
    let dir = std::env::temp_dir().join(format!("tri-render-vk-export-{}", std::process::id()));
    let written = export_shaders(&dir).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("triangle.vert.spv"));
    assert!(written[1].ends_with("triangle.frag.spv"));
    for path in &written {
      let words = load_shader_code(path).unwrap();
      assert_eq!(words[0], 0x0723_0203, "SPIR-V magic");
    }
  }
}
