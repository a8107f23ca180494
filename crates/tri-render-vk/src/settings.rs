// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use ash::vk;

use crate::pipeline::{FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH};

pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.1, 1.0];

/// Knobs fixed at construction time.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
  /// Application and engine name reported to the driver.
  pub app_name: String,
  /// Validation layer, debug-utils extension and messenger.
  pub validation: bool,
  pub allow_integrated: bool,
  pub clear_color: [f32; 4],
  /// Used when the surface offers it; FIFO otherwise.
  pub present_mode: vk::PresentModeKHR,
  pub vertex_shader: PathBuf,
  pub fragment_shader: PathBuf,
}

impl Default for RenderSettings {
  fn default() -> Self {
    Self {
      app_name: "Triangle".into(),
      validation: true,
      allow_integrated: false,
      clear_color: DEFAULT_CLEAR_COLOR,
      present_mode: vk::PresentModeKHR::MAILBOX,
      vertex_shader: VERTEX_SHADER_PATH.into(),
      fragment_shader: FRAGMENT_SHADER_PATH.into(),
    }
  }
}

/// `mailbox`, `fifo`, `fifo_relaxed` or `immediate`, any case.
pub fn present_mode_from_name(name: &str) -> Option<vk::PresentModeKHR> {
  match name.trim().to_ascii_lowercase().as_str() {
    "mailbox" => Some(vk::PresentModeKHR::MAILBOX),
    "fifo" | "vsync" => Some(vk::PresentModeKHR::FIFO),
    "fifo_relaxed" => Some(vk::PresentModeKHR::FIFO_RELAXED),
    "immediate" => Some(vk::PresentModeKHR::IMMEDIATE),
    _ => None,
  }
}
