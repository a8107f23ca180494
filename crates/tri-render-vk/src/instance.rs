// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use ash::{ext::debug_utils, vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn, Level};

use crate::error::RenderError;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
pub const APP_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);
const CREATE_MESSENGER_FN: &CStr = c"vkCreateDebugUtilsMessengerEXT";

/// Builds the instance with whatever surface extensions `display` needs.
/// With `validation` the debug-utils extension and the Khronos validation
/// layer are enabled on top.
///
/// # Safety
/// `entry` must stay loaded for as long as the returned instance lives.
pub unsafe fn create_instance(
  entry: &Entry,
  display: RawDisplayHandle,
  app_name: &CStr,
  validation: bool,
) -> Result<Instance, RenderError> {
  debug!("Creating instance...");
  let app_info = vk::ApplicationInfo {
    s_type: vk::StructureType::APPLICATION_INFO,
    p_application_name: app_name.as_ptr(),
    application_version: APP_VERSION,
    p_engine_name: app_name.as_ptr(),
    engine_version: APP_VERSION,
    api_version: vk::API_VERSION_1_3,
    ..Default::default()
  };

  let mut extensions = ash_window::enumerate_required_extensions(display)
    .map_err(RenderError::Instance)?
    .to_vec();
  let layers = if validation {
    extensions.push(debug_utils::NAME.as_ptr());
    vec![VALIDATION_LAYER.as_ptr()]
  } else {
    Vec::new()
  };

  for &ext in &extensions {
    debug!("  extension {:?}", unsafe { CStr::from_ptr(ext) });
  }

  let create_info = vk::InstanceCreateInfo {
    s_type: vk::StructureType::INSTANCE_CREATE_INFO,
    p_application_info: &app_info,
    enabled_extension_count: extensions.len() as u32,
    pp_enabled_extension_names: extensions.as_ptr(),
    enabled_layer_count: layers.len() as u32,
    pp_enabled_layer_names: layers.as_ptr(),
    ..Default::default()
  };

  let instance =
    unsafe { entry.create_instance(&create_info, None) }.map_err(RenderError::Instance)?;
  info!("Vulkan instance created (validation: {validation})");
  Ok(instance)
}

pub struct DebugMessenger {
  pub loader: debug_utils::Instance,
  pub handle: vk::DebugUtilsMessengerEXT,
}

/// Installs [`debug_callback`] for verbose, warning and error messages of
/// every general, validation and performance kind.
///
/// # Safety
/// `instance` must have been created from `entry` with debug-utils enabled.
pub unsafe fn setup_debug_messenger(
  entry: &Entry,
  instance: &Instance,
) -> Result<DebugMessenger, RenderError> {
  debug!("Creating debug messenger...");
  let create_fn =
    unsafe { entry.get_instance_proc_addr(instance.handle(), CREATE_MESSENGER_FN.as_ptr()) };
  if create_fn.is_none() {
    return Err(RenderError::MissingEntryPoint("vkCreateDebugUtilsMessengerEXT"));
  }

  let loader = debug_utils::Instance::new(entry, instance);
  let ci = vk::DebugUtilsMessengerCreateInfoEXT {
    s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
      | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
      | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
      | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
      | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
    pfn_user_callback: Some(debug_callback),
    ..Default::default()
  };
  let handle = unsafe { loader.create_debug_utils_messenger(&ci, None) }
    .map_err(RenderError::DebugMessenger)?;
  Ok(DebugMessenger { loader, handle })
}

/// Most severe bit wins.
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
  use vk::DebugUtilsMessageSeverityFlagsEXT as S;
  if severity.contains(S::ERROR) {
    Level::ERROR
  } else if severity.contains(S::WARNING) {
    Level::WARN
  } else if severity.contains(S::INFO) {
    Level::INFO
  } else {
    Level::TRACE
  }
}

unsafe extern "system" fn debug_callback(
  severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  types: vk::DebugUtilsMessageTypeFlagsEXT,
  data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
  _user: *mut c_void,
) -> vk::Bool32 {
  if data.is_null() {
    return vk::FALSE;
  }
  let p_message = unsafe { (*data).p_message };
  if p_message.is_null() {
    return vk::FALSE;
  }
  let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

  let level = severity_level(severity);
  if level == Level::ERROR {
    error!(target: "vulkan", ?types, "{msg}");
  } else if level == Level::WARN {
    warn!(target: "vulkan", ?types, "{msg}");
  } else if level == Level::INFO {
    info!(target: "vulkan", ?types, "{msg}");
  } else {
    trace!(target: "vulkan", ?types, "{msg}");
  }
  vk::FALSE
}
