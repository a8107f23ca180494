// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use tracing::{debug, info};

use crate::error::RenderError;
use crate::queues::{partition_queue_families, QueueIndex, QueuePlan, QueueRole};
use crate::swapchain::SwapchainSupport;

/// Discrete always, integrated only when asked for.
pub fn accepts_device_type(ty: vk::PhysicalDeviceType, allow_integrated: bool) -> bool {
  ty == vk::PhysicalDeviceType::DISCRETE_GPU
    || (allow_integrated && ty == vk::PhysicalDeviceType::INTEGRATED_GPU)
}

/// First candidate, in the order given, whose type is accepted and whose
/// support query succeeds. The query is never run for rejected types.
pub fn select_first<C, S>(
  candidates: Vec<C>,
  mut accept: impl FnMut(&C) -> bool,
  mut query: impl FnMut(&C) -> Result<S, RenderError>,
) -> Result<(C, S), RenderError> {
  if candidates.is_empty() {
    return Err(RenderError::NoPhysicalDevice);
  }
  for candidate in candidates {
    if !accept(&candidate) {
      continue;
    }
    match query(&candidate) {
      Ok(support) => return Ok((candidate, support)),
      Err(e) => debug!("candidate skipped: {e}"),
    }
  }
  Err(RenderError::NoSuitableDevice)
}

pub struct PhysicalDeviceChoice {
  pub handle: vk::PhysicalDevice,
  pub name: String,
  pub support: SwapchainSupport,
}

struct Candidate {
  handle: vk::PhysicalDevice,
  name: String,
  device_type: vk::PhysicalDeviceType,
}

/// # Safety
/// `surface` must have been created from `instance`.
pub unsafe fn pick_physical_device(
  instance: &Instance,
  surface_loader: &surface::Instance,
  surface: vk::SurfaceKHR,
  allow_integrated: bool,
) -> Result<PhysicalDeviceChoice, RenderError> {
  debug!("Selecting physical device...");
  let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
    debug!("enumerate_physical_devices: {e}");
    RenderError::NoPhysicalDevice
  })?;

  let candidates = devices
    .into_iter()
    .map(|handle| {
      let props = unsafe { instance.get_physical_device_properties(handle) };
      let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
      debug!("  found `{name}` ({:?})", props.device_type);
      Candidate {
        handle,
        name,
        device_type: props.device_type,
      }
    })
    .collect();

  let (chosen, support) = select_first(
    candidates,
    |c| accepts_device_type(c.device_type, allow_integrated),
    |c| unsafe { SwapchainSupport::query(surface_loader, c.handle, surface) },
  )?;

  info!("Selected device: {}", chosen.name);
  Ok(PhysicalDeviceChoice {
    handle: chosen.handle,
    name: chosen.name,
    support,
  })
}

/// # Safety
/// `phys` must belong to `instance` and `surface` must have been created from it.
pub unsafe fn plan_queues(
  instance: &Instance,
  surface_loader: &surface::Instance,
  surface: vk::SurfaceKHR,
  phys: vk::PhysicalDevice,
) -> Result<QueuePlan, RenderError> {
  let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
  let plan = partition_queue_families(&families, |family| {
    unsafe { surface_loader.get_physical_device_surface_support(phys, family, surface) }
      .unwrap_or(false)
  })?;
  plan.log_table();
  Ok(plan)
}

/// # Safety
/// Every family in `plan` must exist on `phys`.
pub unsafe fn create_logical_device(
  instance: &Instance,
  phys: vk::PhysicalDevice,
  plan: &QueuePlan,
) -> Result<ash::Device, RenderError> {
  debug!("Creating logical device...");
  let priorities: Vec<Vec<f32>> = plan
    .active_requests()
    .enumerate()
    .map(|(position, r)| r.priorities(position))
    .collect();
  let queue_infos: Vec<vk::DeviceQueueCreateInfo> = plan
    .active_requests()
    .zip(&priorities)
    .map(|(r, priorities)| {
      vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: r.family,
        queue_count: priorities.len() as u32,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
      }
    })
    .collect();

  let features = vk::PhysicalDeviceFeatures {
    sampler_anisotropy: vk::TRUE,
    ..Default::default()
  };
  let device_exts = [swapchain::NAME.as_ptr()];

  let dci = vk::DeviceCreateInfo {
    s_type: vk::StructureType::DEVICE_CREATE_INFO,
    queue_create_info_count: queue_infos.len() as u32,
    p_queue_create_infos: queue_infos.as_ptr(),
    enabled_extension_count: device_exts.len() as u32,
    pp_enabled_extension_names: device_exts.as_ptr(),
    p_enabled_features: &features,
    ..Default::default()
  };

  let device = unsafe { instance.create_device(phys, &dci, None) }.map_err(RenderError::Device)?;
  info!("Logical device created");
  Ok(device)
}

/// One queue handle per role. Roles sharing a (family, index) get the same handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct Queues {
  pub graphics: vk::Queue,
  pub compute: vk::Queue,
  pub transfer: vk::Queue,
  pub present: vk::Queue,
}

impl Queues {
  /// # Safety
  /// `device` must have been created from `plan`.
  pub unsafe fn fetch(device: &ash::Device, plan: &QueuePlan) -> Self {
    let get = |role: QueueRole| {
      let QueueIndex { family, index } = plan.assignment.get(role);
      unsafe { device.get_device_queue(family, index) }
    };
    let queues = Self {
      graphics: get(QueueRole::Graphics),
      compute: get(QueueRole::Compute),
      transfer: get(QueueRole::Transfer),
      present: get(QueueRole::Present),
    };
    debug!(
      "queues: graphics {:?}, compute {:?}, transfer {:?}, present {:?}",
      queues.graphics, queues.compute, queues.transfer, queues.present
    );
    queues
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;

  #[derive(Debug, PartialEq)]
  struct Fake {
    name: &'static str,
    ty: vk::PhysicalDeviceType,
    can_present: bool,
  }

  fn fake(name: &'static str, ty: vk::PhysicalDeviceType, can_present: bool) -> Fake {
    Fake {
      name,
      ty,
      can_present,
    }
  }

  fn query(f: &Fake) -> Result<&'static str, RenderError> {
    if f.can_present {
      Ok(f.name)
    } else {
      Err(RenderError::NoPresentModes)
    }
  }

  #[test]
  fn empty_list_means_no_physical_device() {
    let r = select_first(Vec::<Fake>::new(), |_| true, query);
    assert!(matches!(r, Err(RenderError::NoPhysicalDevice)));
  }

  #[test]
  fn non_discrete_devices_are_skipped() {
    let devices = vec![
      fake("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU, true),
      fake("cpu", vk::PhysicalDeviceType::CPU, true),
      fake("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, true),
    ];
    let (chosen, _) =
      select_first(devices, |f| accepts_device_type(f.ty, false), query).unwrap();
    assert_eq!(chosen.name, "dgpu");
  }

  #[test]
  fn failing_support_query_is_never_selected() {
    let devices = vec![
      fake("first", vk::PhysicalDeviceType::DISCRETE_GPU, false),
      fake("second", vk::PhysicalDeviceType::DISCRETE_GPU, true),
      fake("third", vk::PhysicalDeviceType::DISCRETE_GPU, true),
    ];
    let (chosen, support) =
      select_first(devices, |f| accepts_device_type(f.ty, false), query).unwrap();
    assert_eq!(chosen.name, "second");
    assert_eq!(support, "second");
  }

  #[test]
  fn no_passing_candidate_is_no_suitable_device() {
    let devices = vec![
      fake("cpu", vk::PhysicalDeviceType::CPU, true),
      fake("headless", vk::PhysicalDeviceType::DISCRETE_GPU, false),
    ];
    let r = select_first(devices, |f| accepts_device_type(f.ty, false), query);
    assert!(matches!(r, Err(RenderError::NoSuitableDevice)));
  }

  #[test]
  fn rejected_types_are_not_queried() {
    let queried = RefCell::new(Vec::new());
    let devices = vec![
      fake("cpu", vk::PhysicalDeviceType::CPU, true),
      fake("virt", vk::PhysicalDeviceType::VIRTUAL_GPU, true),
      fake("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, true),
    ];
    let _ = select_first(
      devices,
      |f| accepts_device_type(f.ty, false),
      |f| {
        queried.borrow_mut().push(f.name);
        query(f)
      },
    );
    assert_eq!(*queried.borrow(), ["dgpu"]);
  }

  #[test]
  fn integrated_allowed_on_request() {
    assert!(!accepts_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU, false));
    assert!(accepts_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU, true));
    assert!(!accepts_device_type(vk::PhysicalDeviceType::CPU, true));
    assert!(accepts_device_type(vk::PhysicalDeviceType::DISCRETE_GPU, false));
  }
}
