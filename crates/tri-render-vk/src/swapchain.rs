// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::vk;
use tracing::{debug, info};
use tri_render::RenderSize;

use crate::error::RenderError;
use crate::queues::QueueAssignment;

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
  format: vk::Format::B8G8R8A8_SRGB,
  color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// What a surface offers on one physical device.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
  pub capabilities: vk::SurfaceCapabilitiesKHR,
  pub formats: Vec<vk::SurfaceFormatKHR>,
  pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
  /// Fails unless the capabilities query succeeds and at least one format
  /// and one present mode are reported.
  ///
  /// # Safety
  /// `phys` and `surface` must belong to the instance `loader` was built from.
  pub unsafe fn query(
    loader: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
  ) -> Result<Self, RenderError> {
    let capabilities =
      unsafe { loader.get_physical_device_surface_capabilities(phys, surface) }
        .map_err(RenderError::SupportQuery)?;
    let formats = unsafe { loader.get_physical_device_surface_formats(phys, surface) }
      .map_err(RenderError::SupportQuery)?;
    let present_modes =
      unsafe { loader.get_physical_device_surface_present_modes(phys, surface) }
        .map_err(RenderError::SupportQuery)?;
    Self {
      capabilities,
      formats,
      present_modes,
    }
    .validated()
  }

  pub fn validated(self) -> Result<Self, RenderError> {
    if self.formats.is_empty() {
      return Err(RenderError::NoSurfaceFormats);
    }
    if self.present_modes.is_empty() {
      return Err(RenderError::NoPresentModes);
    }
    Ok(self)
  }
}

/// First exact (BGRA8 sRGB, sRGB non-linear) match, else whatever comes first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
  formats
    .iter()
    .copied()
    .find(|f| {
      f.format == PREFERRED_SURFACE_FORMAT.format
        && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
    })
    .or_else(|| formats.first().copied())
}

/// `preferred` when offered, else FIFO, which every surface must support.
pub fn choose_present_mode(
  modes: &[vk::PresentModeKHR],
  preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
  if modes.contains(&preferred) {
    preferred
  } else {
    vk::PresentModeKHR::FIFO
  }
}

/// Requested size clamped component-wise into the surface's bounds.
pub fn clamp_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
  let (min, max) = (caps.min_image_extent, caps.max_image_extent);
  vk::Extent2D {
    width: want.width.max(min.width).min(max.width.max(min.width)),
    height: want.height.max(min.height).min(max.height.max(min.height)),
  }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
  let want = caps.min_image_count.saturating_add(1);
  if caps.max_image_count > 0 {
    want.min(caps.max_image_count)
  } else {
    want
  }
}

/// Images are shared between graphics and present families only when those differ.
pub fn sharing_mode(queues: &QueueAssignment) -> (vk::SharingMode, Vec<u32>) {
  let (g, p) = (queues.graphics.family, queues.present.family);
  if g != p {
    (vk::SharingMode::CONCURRENT, vec![g, p])
  } else {
    (vk::SharingMode::EXCLUSIVE, Vec::new())
  }
}

/// Everything decided before the swapchain exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainChoice {
  pub format: vk::SurfaceFormatKHR,
  pub present_mode: vk::PresentModeKHR,
  pub extent: vk::Extent2D,
  pub image_count: u32,
}

impl SwapchainChoice {
  pub fn negotiate(
    support: &SwapchainSupport,
    want: RenderSize,
    preferred_mode: vk::PresentModeKHR,
  ) -> Result<Self, RenderError> {
    let format = choose_surface_format(&support.formats).ok_or(RenderError::NoSurfaceFormats)?;
    Ok(Self {
      format,
      present_mode: choose_present_mode(&support.present_modes, preferred_mode),
      extent: clamp_extent(&support.capabilities, want),
      image_count: image_count(&support.capabilities),
    })
  }
}

/// # Safety
/// `surface` and `loader` must belong to the same instance and device, and the
/// queue families in `queues` must exist on that device.
pub unsafe fn create_swapchain(
  loader: &swapchain::Device,
  surface: vk::SurfaceKHR,
  support: &SwapchainSupport,
  choice: &SwapchainChoice,
  queues: &QueueAssignment,
) -> Result<vk::SwapchainKHR, RenderError> {
  info!(
    "format: {:?} / {:?}, present_mode: {:?}, extent: {}x{}, images(min={} → picked={})",
    choice.format.format,
    choice.format.color_space,
    choice.present_mode,
    choice.extent.width,
    choice.extent.height,
    support.capabilities.min_image_count,
    choice.image_count,
  );

  let (sharing, families) = sharing_mode(queues);
  let swap_info = vk::SwapchainCreateInfoKHR {
    s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
    surface,
    min_image_count: choice.image_count,
    image_format: choice.format.format,
    image_color_space: choice.format.color_space,
    image_extent: choice.extent,
    image_array_layers: 1,
    image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
    image_sharing_mode: sharing,
    queue_family_index_count: families.len() as u32,
    p_queue_family_indices: families.as_ptr(),
    pre_transform: support.capabilities.current_transform,
    composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
    present_mode: choice.present_mode,
    clipped: vk::TRUE,
    ..Default::default()
  };

  let handle =
    unsafe { loader.create_swapchain(&swap_info, None) }.map_err(RenderError::Swapchain)?;
  if handle == vk::SwapchainKHR::null() {
    return Err(RenderError::Swapchain(vk::Result::ERROR_INITIALIZATION_FAILED));
  }
  Ok(handle)
}

/// Creates one view per image, pushing each into `views` as soon as it
/// exists so a failure part-way leaves the earlier ones with their owner.
///
/// # Safety
/// `images` must be live images of `device` with `format`.
pub unsafe fn create_image_views(
  device: &ash::Device,
  images: &[vk::Image],
  format: vk::Format,
  views: &mut Vec<vk::ImageView>,
) -> Result<(), RenderError> {
  debug!("Creating image views...");
  for (index, &image) in images.iter().enumerate() {
    let iv_info = vk::ImageViewCreateInfo {
      s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
      image,
      view_type: vk::ImageViewType::TYPE_2D,
      format,
      components: vk::ComponentMapping {
        r: vk::ComponentSwizzle::IDENTITY,
        g: vk::ComponentSwizzle::IDENTITY,
        b: vk::ComponentSwizzle::IDENTITY,
        a: vk::ComponentSwizzle::IDENTITY,
      },
      subresource_range: vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
      },
      ..Default::default()
    };
    let view = unsafe { device.create_image_view(&iv_info, None) }
      .map_err(|result| RenderError::ImageView { index, result })?;
    views.push(view);
  }
  Ok(())
}
