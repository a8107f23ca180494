// SPDX-License-Identifier: CEPL-1.0
use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

use ash::{util::read_spv, vk};
use tracing::{debug, info};

use crate::error::RenderError;

pub const VERTEX_SHADER_PATH: &str = "shader/triangle.vert.spv";
pub const FRAGMENT_SHADER_PATH: &str = "shader/triangle.frag.spv";

/// SPIR-V compiled from `shaders/` by the build script.
pub const BUILTIN_VERTEX_SHADER: &[u8] =
  include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
pub const BUILTIN_FRAGMENT_SHADER: &[u8] =
  include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Reads a whole SPIR-V file into words. Missing, unreadable or misaligned
/// files all come back as [`RenderError::ShaderIo`].
pub fn load_shader_code(path: &Path) -> Result<Vec<u32>, RenderError> {
  let io = |source| RenderError::ShaderIo {
    path: path.to_path_buf(),
    source,
  };
  let mut file = File::open(path).map_err(io)?;
  let code = read_spv(&mut file).map_err(io)?;
  debug!("loaded `{}` ({} words)", path.display(), code.len());
  Ok(code)
}

/// [`load_shader_code`], except that a file which does not exist yields
/// `builtin` instead. Any other read failure is still an error.
pub fn load_shader_or_builtin(path: &Path, builtin: &[u8]) -> Result<Vec<u32>, RenderError> {
  match load_shader_code(path) {
    Err(RenderError::ShaderIo { source, .. }) if source.kind() == ErrorKind::NotFound => {
      info!("`{}` not found, using the built-in shader", path.display());
      read_spv(&mut Cursor::new(builtin)).map_err(|source| RenderError::ShaderIo {
        path: path.to_path_buf(),
        source,
      })
    }
    other => other,
  }
}

/// One colour attachment cleared on load and left ready to present.
///
/// # Safety
/// `device` must be a live logical device.
pub unsafe fn create_render_pass(
  device: &ash::Device,
  format: vk::Format,
) -> Result<vk::RenderPass, RenderError> {
  debug!("Creating render pass...");
  let color_attachment = vk::AttachmentDescription {
    format,
    samples: vk::SampleCountFlags::TYPE_1,
    load_op: vk::AttachmentLoadOp::CLEAR,
    store_op: vk::AttachmentStoreOp::STORE,
    stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
    stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
    initial_layout: vk::ImageLayout::UNDEFINED,
    final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
    ..Default::default()
  };
  let color_ref = vk::AttachmentReference {
    attachment: 0,
    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
  };
  let subpass = vk::SubpassDescription {
    pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
    color_attachment_count: 1,
    p_color_attachments: &color_ref,
    ..Default::default()
  };
  // Image must be acquired before the attachment is written.
  let dependency = vk::SubpassDependency {
    src_subpass: vk::SUBPASS_EXTERNAL,
    dst_subpass: 0,
    src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    src_access_mask: vk::AccessFlags::empty(),
    dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    ..Default::default()
  };

  let rp_info = vk::RenderPassCreateInfo {
    s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
    attachment_count: 1,
    p_attachments: &color_attachment,
    subpass_count: 1,
    p_subpasses: &subpass,
    dependency_count: 1,
    p_dependencies: &dependency,
    ..Default::default()
  };
  unsafe { device.create_render_pass(&rp_info, None) }.map_err(RenderError::RenderPass)
}

/// Empty layout: no descriptor sets, no push constants.
///
/// # Safety
/// `device` must be a live logical device.
pub unsafe fn create_pipeline_layout(
  device: &ash::Device,
) -> Result<vk::PipelineLayout, RenderError> {
  let layout_info = vk::PipelineLayoutCreateInfo {
    s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
    ..Default::default()
  };
  unsafe { device.create_pipeline_layout(&layout_info, None) }
    .map_err(RenderError::PipelineLayout)
}

unsafe fn create_shader_module(
  device: &ash::Device,
  code: &[u32],
  stage: &'static str,
) -> Result<vk::ShaderModule, RenderError> {
  let ci = vk::ShaderModuleCreateInfo {
    s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
    p_code: code.as_ptr(),
    code_size: code.len() * 4,
    ..Default::default()
  };
  unsafe { device.create_shader_module(&ci, None) }
    .map_err(|result| RenderError::ShaderModule { stage, result })
}

/// Triangle pipeline: no vertex input, dynamic viewport and scissor,
/// back-face culling with clockwise front faces, straight alpha blending.
/// Both shader modules are gone by the time this returns.
///
/// # Safety
/// `layout` and `render_pass` must belong to `device`.
pub unsafe fn create_graphics_pipeline(
  device: &ash::Device,
  layout: vk::PipelineLayout,
  render_pass: vk::RenderPass,
  vert_code: &[u32],
  frag_code: &[u32],
) -> Result<vk::Pipeline, RenderError> {
  debug!("Creating graphics pipeline...");
  let vs = unsafe { create_shader_module(device, vert_code, "vertex") }?;
  let fs = match unsafe { create_shader_module(device, frag_code, "fragment") } {
    Ok(fs) => fs,
    Err(e) => {
      unsafe { device.destroy_shader_module(vs, None) };
      return Err(e);
    }
  };
  let entry = c"main";

  let stages = [
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::VERTEX,
      module: vs,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::FRAGMENT,
      module: fs,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
  ];

  // Positions and colours live in the vertex shader.
  let vertex_input = vk::PipelineVertexInputStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
    ..Default::default()
  };
  let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
    primitive_restart_enable: vk::FALSE,
    ..Default::default()
  };
  let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
  let dynamic_state = vk::PipelineDynamicStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
    dynamic_state_count: dyn_states.len() as u32,
    p_dynamic_states: dyn_states.as_ptr(),
    ..Default::default()
  };
  let viewport_state = vk::PipelineViewportStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
    viewport_count: 1,
    scissor_count: 1,
    ..Default::default()
  };
  let raster = vk::PipelineRasterizationStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
    depth_clamp_enable: vk::FALSE,
    rasterizer_discard_enable: vk::FALSE,
    polygon_mode: vk::PolygonMode::FILL,
    cull_mode: vk::CullModeFlags::BACK,
    front_face: vk::FrontFace::CLOCKWISE,
    depth_bias_enable: vk::FALSE,
    line_width: 1.0,
    ..Default::default()
  };
  let multisample = vk::PipelineMultisampleStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
    rasterization_samples: vk::SampleCountFlags::TYPE_1,
    sample_shading_enable: vk::FALSE,
    min_sample_shading: 1.0,
    ..Default::default()
  };
  let color_blend_att = vk::PipelineColorBlendAttachmentState {
    blend_enable: vk::TRUE,
    src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
    dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    color_blend_op: vk::BlendOp::ADD,
    src_alpha_blend_factor: vk::BlendFactor::ONE,
    dst_alpha_blend_factor: vk::BlendFactor::ZERO,
    alpha_blend_op: vk::BlendOp::ADD,
    color_write_mask: vk::ColorComponentFlags::RGBA,
  };
  let color_blend = vk::PipelineColorBlendStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
    logic_op_enable: vk::FALSE,
    logic_op: vk::LogicOp::COPY,
    attachment_count: 1,
    p_attachments: &color_blend_att,
    ..Default::default()
  };

  let pipeline_info = vk::GraphicsPipelineCreateInfo {
    s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
    stage_count: stages.len() as u32,
    p_stages: stages.as_ptr(),
    p_vertex_input_state: &vertex_input,
    p_input_assembly_state: &input_assembly,
    p_viewport_state: &viewport_state,
    p_rasterization_state: &raster,
    p_multisample_state: &multisample,
    p_color_blend_state: &color_blend,
    p_dynamic_state: &dynamic_state,
    layout,
    render_pass,
    subpass: 0,
    ..Default::default()
  };

  let created = unsafe {
    device.create_graphics_pipelines(
      vk::PipelineCache::null(),
      std::slice::from_ref(&pipeline_info),
      None,
    )
  };
  unsafe {
    device.destroy_shader_module(vs, None);
    device.destroy_shader_module(fs, None);
  }

  let pipeline = match created {
    Ok(p) => p[0],
    Err((_, err)) => return Err(RenderError::Pipeline(err)),
  };
  info!("Graphics pipeline created");
  Ok(pipeline)
}
