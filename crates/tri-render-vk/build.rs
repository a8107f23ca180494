// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

fn main() {
  let out = PathBuf::from(env::var("OUT_DIR").unwrap());

  let comp = shaderc::Compiler::new().unwrap();
  let mut opts = shaderc::CompileOptions::new().unwrap();
  // The pipeline targets a 1.3 instance but the shaders use nothing past 1.0.
  opts.set_target_env(
    shaderc::TargetEnv::Vulkan,
    shaderc::EnvVersion::Vulkan1_0 as u32,
  );
  opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

  for (file, kind) in [
    ("triangle.vert", shaderc::ShaderKind::Vertex),
    ("triangle.frag", shaderc::ShaderKind::Fragment),
  ] {
    let src = fs::read_to_string(PathBuf::from("shaders").join(file)).unwrap();
    let spv = comp
      .compile_into_spirv(&src, kind, file, "main", Some(&opts))
      .unwrap();
    fs::write(out.join(format!("{file}.spv")), spv.as_binary_u8()).unwrap();
    println!("cargo:rerun-if-changed=shaders/{file}");
  }

  println!("cargo:rerun-if-changed=build.rs");
}
