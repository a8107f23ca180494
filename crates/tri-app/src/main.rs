// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tri_core::{events::EventBus, fatal, init_tracing, LogLevel};
use tri_platform::{SurfaceProvider, WindowDesc, WinitSurfaceProvider};
use tri_render::RenderSize;
use tri_render_vk::{export_shaders, RenderContext, RenderSettings};

mod app;
mod config;

use app::{quit_flag, run_loop};
use config::{load_cfg, AppCfg, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; a missing file means built-in defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Window width, overrides the config
    #[arg(long)]
    width: Option<u32>,
    /// Window height, overrides the config
    #[arg(long)]
    height: Option<u32>,
    /// fatal | error | warn | info | debug | trace (RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<LogLevel>,
    /// Write the built-in SPIR-V shaders into DIR and exit
    #[arg(long, value_name = "DIR")]
    export_shaders: Option<PathBuf>,
}

impl Args {
    fn window_desc(&self, cfg: &AppCfg) -> WindowDesc {
        let mut desc = WindowDesc::from(&cfg.window);
        if let Some(w) = self.width {
            desc.width = w;
        }
        if let Some(h) = self.height {
            desc.height = h;
        }
        desc
    }
}

/// Builds the renderer against the open window. Failure is logged as fatal
/// and leaves the caller without a renderer; it never aborts the process.
fn start_renderer<P: SurfaceProvider>(
    platform: &P,
    settings: &RenderSettings,
) -> Option<RenderContext> {
    let Some(target) = platform.surface() else {
        fatal!("no window to render into");
        return None;
    };
    let (width, height) = platform.framebuffer_size();
    match RenderContext::new(
        target.window,
        target.display,
        RenderSize::new(width, height),
        settings,
    ) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            fatal!("renderer initialisation failed: {e}");
            None
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (cfg, cfg_err) = match load_cfg(&args.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppCfg::default(), Some(e)),
    };
    init_tracing(args.log_level.unwrap_or(cfg.log_level));
    if let Some(e) = cfg_err {
        warn!("{e}; using defaults");
    }

    if let Some(dir) = &args.export_shaders {
        for path in export_shaders(dir).context("export_shaders")? {
            info!("exported {}", path.display());
        }
        return Ok(());
    }

    let desc = args.window_desc(&cfg);
    let settings = cfg.render.to_settings(&desc.title);

    let mut events = EventBus::new();
    let running = quit_flag(&mut events);

    let mut platform = WinitSurfaceProvider::new().context("event loop")?;
    platform.create_window(&desc).context("create_window")?;
    platform.show_window();

    let mut renderer = start_renderer(&platform, &settings);
    match renderer.as_mut() {
        Some(r) => {
            run_loop(&mut platform, r, &mut events, &running);
        }
        None => running.set(false),
    }

    // Renderer first: its surface still points at the window.
    if let Some(r) = renderer.as_mut() {
        r.shutdown();
    }
    drop(renderer);
    platform.destroy_window();
    info!("shutdown complete");
    Ok(())
}
