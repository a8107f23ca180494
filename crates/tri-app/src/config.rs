// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;
use tri_core::LogLevel;
use tri_platform::WindowDesc;
use tri_render_vk::{
    present_mode_from_name, vk, RenderSettings, DEFAULT_CLEAR_COLOR, FRAGMENT_SHADER_PATH,
    VERTEX_SHADER_PATH,
};

pub const DEFAULT_CONFIG_PATH: &str = "triangle.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub log_level: LogLevel,
    pub window: WindowCfg,
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let d = WindowDesc::default();
        WindowCfg {
            title: d.title,
            x: d.x,
            y: d.y,
            width: d.width,
            height: d.height,
        }
    }
}

impl From<&WindowCfg> for WindowDesc {
    fn from(c: &WindowCfg) -> Self {
        WindowDesc {
            title: c.title.clone(),
            x: c.x,
            y: c.y,
            width: c.width,
            height: c.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub validation: bool,
    pub allow_integrated: bool,
    pub clear_color: [f32; 4],
    /// mailbox | fifo | fifo_relaxed | immediate
    pub present_mode: String,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            validation: true,
            allow_integrated: false,
            clear_color: DEFAULT_CLEAR_COLOR,
            present_mode: "mailbox".into(),
            vertex_shader: VERTEX_SHADER_PATH.into(),
            fragment_shader: FRAGMENT_SHADER_PATH.into(),
        }
    }
}

impl RenderCfg {
    pub fn to_settings(&self, app_name: &str) -> RenderSettings {
        let present_mode = present_mode_from_name(&self.present_mode).unwrap_or_else(|| {
            warn!("unknown present_mode `{}`, using mailbox", self.present_mode);
            vk::PresentModeKHR::MAILBOX
        });
        RenderSettings {
            app_name: app_name.to_owned(),
            validation: self.validation,
            allow_integrated: self.allow_integrated,
            clear_color: self.clear_color,
            present_mode,
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
        }
    }
}

/// A missing file is not an error: everything has a default.
pub fn load_cfg(path: &Path) -> Result<AppCfg, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AppCfg::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
