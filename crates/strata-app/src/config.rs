// SPDX-License-Identifier: CEPL-1.0
//! `strata.toml` loading and command-line overrides.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use strata_render::RenderConfig;
use tracing::info;

use crate::Args;

pub const DEFAULT_CONFIG_PATH: &str = "strata.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "strata".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderConfig,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: AppCfg = toml::from_str(text).context("parse config")?;
        cfg.render.validate().context("invalid [render] section")?;
        Ok(cfg)
    }

    /// A missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).with_context(|| format!("{}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn apply_args(&mut self, args: &Args) {
        if args.fullscreen {
            self.render.fullscreen = true;
        }
        if args.validation {
            self.render.validation = true;
        }
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let cfg = AppCfg::parse(
            r#"
            [window]
            width = 1920

            [render]
            validation = true
            buffering_depth = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.width, 1920);
        assert_eq!(cfg.window.height, 720);
        assert!(cfg.render.validation);
        assert_eq!(cfg.render.buffering_depth, 2);
        assert_eq!(cfg.render.fixed_timestep_hz, 60);
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(AppCfg::parse("[render]\nbuffering_depth = 0\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = AppCfg::load(Path::new("definitely/not/here/strata.toml")).unwrap();
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn test_args_override_file() {
        let args = Args::parse_from([
            "strata",
            "--fullscreen",
            "--validation",
            "--width",
            "640",
            "--height",
            "480",
        ]);
        let mut cfg = AppCfg::default();
        cfg.apply_args(&args);
        assert!(cfg.render.fullscreen);
        assert!(cfg.render.validation);
        assert_eq!((cfg.window.width, cfg.window.height), (640, 480));
    }
}
