use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::pipeline::interface::MAX_SUPPORTED_LIGHTS;
use crate::pipeline::{PipelineConfig, ShadowProjection};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_max_lights")]
    pub max_lights: u32,
    #[serde(default = "RenderSettings::default_shadow_half_extent")]
    pub shadow_half_extent: f32,
    #[serde(default = "RenderSettings::default_shadow_near")]
    pub shadow_near: f32,
    #[serde(default = "RenderSettings::default_shadow_far")]
    pub shadow_far: f32,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            max_lights: Self::default_max_lights(),
            shadow_half_extent: Self::default_shadow_half_extent(),
            shadow_near: Self::default_shadow_near(),
            shadow_far: Self::default_shadow_far(),
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.max_lights == 0 {
            warn!("At least one light is required. Using default light limit.");
            self.max_lights = Self::default_max_lights();
        } else if self.max_lights > MAX_SUPPORTED_LIGHTS {
            warn!(
                "Light limit {} exceeds the shader arrays. Clamping to {}.",
                self.max_lights, MAX_SUPPORTED_LIGHTS
            );
            self.max_lights = MAX_SUPPORTED_LIGHTS;
        }

        if !(self.shadow_half_extent > 0.0) {
            warn!("Shadow half extent must be positive. Using default value.");
            self.shadow_half_extent = Self::default_shadow_half_extent();
        }

        if !(self.shadow_near >= 0.0 && self.shadow_far > self.shadow_near) {
            warn!("Shadow depth range must satisfy 0 <= near < far. Using default range.");
            self.shadow_near = Self::default_shadow_near();
            self.shadow_far = Self::default_shadow_far();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            shadow_width: self.shadow_map_size,
            shadow_height: self.shadow_map_size,
            max_lights: self.max_lights,
            shadow_projection: ShadowProjection {
                half_extent: self.shadow_half_extent,
                near: self.shadow_near,
                far: self.shadow_far,
            },
        }
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_max_lights() -> u32 {
        MAX_SUPPORTED_LIGHTS
    }

    const fn default_shadow_half_extent() -> f32 {
        15.0
    }

    const fn default_shadow_near() -> f32 {
        0.1
    }

    const fn default_shadow_far() -> f32 {
        30.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

impl Default for PresentModeSetting {
    fn default() -> Self {
        PresentModeSetting::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            shadow_map_size: 0,
            max_lights: 0,
            shadow_half_extent: -1.0,
            shadow_near: 5.0,
            shadow_far: 1.0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            present_mode: PresentModeSetting::Immediate,
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.max_lights, defaults.max_lights);
        assert_eq!(validated.shadow_half_extent, defaults.shadow_half_extent);
        assert_eq!(validated.shadow_near, defaults.shadow_near);
        assert_eq!(validated.shadow_far, defaults.shadow_far);
        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            shadow_map_size: 1024,
            max_lights: 4,
            shadow_half_extent: 8.0,
            shadow_near: 0.5,
            shadow_far: 20.0,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            present_mode: PresentModeSetting::Mailbox,
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.shadow_map_size, valid.shadow_map_size);
        assert_eq!(validated.max_lights, valid.max_lights);
        assert_eq!(validated.shadow_half_extent, valid.shadow_half_extent);
        assert_eq!(validated.resolution.width, valid.resolution.width);
        assert_eq!(validated.resolution.height, valid.resolution.height);
    }

    #[test]
    fn light_limit_is_clamped_to_the_shader_arrays() {
        let settings = RenderSettings {
            max_lights: 64,
            ..RenderSettings::default()
        }
        .validate();
        assert_eq!(settings.max_lights, MAX_SUPPORTED_LIGHTS);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "max_lights": 3, "present_mode": "mailbox" }"#).unwrap();
        assert_eq!(settings.max_lights, 3);
        assert_eq!(settings.shadow_map_size, 2048);
        assert!(matches!(settings.present_mode, PresentModeSetting::Mailbox));
    }

    #[test]
    fn pipeline_config_uses_square_shadow_maps() {
        let settings = RenderSettings {
            shadow_map_size: 512,
            max_lights: 2,
            ..RenderSettings::default()
        };
        let config = settings.pipeline_config();
        assert_eq!((config.shadow_width, config.shadow_height), (512, 512));
        assert_eq!(config.max_lights, 2);
        assert_eq!(config.shadow_projection, ShadowProjection::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.max_lights, RenderSettings::default().max_lights);
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Immediate
        );
    }
}
