//! Camera sensors: configuration, override merging and captured frames.

pub mod transform;

use indexmap::IndexMap;
use ndarray::{Array, Array4};
use serde::{Deserialize, Serialize};
use simbatch_core::{ObsDict, ObsValue, Result, SimError};

use crate::math::{gl_to_cv, look_at_gl, rigid_inverse, Mat4, Vec3};

pub use transform::{to_pointcloud, to_rgbd};

/// Raw buffer names produced by every camera capture.
pub const COLOR: &str = "Color";
pub const POSITION: &str = "Position";
pub const SEGMENTATION: &str = "Segmentation";

// ============================================================================
// Configuration
// ============================================================================

/// Pinhole camera placed in each instance's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub uid: String,
    pub width: usize,
    pub height: usize,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
}

impl CameraConfig {
    pub fn new(uid: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            uid: uid.into(),
            width,
            height,
            fov: std::f32::consts::FRAC_PI_2,
            near: 0.01,
            far: 100.0,
            eye: [0.3, 0.0, 0.6],
            target: [-0.1, 0.0, 0.1],
        }
    }

    pub fn with_look_at(mut self, eye: Vec3, target: Vec3) -> Self {
        self.eye = eye;
        self.target = target;
        self
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_clipping(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SimError::config(
                format!("camera '{}'", self.uid),
                "resolution must be non-zero",
            ));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(SimError::config(
                format!("camera '{}'", self.uid),
                "clipping planes must satisfy 0 < near < far",
            ));
        }
        Ok(())
    }
}

/// Partial camera override. Unset fields keep their declared value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPatch {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub eye: Option<Vec3>,
    pub target: Option<Vec3>,
}

impl CameraPatch {
    fn apply(&self, cfg: &mut CameraConfig) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        merge!(width, height, fov, near, far, eye, target);
    }
}

/// User overrides: `global` applies to every camera, then per-uid patches
/// on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOverrides {
    pub global: CameraPatch,
    pub per_camera: IndexMap<String, CameraPatch>,
}

impl CameraOverrides {
    pub fn with_global(mut self, patch: CameraPatch) -> Self {
        self.global = patch;
        self
    }

    pub fn with_camera(mut self, uid: impl Into<String>, patch: CameraPatch) -> Self {
        self.per_camera.insert(uid.into(), patch);
        self
    }
}

/// Merge declared camera configurations in order (a later uid replaces an
/// earlier one), then apply user overrides.
pub fn resolve_configs(
    declared: impl IntoIterator<Item = CameraConfig>,
    overrides: &CameraOverrides,
) -> Result<IndexMap<String, CameraConfig>> {
    let mut resolved: IndexMap<String, CameraConfig> = IndexMap::new();
    for cfg in declared {
        resolved.insert(cfg.uid.clone(), cfg);
    }
    if let Some(unknown) = overrides.per_camera.keys().find(|k| !resolved.contains_key(*k)) {
        return Err(SimError::config(
            "camera overrides",
            format!("no camera named '{}'", unknown),
        ));
    }
    for cfg in resolved.values_mut() {
        overrides.global.apply(cfg);
        if let Some(patch) = overrides.per_camera.get(&cfg.uid) {
            patch.apply(cfg);
        }
        cfg.validate()?;
    }
    Ok(resolved)
}

// ============================================================================
// Cameras
// ============================================================================

/// A camera bound to its resolved configuration.
#[derive(Debug, Clone)]
pub struct Camera {
    config: CameraConfig,
    cam2world_gl: Mat4,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        let cam2world_gl = look_at_gl(config.eye, config.target, [0.0, 0.0, 1.0]);
        Self {
            config,
            cam2world_gl,
        }
    }

    pub fn uid(&self) -> &str {
        &self.config.uid
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn cam2world_gl(&self) -> &Mat4 {
        &self.cam2world_gl
    }

    /// Focal length in pixels (square pixels).
    pub fn focal(&self) -> f32 {
        0.5 * self.config.height as f32 / (0.5 * self.config.fov).tan()
    }

    /// Principal point in pixels.
    pub fn principal_point(&self) -> (f32, f32) {
        (0.5 * self.config.width as f32, 0.5 * self.config.height as f32)
    }

    pub fn intrinsic_cv(&self) -> [[f32; 3]; 3] {
        let f = self.focal();
        let (cx, cy) = self.principal_point();
        [[f, 0.0, cx], [0.0, f, cy], [0.0, 0.0, 1.0]]
    }

    /// World-to-camera transform in OpenCV convention, top 3 rows.
    pub fn extrinsic_cv(&self) -> [[f32; 4]; 3] {
        let world2cam = rigid_inverse(&gl_to_cv(&self.cam2world_gl));
        [world2cam[0], world2cam[1], world2cam[2]]
    }

    /// Camera parameters repeated for `n` instances.
    pub fn params(&self, n: usize) -> ObsDict {
        fn repeat<const R: usize, const C: usize>(m: &[[f32; C]; R], n: usize) -> ObsValue {
            ObsValue::F32(Array::from_shape_fn((n, R, C), |(_, i, j)| m[i][j]).into_dyn())
        }
        let mut params = ObsDict::new();
        params.insert("extrinsic_cv".into(), repeat(&self.extrinsic_cv(), n));
        params.insert("cam2world_gl".into(), repeat(&self.cam2world_gl, n));
        params.insert("intrinsic_cv".into(), repeat(&self.intrinsic_cv(), n));
        params
    }
}

/// Raw buffers captured from one camera across all instances.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// RGBA, `(N, H, W, 4)`.
    pub color: Array4<u8>,
    /// Camera-frame hit point (OpenGL axes), zero where nothing was hit,
    /// `(N, H, W, 3)`.
    pub position: Array4<f32>,
    /// Object id per pixel, 0 for background, `(N, H, W, 1)`.
    pub segmentation: Array4<i32>,
}

impl CameraFrame {
    pub fn blank(n: usize, height: usize, width: usize) -> Self {
        Self {
            color: Array4::zeros((n, height, width, 4)),
            position: Array4::zeros((n, height, width, 3)),
            segmentation: Array4::zeros((n, height, width, 1)),
        }
    }

    pub fn into_obs(self) -> ObsDict {
        let mut d = ObsDict::new();
        d.insert(COLOR.into(), ObsValue::U8(self.color.into_dyn()));
        d.insert(POSITION.into(), ObsValue::F32(self.position.into_dyn()));
        d.insert(SEGMENTATION.into(), ObsValue::I32(self.segmentation.into_dyn()));
        d
    }
}
