use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb;
use crate::foundation::error::{RayportError, RayportResult};
use crate::foundation::math::Vec3;

/// Largest accepted [`Scene::reflection_limit`]. Each bounce is one level of recursion on a
/// render lane's stack.
pub const MAX_REFLECTION_LIMIT: u32 = 64;

/// Surface response of an [`Object`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Diffuse colour.
    pub colour: Rgb,
    /// Phong exponent. Larger values give tighter highlights.
    pub specular: f64,
    /// Fraction of the final colour taken from the mirror reflection, in `[0, 1]`.
    #[serde(default)]
    pub metallic: f64,
}

/// Shape of an [`Object`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// Sphere around `center`.
    Sphere {
        /// Center point.
        center: Vec3,
        /// Radius, must be > 0.
        radius: f64,
    },
    /// Square patch of a plane, `size` is the half extent along each in-plane axis.
    Plane {
        /// Center of the patch.
        center: Vec3,
        /// Surface normal (normalized on use).
        normal: Vec3,
        /// Half extent, must be > 0.
        size: f64,
    },
}

impl Geometry {
    /// Reference point of the shape (the one spin animation rotates).
    pub fn center(&self) -> Vec3 {
        match self {
            Self::Sphere { center, .. } | Self::Plane { center, .. } => *center,
        }
    }

    /// Mutable access to the reference point.
    pub fn center_mut(&mut self) -> &mut Vec3 {
        match self {
            Self::Sphere { center, .. } | Self::Plane { center, .. } => center,
        }
    }
}

/// One renderable object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Display name, not required to be unique.
    #[serde(default)]
    pub name: String,
    /// Surface material.
    pub material: Material,
    /// Shape.
    pub geometry: Geometry,
}

/// A light source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Light {
    /// Light arriving from infinitely far away along `direction`.
    Direction {
        /// Per-channel intensity.
        intensity: Rgb,
        /// Direction the light travels in.
        direction: Vec3,
    },
    /// Omnidirectional light at `position`.
    Point {
        /// Per-channel intensity.
        intensity: Rgb,
        /// World-space position.
        position: Vec3,
    },
}

impl Light {
    /// Per-channel intensity.
    pub fn intensity(&self) -> Rgb {
        match self {
            Self::Direction { intensity, .. } | Self::Point { intensity, .. } => *intensity,
        }
    }
}

/// Scene contents handed to the compute module with every request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Objects, tested in order.
    #[serde(default)]
    pub objects: Vec<Object>,
    /// Light sources.
    #[serde(default)]
    pub lights: Vec<Light>,
    /// Colour of rays that hit nothing.
    pub background_colour: Rgb,
    /// Light added to every lit surface regardless of light sources.
    #[serde(default)]
    pub ambient_light: Rgb,
    /// Maximum number of mirror bounces.
    #[serde(default)]
    pub reflection_limit: u32,
    /// Rotate object centers around the Y axis by [`RenderRequest::time`] radians.
    #[serde(default)]
    pub do_objects_spin: bool,
}

/// Everything the compute module needs to render one frame.
///
/// Built by the orchestrator per frame and immutable once submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Camera position.
    pub camera: Vec3,
    /// Camera rotation in radians around X (pitch), Y (yaw) and Z (roll).
    pub rotation: Vec3,
    /// Horizontal field of view in degrees, in `(0, 180)`.
    pub fov: f64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Scene contents.
    pub scene: Scene,
    /// Animation time in seconds.
    #[serde(default)]
    pub time: f64,
}

impl RenderRequest {
    /// Output pixel count.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Parse a request from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RayportResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| RayportError::validation(format!("parse render request JSON: {e}")))
    }

    /// Parse a request from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RayportResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RayportError::validation(format!("open render request JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check the request for values the compute module cannot render.
    pub fn validate(&self) -> RayportResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RayportError::validation(format!(
                "render size must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.fov.is_finite() && self.fov > 0.0 && self.fov < 180.0) {
            return Err(RayportError::validation(format!(
                "fov must be in (0, 180) degrees (got {})",
                self.fov
            )));
        }
        if !self.camera.is_finite() || !self.rotation.is_finite() || !self.time.is_finite() {
            return Err(RayportError::validation(
                "camera, rotation and time must be finite",
            ));
        }
        if self.scene.reflection_limit > MAX_REFLECTION_LIMIT {
            return Err(RayportError::validation(format!(
                "reflection_limit must be <= {MAX_REFLECTION_LIMIT} (got {})",
                self.scene.reflection_limit
            )));
        }
        for (i, obj) in self.scene.objects.iter().enumerate() {
            let ok = match &obj.geometry {
                Geometry::Sphere { center, radius } => center.is_finite() && *radius > 0.0,
                Geometry::Plane {
                    center,
                    normal,
                    size,
                } => center.is_finite() && normal.length() > 0.0 && *size > 0.0,
            };
            if !ok {
                return Err(RayportError::validation(format!(
                    "object {i} ('{}') has degenerate geometry",
                    obj.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
