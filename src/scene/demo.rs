use crate::foundation::core::Rgb;
use crate::foundation::math::Vec3;
use crate::scene::model::{Geometry, Light, Material, Object, RenderRequest, Scene};

impl RenderRequest {
    /// Built-in demo: three spheres over a reflective floor, lit by a directional and a point
    /// light, seen from `(5, 5, 5)` looking back at the origin.
    pub fn demo(width: u32, height: u32) -> Self {
        Self {
            camera: Vec3::new(5.0, 5.0, 5.0),
            rotation: Vec3::new(0.7, -std::f64::consts::FRAC_PI_4, 0.0),
            fov: 70.0,
            width,
            height,
            scene: Scene::demo(),
            time: 0.0,
        }
    }
}

impl Scene {
    /// Scene used by [`RenderRequest::demo`].
    pub fn demo() -> Self {
        fn sphere(colour: Rgb, specular: f64, metallic: f64, center: Vec3) -> Object {
            Object {
                name: "sphere".to_string(),
                material: Material {
                    colour,
                    specular,
                    metallic,
                },
                geometry: Geometry::Sphere {
                    center,
                    radius: 1.0,
                },
            }
        }

        Self {
            objects: vec![
                sphere(
                    Rgb(1.0, 0.521, 0.0),
                    5.0,
                    1.0,
                    Vec3::new(1.5, 0.0, 0.0),
                ),
                sphere(
                    Rgb(1.0, 0.349, 0.0),
                    800.0,
                    0.2,
                    Vec3::new(3.1, 0.0, 2.1),
                ),
                sphere(
                    Rgb(0.0, 0.645, 1.0),
                    80.0,
                    0.0,
                    Vec3::new(-8.3, 0.0, 0.0),
                ),
                Object {
                    name: "plane".to_string(),
                    material: Material {
                        colour: Rgb(0.8, 0.8, 1.0),
                        specular: 50.0,
                        metallic: 0.2,
                    },
                    geometry: Geometry::Plane {
                        center: Vec3::new(0.0, -1.5, 0.0),
                        normal: Vec3::new(0.0, 1.0, 0.0),
                        size: 5.0,
                    },
                },
            ],
            lights: vec![
                Light::Direction {
                    intensity: Rgb::splat(0.4),
                    direction: Vec3::new(-1.0, -1.5, -0.5).normalize(),
                },
                Light::Point {
                    intensity: Rgb::splat(0.4),
                    position: Vec3::new(0.0, 2.0, 0.0),
                },
            ],
            background_colour: Rgb(0.5, 0.8, 1.0),
            ambient_light: Rgb::splat(0.2),
            reflection_limit: 4,
            do_objects_spin: false,
        }
    }

    /// A scene with no objects or lights, rendering as a flat `background_colour`.
    pub fn empty(background_colour: Rgb) -> Self {
        Self {
            objects: Vec::new(),
            lights: Vec::new(),
            background_colour,
            ambient_light: Rgb::BLACK,
            reflection_limit: 0,
            do_objects_spin: false,
        }
    }
}
