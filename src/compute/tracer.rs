use std::borrow::Cow;

use crate::foundation::core::Rgb;
use crate::foundation::math::{Vec3, solve_quadratic};
use crate::scene::model::{Geometry, Light, Material, Object, RenderRequest};

/// Hits closer than this are treated as self-intersections of the surface a ray leaves from.
const HIT_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Ray {
    pub(crate) origin: Vec3,
    pub(crate) direction: Vec3,
}

struct Hit<'o> {
    distance: f64,
    point: Vec3,
    object: &'o Object,
}

/// Camera frame and image plane, derived once per request.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CameraBasis {
    pub(crate) origin: Vec3,
    pub(crate) forward: Vec3,
    pub(crate) right: Vec3,
    pub(crate) up: Vec3,
    top_left: Vec3,
    plane_width: f64,
    plane_height: f64,
}

impl CameraBasis {
    pub(crate) fn new(req: &RenderRequest) -> Self {
        let rot = req.rotation;
        let forward = Vec3::new(0.0, 0.0, 1.0)
            .rotate_x(-rot.x)
            .rotate_y(-rot.y);
        let right = Vec3::new(0.0, 1.0, 0.0)
            .rotate_z(-rot.z)
            .cross(forward)
            .normalize();
        let up = forward.cross(right).normalize();

        let plane_width = 2.0 * (req.fov.to_radians() / 2.0).tan();
        let plane_height = plane_width * (f64::from(req.height) / f64::from(req.width));

        // The camera looks along -forward; the image plane sits one unit in front of it.
        let center = req.camera - forward;
        let top_left = center - right * (plane_width / 2.0) + up * (plane_height / 2.0);

        Self {
            origin: req.camera,
            forward,
            right,
            up,
            top_left,
            plane_width,
            plane_height,
        }
    }

    fn primary_ray(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let xs = (f64::from(x) + 0.5) / f64::from(width);
        let ys = (f64::from(y) + 0.5) / f64::from(height);
        let p = self.top_left + self.right * (xs * self.plane_width)
            - self.up * (ys * self.plane_height);
        Ray {
            origin: self.origin,
            direction: (p - self.origin).normalize(),
        }
    }
}

/// Whitted-style tracer over one [`RenderRequest`]: hard shadows, Phong highlights and metallic
/// mirror reflection up to the scene's reflection limit.
///
/// Shared by reference across the module's lanes; it holds no mutable state.
pub(crate) struct RayTracer<'a> {
    req: &'a RenderRequest,
    objects: Cow<'a, [Object]>,
    camera: CameraBasis,
}

impl<'a> RayTracer<'a> {
    pub(crate) fn new(req: &'a RenderRequest) -> Self {
        let objects = if req.scene.do_objects_spin && req.time != 0.0 {
            Cow::Owned(
                req.scene
                    .objects
                    .iter()
                    .cloned()
                    .map(|mut obj| {
                        let c = obj.geometry.center_mut();
                        *c = c.rotate_y(req.time);
                        obj
                    })
                    .collect(),
            )
        } else {
            Cow::Borrowed(req.scene.objects.as_slice())
        };

        Self {
            req,
            objects,
            camera: CameraBasis::new(req),
        }
    }

    /// Colour of pixel `(x, y)`, origin top-left.
    pub(crate) fn pixel(&self, x: u32, y: u32) -> Rgb {
        let ray = self
            .camera
            .primary_ray(x, y, self.req.width, self.req.height);
        self.trace(&ray, 0)
    }

    /// Pixel `(x, y)` packed as RGBA8 in a little-endian word.
    pub(crate) fn pixel_word(&self, x: u32, y: u32) -> u32 {
        u32::from_le_bytes(self.pixel(x, y).to_rgba8())
    }

    fn trace(&self, ray: &Ray, depth: u32) -> Rgb {
        let Some(hit) = self.closest_hit(ray) else {
            return self.req.scene.background_colour;
        };

        let normal = surface_normal(&hit.object.geometry, hit.point, ray.direction);
        let material = &hit.object.material;
        let local = self.light_at(hit.point, normal, material) * material.colour;

        if material.metallic <= 0.0 || depth >= self.req.scene.reflection_limit {
            return local;
        }

        let bounce = Ray {
            origin: hit.point,
            direction: (-ray.direction).reflect(normal),
        };
        let reflected = self.trace(&bounce, depth + 1);
        local.lerp(reflected, material.metallic.min(1.0))
    }

    fn closest_hit(&self, ray: &Ray) -> Option<Hit<'_>> {
        let mut best: Option<Hit<'_>> = None;
        for object in self.objects.iter() {
            let Some(distance) = intersect(&object.geometry, ray) else {
                continue;
            };
            if best.as_ref().is_some_and(|b| b.distance <= distance) {
                continue;
            }
            best = Some(Hit {
                distance,
                point: ray.origin + ray.direction * distance,
                object,
            });
        }
        best
    }

    fn light_at(&self, point: Vec3, normal: Vec3, material: &Material) -> Rgb {
        let mut total = self.req.scene.ambient_light;

        for light in &self.req.scene.lights {
            let (to_light, max_distance) = match light {
                Light::Direction { direction, .. } => (-*direction, f64::INFINITY),
                Light::Point { position, .. } => {
                    let v = *position - point;
                    (v, v.length())
                }
            };
            let dir = to_light.normalize();

            let shadow = Ray {
                origin: point,
                direction: dir,
            };
            if self
                .closest_hit(&shadow)
                .is_some_and(|h| h.distance < max_distance)
            {
                continue;
            }

            let diffuse = normal.dot(dir).clamp(0.0, 1.0);

            let specular = if material.specular > 0.0 {
                let reflected = dir.reflect(normal);
                let to_camera = (self.camera.origin - point).normalize();
                reflected
                    .dot(to_camera)
                    .clamp(0.0, 1.0)
                    .powf(material.specular)
            } else {
                0.0
            };

            total = total + light.intensity() * (diffuse + specular);
        }

        total
    }
}

fn intersect(geometry: &Geometry, ray: &Ray) -> Option<f64> {
    match geometry {
        Geometry::Sphere { center, radius } => {
            let oc = ray.origin - *center;
            let a = ray.direction.dot(ray.direction);
            let b = 2.0 * ray.direction.dot(oc);
            let c = oc.dot(oc) - radius * radius;
            let (t0, t1) = solve_quadratic(a, b, c)?;
            if t0 > HIT_EPSILON {
                Some(t0)
            } else if t1 > HIT_EPSILON {
                Some(t1)
            } else {
                None
            }
        }
        Geometry::Plane {
            center,
            normal,
            size,
        } => {
            let n = normal.normalize();
            let denom = n.dot(ray.direction);
            if denom.abs() < 1e-12 {
                return None;
            }
            let t = (*center - ray.origin).dot(n) / denom;
            if t <= HIT_EPSILON {
                return None;
            }
            // Bounded by the axis-aligned box of half extent `size` around the center.
            let offset = ray.origin + ray.direction * t - *center;
            let extent = offset.x.abs().max(offset.y.abs()).max(offset.z.abs());
            (extent <= *size).then_some(t)
        }
    }
}

/// Outward normal for spheres; for planes, the side facing the incoming ray.
fn surface_normal(geometry: &Geometry, point: Vec3, incoming: Vec3) -> Vec3 {
    match geometry {
        Geometry::Sphere { center, .. } => (point - *center).normalize(),
        Geometry::Plane { normal, .. } => {
            let n = normal.normalize();
            if n.dot(incoming) > 0.0 { -n } else { n }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compute/tracer.rs"]
mod tests;
