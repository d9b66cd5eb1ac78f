use super::*;
use crate::scene::model::Scene;

fn looking_down_z(width: u32, height: u32, scene: Scene) -> RenderRequest {
    RenderRequest {
        camera: Vec3::new(0.0, 0.0, 5.0),
        rotation: Vec3::ZERO,
        fov: 60.0,
        width,
        height,
        scene,
        time: 0.0,
    }
}

fn red_sphere_at(center: Vec3) -> Object {
    Object {
        name: "s".to_string(),
        material: Material {
            colour: Rgb(1.0, 0.0, 0.0),
            specular: 0.0,
            metallic: 0.0,
        },
        geometry: Geometry::Sphere {
            center,
            radius: 1.0,
        },
    }
}

#[test]
fn empty_scene_is_background_everywhere() {
    let req = looking_down_z(7, 5, Scene::empty(Rgb(0.5, 0.8, 1.0)));
    let tracer = RayTracer::new(&req);
    for y in 0..5 {
        for x in 0..7 {
            assert_eq!(tracer.pixel(x, y), Rgb(0.5, 0.8, 1.0));
        }
    }
}

#[test]
fn center_pixel_hits_sphere_and_corner_misses() {
    let mut scene = Scene::empty(Rgb(0.0, 0.0, 1.0));
    scene.ambient_light = Rgb::splat(1.0);
    scene.objects.push(red_sphere_at(Vec3::ZERO));
    let req = looking_down_z(9, 9, scene);
    let tracer = RayTracer::new(&req);

    assert_eq!(tracer.pixel(4, 4).to_rgba8(), [255, 0, 0, 255]);
    assert_eq!(tracer.pixel(0, 0).to_rgba8(), [0, 0, 255, 255]);
    assert_eq!(
        tracer.pixel_word(4, 4),
        u32::from_le_bytes([255, 0, 0, 255])
    );
}

#[test]
fn camera_basis_is_orthonormal_for_demo_pose() {
    let req = RenderRequest::demo(16, 9);
    let basis = CameraBasis::new(&req);
    for v in [basis.forward, basis.right, basis.up] {
        assert!((v.length() - 1.0).abs() < 1e-9);
    }
    assert!(basis.forward.dot(basis.right).abs() < 1e-9);
    assert!(basis.forward.dot(basis.up).abs() < 1e-9);
    assert!(basis.up.y > 0.0, "up should point up, got {:?}", basis.up);

    // The demo camera at (5, 5, 5) looks back toward the origin.
    let view = -basis.forward;
    let to_origin = (Vec3::ZERO - req.camera).normalize();
    assert!(view.dot(to_origin) > 0.95);
}

#[test]
fn occluded_points_only_receive_ambient_light() {
    let mut scene = Scene::empty(Rgb::BLACK);
    scene.ambient_light = Rgb::splat(0.1);
    scene.objects.push(red_sphere_at(Vec3::new(0.0, 1.0, 0.0)));
    scene.lights.push(Light::Point {
        intensity: Rgb::splat(0.5),
        position: Vec3::new(0.0, 5.0, 0.0),
    });
    let req = looking_down_z(4, 4, scene);
    let tracer = RayTracer::new(&req);
    let matte = Material {
        colour: Rgb::splat(1.0),
        specular: 0.0,
        metallic: 0.0,
    };
    let up = Vec3::new(0.0, 1.0, 0.0);

    let shadowed = tracer.light_at(Vec3::new(0.0, -1.0, 0.0), up, &matte);
    assert_eq!(shadowed, Rgb::splat(0.1));

    let lit = tracer.light_at(Vec3::new(4.0, -1.0, 0.0), up, &matte);
    assert!(lit.0 > 0.1);
}

#[test]
fn point_light_between_surface_and_occluder_is_not_blocked() {
    let mut scene = Scene::empty(Rgb::BLACK);
    scene.objects.push(red_sphere_at(Vec3::new(0.0, 10.0, 0.0)));
    scene.lights.push(Light::Point {
        intensity: Rgb::splat(0.5),
        position: Vec3::new(0.0, 2.0, 0.0),
    });
    let req = looking_down_z(4, 4, scene);
    let tracer = RayTracer::new(&req);
    let matte = Material {
        colour: Rgb::splat(1.0),
        specular: 0.0,
        metallic: 0.0,
    };

    let lit = tracer.light_at(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), &matte);
    assert!((lit.0 - 0.5).abs() < 1e-9);
}

#[test]
fn reflection_limit_zero_disables_mirror() {
    let mut scene = Scene::empty(Rgb(0.0, 1.0, 0.0));
    scene.ambient_light = Rgb::splat(1.0);
    let mut mirror = red_sphere_at(Vec3::ZERO);
    mirror.material.metallic = 1.0;
    scene.objects.push(mirror);

    let req = looking_down_z(9, 9, scene.clone());
    assert_eq!(RayTracer::new(&req).pixel(4, 4), Rgb(1.0, 0.0, 0.0));

    // Head-on, the mirror bounces straight back to the (empty) sky behind the camera.
    scene.reflection_limit = 1;
    let req = looking_down_z(9, 9, scene);
    assert_eq!(RayTracer::new(&req).pixel(4, 4), Rgb(0.0, 1.0, 0.0));
}

#[test]
fn spin_rotates_object_centers_by_time() {
    let mut scene = Scene::empty(Rgb::BLACK);
    scene.do_objects_spin = true;
    scene.objects.push(red_sphere_at(Vec3::new(2.0, 0.0, 0.0)));
    let mut req = looking_down_z(4, 4, scene);
    req.time = std::f64::consts::PI;

    let tracer = RayTracer::new(&req);
    let c = tracer.objects[0].geometry.center();
    assert!((c - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-9);
    // The request itself is never mutated.
    assert_eq!(req.scene.objects[0].geometry.center(), Vec3::new(2.0, 0.0, 0.0));
}

#[test]
fn bounded_plane_misses_outside_its_extent() {
    let plane = Geometry::Plane {
        center: Vec3::ZERO,
        normal: Vec3::new(0.0, 1.0, 0.0),
        size: 1.0,
    };
    let down = Vec3::new(0.0, -1.0, 0.0);
    let inside = Ray {
        origin: Vec3::new(0.5, 3.0, 0.5),
        direction: down,
    };
    let outside = Ray {
        origin: Vec3::new(1.5, 3.0, 0.0),
        direction: down,
    };
    assert_eq!(intersect(&plane, &inside), Some(3.0));
    assert_eq!(intersect(&plane, &outside), None);
}
