//! Forward-lit primitives under directional, point and spot lights.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use renderer::{
    Camera, DirectionalLight, ForwardRenderer, Material, Mesh, PointLight, Renderer, ShaderLibrary, SpotLight,
    Texture,
};

use super::{CameraStart, Scene, SceneKind};

const POINT_LIGHT_COUNT: usize = 4;
const LIGHT_SEED: u64 = 7;

/// Circular path a point light follows around the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Orbit {
    radius: f32,
    height: f32,
    speed: f32,
    phase: f32,
}

impl Orbit {
    fn position(&self, elapsed: f32) -> Vec3 {
        let angle = self.phase + self.speed * elapsed;
        Vec3::new(self.radius * angle.cos(), self.height, self.radius * angle.sin())
    }
}

fn random_orbits(rng: &mut StdRng, count: usize) -> Vec<Orbit> {
    (0..count)
        .map(|_| Orbit {
            radius: rng.gen_range(3.0..9.0),
            height: rng.gen_range(1.0..3.5),
            speed: rng.gen_range(0.3f32..1.2) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 },
            phase: rng.gen_range(0.0..std::f32::consts::TAU),
        })
        .collect()
}

fn load_texture(renderer: &Renderer, path: &Path) -> Result<Texture> {
    let bytes = std::fs::read(path).with_context(|| format!("Could not read texture {:?}", path))?;
    let label = path.file_name().and_then(|n| n.to_str()).unwrap_or("Texture");
    Texture::from_bytes(&renderer.device, &renderer.queue, &bytes, label)
        .with_context(|| format!("Could not decode texture {:?}", path))
}

pub struct LightingScene {
    forward: ForwardRenderer,
    orbits: Vec<Orbit>,
    /// Instance indices that spin in place.
    spinners: Vec<usize>,
}

impl LightingScene {
    pub fn new(renderer: &Renderer, shaders: &ShaderLibrary, texture_path: Option<&Path>) -> Result<Self> {
        let device = &renderer.device;
        let queue = &renderer.queue;
        let mut forward = ForwardRenderer::new(device, queue, renderer.format(), shaders)?;
        forward.set_ambient_light(Vec3::splat(0.04));

        let surface = match texture_path.map(|path| load_texture(renderer, path)) {
            Some(Ok(texture)) => texture,
            Some(Err(e)) => {
                log::warn!("{:#}, using the checkerboard", e);
                Texture::checkerboard(device, queue, 256, 8)
            }
            None => Texture::checkerboard(device, queue, 256, 8),
        };
        let surface = Arc::new(surface);
        let ground_material = forward.create_material(device, Material::DiffuseFlat {
            color: Vec3::new(0.45, 0.47, 0.5),
        });
        let textured = forward.create_material(device, Material::DiffuseTextured { texture: surface });
        let red = forward.create_material(device, Material::DiffuseFlat {
            color: Vec3::new(0.8, 0.2, 0.15),
        });

        let plane = Arc::new(Mesh::plane(device, 40.0));
        let cube = Arc::new(Mesh::cube(device));
        let sphere = Arc::new(Mesh::sphere(device, 0.75, 32, 16));

        forward.create_mesh_instance(plane, ground_material);

        let mut spinners = Vec::new();
        for (i, x) in [-4.0f32, 0.0, 4.0].into_iter().enumerate() {
            let instance = forward.create_mesh_instance(cube.clone(), textured);
            instance.transform.position = Vec3::new(x, 0.5, -2.0);
            instance.transform.rotation = Quat::from_rotation_y(i as f32 * 0.4);
            spinners.push(1 + i * 2);

            let material = if i == 1 { textured } else { red };
            let ball = forward.create_mesh_instance(sphere.clone(), material);
            ball.transform.position = Vec3::new(x, 0.75, 2.0);
        }

        forward.create_directional_light(DirectionalLight {
            color: Vec3::new(1.0, 0.95, 0.85),
            intensity: 0.6,
            direction: Vec3::new(-0.4, -1.0, -0.3),
        });

        let mut rng = StdRng::seed_from_u64(LIGHT_SEED);
        let orbits = random_orbits(&mut rng, POINT_LIGHT_COUNT);
        for orbit in &orbits {
            forward.create_point_light(PointLight {
                color: Vec3::new(rng.gen_range(0.3..1.0), rng.gen_range(0.3..1.0), rng.gen_range(0.3..1.0)),
                intensity: 2.0,
                position: orbit.position(0.0),
                max_radius: 8.0,
            });
        }

        for (x, color) in [(-6.0, Vec3::new(1.0, 0.3, 0.3)), (6.0, Vec3::new(0.3, 0.5, 1.0))] {
            forward.create_spot_light(SpotLight {
                color,
                intensity: 4.0,
                position: Vec3::new(x, 6.0, 0.0),
                direction: Vec3::new(-x * 0.1, -1.0, 0.0),
                max_radius: 14.0,
                ..Default::default()
            });
        }

        Ok(Self {
            forward,
            orbits,
            spinners,
        })
    }
}

impl Scene for LightingScene {
    fn kind(&self) -> SceneKind {
        SceneKind::Lighting
    }

    fn camera_start(&self) -> CameraStart {
        CameraStart {
            position: Vec3::new(0.0, 5.0, 12.0),
            yaw: 0.0,
            pitch: -0.35,
        }
    }

    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: 0.02,
            g: 0.02,
            b: 0.03,
            a: 1.0,
        }
    }

    fn update(&mut self, dt: f32, elapsed: f32) {
        for (light, orbit) in self.forward.point_lights_mut().iter_mut().zip(&self.orbits) {
            light.position = orbit.position(elapsed);
        }
        for (i, spot) in self.forward.spot_lights_mut().iter_mut().enumerate() {
            let sway = (elapsed * 0.5 + i as f32 * std::f32::consts::PI).sin() * 0.6;
            spot.direction = Vec3::new(-spot.position.x * 0.1 + sway, -1.0, sway * 0.5);
        }
        let instances = self.forward.instances_mut();
        for &index in &self.spinners {
            if let Some(instance) = instances.get_mut(index) {
                instance.transform.rotation *= Quat::from_rotation_y(0.6 * dt);
            }
        }
    }

    fn prepare(&mut self, renderer: &Renderer, camera: &Camera) {
        self.forward.prepare(&renderer.device, &renderer.queue, camera);
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.forward.render(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbits_are_reproducible_from_the_seed() {
        let a = random_orbits(&mut StdRng::seed_from_u64(LIGHT_SEED), POINT_LIGHT_COUNT);
        let b = random_orbits(&mut StdRng::seed_from_u64(LIGHT_SEED), POINT_LIGHT_COUNT);
        assert_eq!(a, b);
        assert!(a.iter().all(|o| (3.0..9.0).contains(&o.radius)));
    }

    #[test]
    fn orbit_keeps_radius_and_height() {
        let orbit = Orbit {
            radius: 5.0,
            height: 2.0,
            speed: 1.0,
            phase: 0.0,
        };
        for t in [0.0, 0.7, 3.1] {
            let p = orbit.position(t);
            assert!((Vec3::new(p.x, 0.0, p.z).length() - 5.0).abs() < 1e-4);
            assert_eq!(p.y, 2.0);
        }
        assert!((orbit.position(0.0) - Vec3::new(5.0, 2.0, 0.0)).length() < 1e-5);
    }
}
