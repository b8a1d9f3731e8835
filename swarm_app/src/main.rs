//! Swarm Demo
//!
//! Drives a batched instance pool headlessly with a swarm of drifting cubes:
//! - Every frame a random subset of the swarm moves and is rewritten
//! - Some cubes change color, the swarm grows and shrinks over time
//! - One flush per frame; per-frame flush work is logged
//!
//! Usage: `swarm_demo [config.toml|config.ron]`

use instance_pool::foundation::logging;
use instance_pool::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Simulation settings
const FRAMES: usize = 120;
const WORLD_HALF_EXTENT: f32 = 200.0;
const MAX_SPEED: f32 = 4.0;
const MOVERS_PER_FRAME: usize = 64;
const RECOLORS_PER_FRAME: usize = 8;
const RNG_SEED: u64 = 0x5eed;

/// Errors surfaced by the demo
#[derive(thiserror::Error, Debug)]
enum SwarmError {
    #[error(transparent)]
    Pool(#[from] PoolError),
}

struct Member {
    position: Vec3,
    velocity: Vec3,
}

struct SwarmApp {
    pool: BatchedInstancePool<CpuBackend>,
    members: Vec<Member>,
    rng: StdRng,
}

impl SwarmApp {
    fn new(mut pool: BatchedInstancePool<CpuBackend>) -> Self {
        let mut rng = StdRng::seed_from_u64(RNG_SEED);

        let members: Vec<Member> = (0..pool.max_instances())
            .map(|_| Member {
                position: random_vec(&mut rng, WORLD_HALF_EXTENT),
                velocity: random_vec(&mut rng, MAX_SPEED),
            })
            .collect();

        let transforms: Vec<Mat4> = members
            .iter()
            .map(|m| Transform::from_position(m.position).to_matrix())
            .collect();
        pool.set_transforms(&transforms, 0);
        pool.flush();
        pool.compute_bounds();

        Self { pool, members, rng }
    }

    fn update(&mut self, frame: usize, delta_time: f32) -> Result<FlushReport, SwarmError> {
        if self.members.is_empty() {
            return Ok(self.pool.flush());
        }

        for _ in 0..MOVERS_PER_FRAME {
            let index = self.rng.gen_range(0..self.members.len());
            let member = &mut self.members[index];
            member.position += member.velocity * delta_time;
            for axis in 0..3 {
                if member.position[axis].abs() > WORLD_HALF_EXTENT {
                    member.velocity[axis] = -member.velocity[axis];
                }
            }
            let transform = Transform::from_position(member.position).to_matrix();
            self.pool.set_transform(index, &transform);
        }

        if self.pool.colors_enabled() {
            for _ in 0..RECOLORS_PER_FRAME {
                let index = self.rng.gen_range(0..self.members.len());
                let color = Color::new(self.rng.gen(), self.rng.gen(), self.rng.gen());
                self.pool.set_color(index, &color);
            }
        }

        // Despawn the back half for a while, then grow the swarm
        if frame == FRAMES / 3 {
            self.pool.set_active_count(self.members.len() / 2);
        } else if frame == 2 * FRAMES / 3 {
            let grown = self.members.len() + self.members.len() / 2;
            self.grow(grown)?;
        }

        Ok(self.pool.flush())
    }

    fn grow(&mut self, max_instances: usize) -> Result<(), SwarmError> {
        let start = self.members.len();
        self.pool.resize(max_instances)?;

        for _ in start..max_instances {
            self.members.push(Member {
                position: random_vec(&mut self.rng, WORLD_HALF_EXTENT),
                velocity: random_vec(&mut self.rng, MAX_SPEED),
            });
        }
        let transforms: Vec<Mat4> = self.members[start..]
            .iter()
            .map(|m| Transform::from_position(m.position).to_matrix())
            .collect();
        self.pool.set_transforms(&transforms, start);
        self.pool.set_active_count(max_instances);
        Ok(())
    }

    fn run(mut self) -> Result<(), SwarmError> {
        let delta_time = 1.0 / 60.0;
        for frame in 0..FRAMES {
            let report = self.update(frame, delta_time)?;
            log::debug!(
                "Frame {}: flushed {} of {} batches, {} bounds",
                frame, report.batches, self.pool.batch_count(), report.bounds_recomputed
            );
        }

        let stats = self.pool.stats();
        log::info!("Swarm finished after {} frames: {:?}", FRAMES, stats);
        println!(
            "{} batches, {} / {} instances drawn, {} batch flushes ({} matrix uploads, {} color uploads, {} bounds)",
            stats.batch_count, stats.active_count, stats.max_instances, stats.batches_flushed,
            stats.matrix_uploads, stats.color_uploads, stats.bounds_recomputations
        );
        Ok(())
    }
}

fn random_vec(rng: &mut StdRng, half_extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let shape = ShapeDescriptor::unit_cube();
    let pool = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading pool configuration from {}", path);
            BatchedInstancePool::from_config_file(&path, CpuBackend::new(), shape)?
        }
        None => {
            let config = PoolConfig::new(256, 4000).with_colors(true).with_bounds(true);
            BatchedInstancePool::new(&config, CpuBackend::new(), shape)?
        }
    };

    println!("=== Swarm Demo ===");
    println!(
        "batch size {}, {} instances, colors: {}, bounds: {}",
        pool.batch_size(), pool.max_instances(), pool.colors_enabled(), pool.bounds_enabled()
    );

    SwarmApp::new(pool).run()?;
    Ok(())
}
