//! Density, force and integration passes.

use cgmath::{prelude::*, Vector2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sph2d::{
    integrate, sph, NeighborSearch, Particle, RayonKeySorter, Simulation, SimulationConstants,
    SimulationParams, Stage,
};

fn random_particles(count: usize, seed: u64, lo: f32, hi: f32) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Particle::new(
                Vector2::new(rng.gen_range(lo..hi), rng.gen_range(lo..hi)),
                Vector2::new(rng.gen_range(-0.2..0.2), rng.gen_range(-0.2..0.2)),
            )
        })
        .collect()
}

fn run_until(simulation: &mut Simulation, last: Stage) {
    for stage in Stage::ALL {
        simulation.run_stage(stage).unwrap();
        if stage == last {
            break;
        }
    }
}

/// Density, acceleration and the summed magnitude of the acceleration terms
/// of every particle, by direct summation in f64.
struct DirectSum {
    densities: Vec<f64>,
    accelerations: Vec<[f64; 2]>,
    scales: Vec<f64>,
}

fn direct_sum(particles: &[Particle], consts: &SimulationConstants) -> DirectSum {
    let h = consts.smoothing_length as f64;
    let coef_density = consts.kernel.density as f64;
    let coef_grad = consts.kernel.grad_pressure as f64;
    let coef_lap = consts.kernel.lap_viscosity as f64;
    let rest = consts.rest_density as f64;
    let stiffness = consts.pressure_stiffness as f64;

    let position = |p: &Particle| [p.position.x as f64, p.position.y as f64];
    let velocity = |p: &Particle| [p.velocity.x as f64, p.velocity.y as f64];
    let dist_sq = |a: [f64; 2], b: [f64; 2]| (b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2);

    let densities: Vec<f64> = particles
        .iter()
        .map(|p| {
            particles
                .iter()
                .map(|n| dist_sq(position(p), position(n)))
                .filter(|r_sq| *r_sq < h * h)
                .map(|r_sq| coef_density * (h * h - r_sq).powi(3))
                .sum()
        })
        .collect();
    let pressure = |rho: f64| stiffness * ((rho / rest).powi(3) - 1.0).max(0.0);

    let mut accelerations = Vec::new();
    let mut scales = Vec::new();
    for (i, p) in particles.iter().enumerate() {
        let (xp, vp) = (position(p), velocity(p));
        let mut sum = [0.0; 2];
        let mut scale = 0.0;
        for (j, n) in particles.iter().enumerate() {
            let (xn, vn) = (position(n), velocity(n));
            let r_sq = dist_sq(xp, xn);
            if i == j || r_sq == 0.0 || r_sq >= h * h {
                continue;
            }
            let r = r_sq.sqrt();
            let grad = coef_grad * 0.5 * (pressure(densities[i]) + pressure(densities[j]))
                / densities[j]
                * (h - r)
                * (h - r)
                / r;
            let lap = coef_lap / densities[j] * (h - r);
            for axis in 0..2 {
                let grad_term = grad * (xn[axis] - xp[axis]);
                let lap_term = lap * (vn[axis] - vp[axis]);
                sum[axis] += grad_term + lap_term;
                scale += grad_term.abs() + lap_term.abs();
            }
        }
        accelerations.push([sum[0] / densities[i], sum[1] / densities[i]]);
        scales.push(scale / densities[i]);
    }

    DirectSum {
        densities,
        accelerations,
        scales,
    }
}

fn assert_matches_direct_sum(simulation: &Simulation) -> DirectSum {
    let expected = direct_sum(simulation.rearranged_particles(), simulation.constants());
    for (i, density) in simulation.densities().iter().enumerate() {
        let want = expected.densities[i];
        assert!(
            (*density as f64 - want).abs() <= 1.0e-4 * want,
            "density {}: {} vs {}",
            i,
            density,
            want
        );
    }
    for (i, force) in simulation.forces().iter().enumerate() {
        let want = expected.accelerations[i];
        let tolerance = 1.0e-4 * expected.scales[i] + 1.0e-9;
        assert!(
            (force.x as f64 - want[0]).abs() <= tolerance
                && (force.y as f64 - want[1]).abs() <= tolerance,
            "acceleration {}: {:?} vs {:?}",
            i,
            force,
            want
        );
    }
    expected
}

#[test]
fn density_never_drops_below_self_contribution() {
    let mut simulation =
        Simulation::new(SimulationParams::default(), random_particles(3000, 7, 0.1, 0.9)).unwrap();
    run_until(&mut simulation, Stage::Density);

    let self_term = sph::density_kernel(0.0, simulation.constants());
    assert!(self_term > 0.0);
    for density in simulation.densities() {
        assert!(*density >= self_term, "{} < {}", density, self_term);
    }
}

#[test]
fn isolated_particle_has_self_density_only() {
    let mut simulation = Simulation::new(
        SimulationParams::default(),
        vec![Particle::at_rest(Vector2::new(0.8, 0.6))],
    )
    .unwrap();
    run_until(&mut simulation, Stage::Density);

    let self_term = sph::density_kernel(0.0, simulation.constants());
    assert_eq!(simulation.densities(), &[self_term]);
}

#[test]
fn pressure_is_never_negative() {
    let consts = *Simulation::new(
        SimulationParams::default(),
        vec![Particle::at_rest(Vector2::new(0.5, 0.5))],
    )
    .unwrap()
    .constants();

    for density in [0.0, 1.0e-6, 10.0, 500.0, 999.0, 1000.0] {
        assert_eq!(sph::pressure(density, &consts), 0.0);
    }
    assert!(sph::pressure(1200.0, &consts) > 0.0);
    assert!(sph::pressure(2000.0, &consts) > sph::pressure(1200.0, &consts));
}

#[test]
fn wall_term_is_zero_inside_and_linear_outside() {
    let simulation = Simulation::new(
        SimulationParams::default(),
        vec![Particle::at_rest(Vector2::new(0.5, 0.5))],
    )
    .unwrap();
    let consts = simulation.constants();

    assert_eq!(
        integrate::wall_acceleration(Vector2::new(0.8, 0.6), consts),
        Vector2::zero()
    );
    assert_eq!(
        integrate::wall_acceleration(Vector2::new(0.0, 0.0), consts),
        Vector2::zero()
    );

    let shallow = integrate::wall_acceleration(Vector2::new(-0.01, 0.6), consts);
    let deep = integrate::wall_acceleration(Vector2::new(-0.02, 0.6), consts);
    assert!((shallow.x - 30.0).abs() < 1.0e-3);
    assert_eq!(shallow.y, 0.0);
    assert!((deep.x - 2.0 * shallow.x).abs() < 1.0e-3);

    let below = integrate::wall_acceleration(Vector2::new(0.8, -0.01), consts);
    assert_eq!(below.x, 0.0);
    assert!(below.y > 0.0);

    let corner = integrate::wall_acceleration(Vector2::new(1.7, 1.3), consts);
    assert!(corner.x < 0.0 && corner.y < 0.0);
}

#[test]
fn two_particles_repel_symmetrically() {
    let params = SimulationParams {
        rest_density: 100.0,
        ..SimulationParams::default()
    };
    let left = Vector2::new(0.8, 0.6);
    let right = Vector2::new(0.806, 0.6);
    let mut simulation = Simulation::new(
        params,
        vec![Particle::at_rest(right), Particle::at_rest(left)],
    )
    .unwrap();
    run_until(&mut simulation, Stage::Force);

    let densities = simulation.densities();
    assert_eq!(densities[0], densities[1]);
    assert!(densities[0] > 100.0);

    let forces = simulation.forces();
    assert_eq!(forces[0], -forces[1]);
    assert_eq!(forces[0].y, 0.0);

    for (particle, force) in simulation.rearranged_particles().iter().zip(forces) {
        let away = if particle.position == left { -1.0 } else { 1.0 };
        assert!(force.x * away > 0.0, "{:?} pushed towards its neighbor", particle);
    }

    simulation.run_stage(Stage::Integrate).unwrap();
    let after = simulation.particles();
    let gap = (after[0].position - after[1].position).magnitude();
    assert!(gap > (right - left).magnitude());
    assert_eq!(after[0].position.y, after[1].position.y);
}

#[test]
fn lone_particle_falls_freely() {
    let params = SimulationParams {
        gravity: Vector2::new(0.0, -9.8),
        rest_density: 0.1,
        walls: Vec::new(),
        ..SimulationParams::default()
    };
    let dt = params.time_step;
    let start = Vector2::new(0.8, 0.6);
    let mut simulation = Simulation::new(params, vec![Particle::at_rest(start)]).unwrap();

    let steps = 10;
    for _ in 0..steps {
        simulation.step().unwrap();
    }

    let k = steps as f32;
    let particle = simulation.particles()[0];
    let expected_y = start.y - 9.8 * dt * dt * k * (k + 1.0) / 2.0;
    assert_eq!(particle.position.x, start.x);
    assert!((particle.position.y - expected_y).abs() < 1.0e-5);
    assert!((particle.velocity.y + 9.8 * dt * k).abs() < 1.0e-4);
    assert_eq!(simulation.forces()[0], Vector2::zero());
}

#[test]
fn grid_search_matches_brute_force() {
    let particles = random_particles(1200, 11, 0.2, 0.6);

    let mut grid = Simulation::new(SimulationParams::default(), particles.clone()).unwrap();
    let brute_params = SimulationParams {
        neighbor_search: NeighborSearch::BruteForce,
        ..SimulationParams::default()
    };
    let mut brute = Simulation::new(brute_params, particles).unwrap();

    grid.step().unwrap();
    brute.step().unwrap();

    assert!(brute.last_stage_time(Stage::BuildGrid).is_none());
    assert_eq!(brute.particle_ids(), (0..1200).collect::<Vec<u32>>().as_slice());

    let max_force = brute
        .forces()
        .iter()
        .map(|f| f.magnitude())
        .fold(0.0f32, f32::max);
    let force_tolerance = 1.0e-4 * max_force + 1.0e-6;

    for (i, id) in grid.particle_ids().iter().enumerate() {
        let id = *id as usize;
        let (d_grid, d_brute) = (grid.densities()[i], brute.densities()[id]);
        assert!(
            (d_grid - d_brute).abs() <= 1.0e-4 * d_brute,
            "density of {}: {} vs {}",
            id,
            d_grid,
            d_brute
        );

        let diff = (grid.forces()[i] - brute.forces()[id]).magnitude();
        assert!(diff <= force_tolerance, "force of {} differs by {}", id, diff);
    }
}

#[test]
fn bitonic_and_rayon_sorts_agree() {
    let particles = random_particles(5000, 13, 0.05, 1.1);
    let mut bitonic = Simulation::new(SimulationParams::default(), particles.clone()).unwrap();
    let mut quick = Simulation::with_sorter(
        SimulationParams::default(),
        particles,
        Box::new(RayonKeySorter),
    )
    .unwrap();

    for _ in 0..3 {
        bitonic.step().unwrap();
        quick.step().unwrap();
    }

    assert_eq!(bitonic.grid_entries(), quick.grid_entries());
    assert_eq!(bitonic.particle_ids(), quick.particle_ids());
    assert_eq!(bitonic.particles(), quick.particles());
}

#[test]
fn forces_divide_once_by_own_density() {
    let params = SimulationParams {
        rest_density: 100.0,
        ..SimulationParams::default()
    };
    let particles = vec![
        Particle::new(Vector2::new(0.8, 0.6), Vector2::new(0.1, 0.0)),
        Particle::new(Vector2::new(0.806, 0.6), Vector2::new(-0.05, 0.02)),
        Particle::new(Vector2::new(0.803, 0.6045), Vector2::new(0.0, -0.1)),
        Particle::new(Vector2::new(0.8095, 0.6055), Vector2::new(0.03, 0.04)),
    ];
    let mut simulation = Simulation::new(params, particles).unwrap();
    run_until(&mut simulation, Stage::Force);

    let densities = simulation.densities();
    for i in 0..densities.len() {
        for j in i + 1..densities.len() {
            let ratio = densities[i] / densities[j];
            assert!((ratio - 1.0).abs() > 0.01, "densities {} and {} match", i, j);
        }
    }
    assert!(densities
        .iter()
        .all(|rho| sph::pressure(*rho, simulation.constants()) > 0.0));

    let expected = assert_matches_direct_sum(&simulation);
    assert!(expected.scales.iter().all(|scale| *scale > 0.0));
}

#[test]
fn coincident_particles_count_in_density_but_not_in_force() {
    let params = SimulationParams {
        rest_density: 100.0,
        ..SimulationParams::default()
    };
    let twin = Vector2::new(0.8, 0.6);
    let other = Vector2::new(0.806, 0.6);
    let mut simulation = Simulation::new(
        params,
        vec![
            Particle::at_rest(twin),
            Particle::at_rest(twin),
            Particle::at_rest(other),
        ],
    )
    .unwrap();
    run_until(&mut simulation, Stage::Force);

    let consts = simulation.constants();
    let self_term = sph::density_kernel(0.0, consts);
    let r_sq = (other - twin).magnitude2();
    let pair_term = sph::density_kernel(r_sq, consts);

    let twins: Vec<usize> = simulation
        .rearranged_particles()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.position == twin)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(twins.len(), 2);

    let densities = simulation.densities();
    let forces = simulation.forces();
    for i in &twins {
        let want = 2.0 * self_term + pair_term;
        assert!((densities[*i] - want).abs() <= 1.0e-5 * want);
        assert!(sph::pressure(densities[*i], consts) > 0.0);
        assert!(forces[*i].x.is_finite() && forces[*i].y.is_finite());
        assert!(forces[*i].x < 0.0);
    }
    assert_eq!(forces[twins[0]], forces[twins[1]]);

    assert_matches_direct_sum(&simulation);
}
