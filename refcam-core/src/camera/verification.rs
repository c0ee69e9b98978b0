//! Randomized checks of the analytic Jacobians against central finite
//! differences, and of forward-then-inverse round trips, for every model.

use std::f64::consts::PI;

use nalgebra::{SMatrix, SVector, Vector2, Vector3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{BearingManifold, Camera, UnitBearing};

const SEEDS: u64 = 5;
const SAMPLES_PER_SEED: usize = 20;

struct Case {
    name: &'static str,
    camera: Camera,
    /// Largest normalized radius sampled
    max_radius: f64,
    /// Relative tolerance of the finite-difference comparisons
    tolerance: f64,
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "radtan",
            camera: Camera::new_radtan(
                460.0, 455.0, 320.0, 240.0, -0.28, 0.07, 0.0, 0.0002, -0.0001,
            ),
            max_radius: 0.6,
            tolerance: 1e-6,
        },
        Case {
            name: "equidistant",
            camera: Camera::new_equidistant(
                400.0, 401.0, 320.0, 240.0, 0.01, 0.001, -0.0005, 0.0001,
            ),
            max_radius: 1.0,
            tolerance: 1e-6,
        },
        Case {
            name: "double sphere",
            camera: Camera::new_double_sphere(300.0, 305.0, 320.0, 240.0, -0.2, 0.6),
            max_radius: 1.0,
            tolerance: 1e-5,
        },
        Case {
            name: "refractive",
            camera: Camera::new_refractive(500.0, 500.0, 320.0, 240.0, 1.33),
            max_radius: 0.7,
            tolerance: 1e-6,
        },
        Case {
            name: "equirefractive",
            camera: Camera::new_equirefractive(
                400.0, 401.0, 320.0, 240.0, 0.01, 0.001, -0.0005, 0.0001, 1.33,
            ),
            max_radius: 0.6,
            tolerance: 1e-6,
        },
    ]
}

/// Random point on the normalized plane inside `max_radius`
fn random_plane_point(rng: &mut SmallRng, max_radius: f64) -> Vector2<f64> {
    let angle = rng.gen_range(0.0..2.0 * PI);
    let radius = rng.gen_range(0.0..max_radius);
    Vector2::new(radius * angle.cos(), radius * angle.sin())
}

/// Random non-unit bearing in front of the camera inside `max_radius`
fn random_bearing(rng: &mut SmallRng, max_radius: f64) -> Vector3<f64> {
    let p = random_plane_point(rng, max_radius);
    let depth = rng.gen_range(0.5..3.0);
    Vector3::new(p.x, p.y, 1.0) * depth
}

/// Angle between two rays, accurate for nearly parallel vectors
fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

fn central_difference<const C: usize>(
    f: impl Fn(&SVector<f64, C>) -> Vector2<f64>,
    x: &SVector<f64, C>,
    eps: f64,
) -> SMatrix<f64, 2, C> {
    let mut jacobian = SMatrix::<f64, 2, C>::zeros();
    for i in 0..C {
        let mut plus = *x;
        let mut minus = *x;
        plus[i] += eps;
        minus[i] -= eps;
        jacobian.set_column(i, &((f(&plus) - f(&minus)) / (2.0 * eps)));
    }
    jacobian
}

fn assert_jacobian_close<const C: usize>(
    analytic: &SMatrix<f64, 2, C>,
    numeric: &SMatrix<f64, 2, C>,
    tolerance: f64,
    context: &str,
) {
    for r in 0..2 {
        for c in 0..C {
            let (a, n) = (analytic[(r, c)], numeric[(r, c)]);
            assert!(
                (a - n).abs() <= tolerance * n.abs().max(1.0),
                "{context}: mismatch at ({r}, {c}): analytic {a}, numeric {n}"
            );
        }
    }
}

#[test]
fn test_round_trip_every_model() {
    for case in cases() {
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let bearing = random_bearing(&mut rng, case.max_radius);
                let pixel = case.camera.bearing_to_pixel(&bearing, None).unwrap();
                let recovered = case.camera.pixel_to_bearing(&pixel).unwrap();

                assert!((recovered.norm() - 1.0).abs() < 1e-12);
                let error = angle_between(&recovered, &bearing);
                assert!(error < 1e-5, "{}: round trip error {error}", case.name);
            }
        }
    }
}

#[test]
fn test_iterative_inverse_handles_refractive_models() {
    for case in cases().into_iter().filter(|c| c.camera.model().is_refractive()) {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..SAMPLES_PER_SEED {
            // The Gauss-Newton seed is the distorted point, which must itself
            // lie inside the refraction domain
            let bearing = random_bearing(&mut rng, case.max_radius * 0.5);
            let pixel = case.camera.bearing_to_pixel(&bearing, None).unwrap();
            let iterative = case.camera.pixel_to_bearing_iterative(&pixel).unwrap();
            let analytic = case.camera.pixel_to_bearing_analytical(&pixel, None).unwrap();
            assert!(angle_between(&iterative, &bearing) < 1e-5, "{}", case.name);
            assert!(angle_between(&analytic, &bearing) < 1e-9, "{}", case.name);
        }
    }
}

#[test]
fn test_distortion_jacobian_matches_finite_difference() {
    for case in cases() {
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let p = random_plane_point(&mut rng, case.max_radius);
                let (_, analytic) = case.camera.distort_with_jacobian(&p).unwrap();
                let numeric =
                    central_difference(|x| case.camera.distort(x).unwrap(), &p, 1e-6);
                assert_jacobian_close(&analytic, &numeric, case.tolerance, case.name);
            }
        }
    }
}

#[test]
fn test_explicit_index_jacobian_matches_finite_difference() {
    let stored = 1.0;
    let explicit = 1.33;
    let cameras = [
        Camera::new_refractive(500.0, 500.0, 320.0, 240.0, stored),
        Camera::new_equirefractive(
            400.0, 401.0, 320.0, 240.0, 0.01, 0.001, -0.0005, 0.0001, stored,
        ),
    ];
    for camera in cameras {
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let p = random_plane_point(&mut rng, 0.6);
                let (out, analytic) = camera.distort_with_index_jacobian(&p, explicit).unwrap();
                assert_eq!(out, camera.distort_with_index(&p, explicit).unwrap());
                assert_ne!(out, camera.distort(&p).unwrap());

                let numeric = central_difference(
                    |x| camera.distort_with_index(x, explicit).unwrap(),
                    &p,
                    1e-6,
                );
                assert_jacobian_close(&analytic, &numeric, 1e-6, camera.model().as_str());
            }
        }
    }
}

#[test]
fn test_bearing_jacobian_matches_finite_difference() {
    for case in cases() {
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let bearing = random_bearing(&mut rng, case.max_radius * 0.95);
                let analytic = case
                    .camera
                    .bearing_to_pixel_with_jacobian(&bearing, None)
                    .unwrap()
                    .d_bearing;
                let numeric = central_difference(
                    |b| case.camera.bearing_to_pixel(b, None).unwrap(),
                    &bearing,
                    1e-6,
                );
                assert_jacobian_close(&analytic, &numeric, case.tolerance, case.name);
            }
        }
    }
}

#[test]
fn test_normal_jacobian_matches_finite_difference() {
    for case in cases() {
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let normal = UnitBearing::from_vector(&random_bearing(
                    &mut rng,
                    case.max_radius * 0.95,
                ));
                let analytic = case
                    .camera
                    .normal_to_pixel_with_jacobian(&normal, None)
                    .unwrap()
                    .d_normal;
                let numeric = central_difference(
                    |d| {
                        case.camera
                            .normal_to_pixel(&normal.box_plus(d), None)
                            .unwrap()
                    },
                    &Vector2::zeros(),
                    1e-6,
                );
                assert_jacobian_close(&analytic, &numeric, case.tolerance, case.name);
            }
        }
    }
}

#[test]
fn test_index_jacobian_matches_finite_difference() {
    for case in cases() {
        let n = case.camera.refractive_index();
        for seed in 0..SEEDS {
            let mut rng = SmallRng::seed_from_u64(seed);
            for _ in 0..SAMPLES_PER_SEED {
                let bearing = random_bearing(&mut rng, case.max_radius * 0.9);
                let analytic = case
                    .camera
                    .bearing_to_pixel_with_jacobian(&bearing, Some(n))
                    .unwrap()
                    .d_index;
                let numeric = central_difference(
                    |index| {
                        case.camera
                            .bearing_to_pixel(&bearing, Some(index[0]))
                            .unwrap()
                    },
                    &SVector::<f64, 1>::new(n),
                    1e-6,
                );
                assert_jacobian_close(&analytic, &numeric, case.tolerance, case.name);
                if !case.camera.model().is_refractive() {
                    assert_eq!(analytic, Vector2::zeros());
                }
            }
        }
    }
}

#[test]
fn test_degenerate_radius_is_stable_for_every_model() {
    for case in cases() {
        let (out, j) = case.camera.distort_with_jacobian(&Vector2::zeros()).unwrap();
        assert_eq!(out, Vector2::zeros());
        assert!(j.iter().all(|v| v.is_finite()), "{}", case.name);

        let jacobians = case
            .camera
            .bearing_to_pixel_with_jacobian(&Vector3::z(), None)
            .unwrap();
        assert_eq!(jacobians.pixel, Vector2::new(320.0, 240.0));
        assert!(jacobians.d_bearing.iter().all(|v| v.is_finite()));
    }
}
