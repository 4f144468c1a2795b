//! Initial object list: validation and a scattered test fixture
//!
//! The core never generates a city on its own during a round; the host
//! hands over an object list once at round start.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SimConfig;
use crate::game::game_loop::SimError;
use crate::game::state::ObjectSpec;
use crate::util::vec2::Vec2;

/// Size tiers for the scattered fixture: (share, min size, max size)
const FIXTURE_TIERS: [(f32, f32, f32); 3] = [
    (0.6, 3.0, 10.0),  // props
    (0.3, 12.0, 25.0), // cars and kiosks
    (0.1, 30.0, 60.0), // buildings
];

/// Largest object radius a world of this config accepts
pub fn object_size_limit(config: &SimConfig) -> f32 {
    config.world_width.max(config.world_height)
}

/// Reject objects the simulation cannot place
pub fn validate_objects(objects: &[ObjectSpec], config: &SimConfig) -> Result<(), SimError> {
    let limit = object_size_limit(config);
    for (index, spec) in objects.iter().enumerate() {
        if !spec.position.is_finite() {
            return Err(SimError::NonFinitePosition { index });
        }
        if !(spec.size > 0.0) || !spec.size.is_finite() {
            return Err(SimError::InvalidObjectSize { index, size: spec.size });
        }
        if spec.size > limit {
            return Err(SimError::ObjectTooLarge {
                index,
                size: spec.size,
                limit,
            });
        }
    }
    Ok(())
}

/// Median object size; 0 for an empty list
pub fn median_size(objects: &[ObjectSpec]) -> f32 {
    if objects.is_empty() {
        return 0.0;
    }
    let mut sizes: Vec<f32> = objects.iter().map(|o| o.size).collect();
    sizes.sort_by(f32::total_cmp);
    let mid = sizes.len() / 2;
    if sizes.len() % 2 == 0 {
        (sizes[mid - 1] + sizes[mid]) * 0.5
    } else {
        sizes[mid]
    }
}

/// Scatter `count` objects uniformly over the world
///
/// Deterministic for a given seed; used by the runner and benches when no
/// object list is supplied.
pub fn scatter_fixture(count: usize, width: f32, height: f32, seed: u64) -> Vec<ObjectSpec> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut objects = Vec::with_capacity(count);

    for (share, min_size, max_size) in FIXTURE_TIERS {
        let tier_count = ((count as f32) * share).round() as usize;
        for _ in 0..tier_count {
            if objects.len() == count {
                break;
            }
            let size = rng.gen_range(min_size..=max_size);
            let margin = size.min(width * 0.5).min(height * 0.5);
            objects.push(ObjectSpec {
                position: Vec2::new(
                    rng.gen_range(margin..=width - margin),
                    rng.gen_range(margin..=height - margin),
                ),
                size,
                blocking: true,
            });
        }
    }

    // Rounding can leave a few slots; fill them with props
    while objects.len() < count {
        let size = rng.gen_range(FIXTURE_TIERS[0].1..=FIXTURE_TIERS[0].2);
        objects.push(ObjectSpec {
            position: Vec2::new(rng.gen_range(size..=width - size), rng.gen_range(size..=height - size)),
            size,
            blocking: true,
        });
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(x: f32, y: f32, size: f32) -> ObjectSpec {
        ObjectSpec {
            position: Vec2::new(x, y),
            size,
            blocking: true,
        }
    }

    #[test]
    fn test_validate_accepts_good_list() {
        let config = SimConfig::default();
        assert!(validate_objects(&[spec(1.0, 2.0, 3.0)], &config).is_ok());
        assert!(validate_objects(&[], &config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_objects() {
        let config = SimConfig::default();
        assert!(matches!(
            validate_objects(&[spec(1.0, 1.0, 1.0), spec(f32::NAN, 0.0, 1.0)], &config),
            Err(SimError::NonFinitePosition { index: 1 })
        ));
        assert!(matches!(
            validate_objects(&[spec(1.0, 1.0, 0.0)], &config),
            Err(SimError::InvalidObjectSize { index: 0, .. })
        ));
        assert!(validate_objects(&[spec(1.0, 1.0, f32::INFINITY)], &config).is_err());
    }

    #[test]
    fn test_validate_rejects_object_larger_than_world() {
        let config = SimConfig::default();
        let objects = [spec(100.0, 100.0, 5.0), spec(-50_000.0, -50_000.0, 20_000.0)];
        assert_eq!(
            validate_objects(&objects, &config),
            Err(SimError::ObjectTooLarge {
                index: 1,
                size: 20_000.0,
                limit: 2000.0,
            })
        );
        assert!(validate_objects(&[spec(1000.0, 1000.0, 2000.0)], &config).is_ok());
    }

    #[test]
    fn test_median_size() {
        let objects = [spec(0.0, 0.0, 4.0), spec(0.0, 0.0, 1.0), spec(0.0, 0.0, 9.0)];
        assert_eq!(median_size(&objects), 4.0);
        assert_eq!(median_size(&objects[..2]), 2.5);
        assert_eq!(median_size(&[]), 0.0);
    }

    #[test]
    fn test_fixture_is_deterministic_and_in_bounds() {
        let a = scatter_fixture(500, 2000.0, 2000.0, 7);
        let b = scatter_fixture(500, 2000.0, 2000.0, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);
        assert!(validate_objects(&a, &SimConfig::default()).is_ok());
        for o in &a {
            assert!(o.position.x >= o.size && o.position.x <= 2000.0 - o.size);
            assert!(o.position.y >= o.size && o.position.y <= 2000.0 - o.size);
        }
        assert_ne!(a, scatter_fixture(500, 2000.0, 2000.0, 8));
    }

    #[test]
    fn test_fixture_odd_counts() {
        for count in [0, 1, 7, 33] {
            assert_eq!(scatter_fixture(count, 2000.0, 2000.0, 1).len(), count);
        }
    }
}
