// Euclidean rhythms - Bjorklund distribution of hits over steps

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sequencer::timeline::Tick;

/// Distribute `hits` onsets as evenly as possible over `steps`, then rotate left
///
/// `hits <= 0` gives all rests, `hits >= steps` all onsets, `steps == 0` an empty pattern.
/// Negative rotations are normalized into `[0, steps)`.
pub fn euclidean(hits: i32, steps: u32, rotation: i32) -> Vec<bool> {
    let steps = steps as usize;
    if steps == 0 {
        return Vec::new();
    }

    let mut pattern = if hits <= 0 {
        vec![false; steps]
    } else if hits as usize >= steps {
        vec![true; steps]
    } else {
        bjorklund(hits as usize, steps)
    };

    let shift = (rotation as i64).rem_euclid(steps as i64) as usize;
    pattern.rotate_left(shift);
    pattern
}

fn bjorklund(hits: usize, steps: usize) -> Vec<bool> {
    let mut groups: Vec<Vec<bool>> = vec![vec![true]; hits];
    let mut remainder: Vec<Vec<bool>> = vec![vec![false]; steps - hits];

    while remainder.len() > 1 {
        let count = groups.len().min(remainder.len());

        // Leftover groups on the longer side become the next remainder
        let leftover = if groups.len() > count {
            groups.split_off(count)
        } else {
            remainder.split_off(count)
        };

        for (group, tail) in groups.iter_mut().zip(remainder.drain(..count)) {
            group.extend(tail);
        }
        remainder = leftover;
    }

    groups.into_iter().chain(remainder).flatten().collect()
}

/// Serializable Euclidean rhythm description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EuclideanSpec {
    pub hits: i32,
    pub steps: u32,
    #[serde(default)]
    pub rotation: i32,
}

impl EuclideanSpec {
    pub fn new(hits: i32, steps: u32, rotation: i32) -> Self {
        Self { hits, steps, rotation }
    }

    /// Boolean onset pattern of length `steps`
    pub fn pattern(&self) -> Vec<bool> {
        euclidean(self.hits, self.steps, self.rotation)
    }

    /// Tick offsets (within one bar) of every onset
    pub fn onsets(&self, ticks_per_bar: Tick) -> Vec<Tick> {
        let steps = self.steps as Tick;
        self.pattern()
            .iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .map(|(step, _)| step as Tick * ticks_per_bar / steps)
            .collect()
    }
}

impl fmt::Display for EuclideanSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hit in self.pattern() {
            f.write_str(if hit { "x" } else { "." })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pattern: &[bool]) -> String {
        pattern.iter().map(|&h| if h { 'x' } else { '.' }).collect()
    }

    #[test]
    fn test_tresillo() {
        assert_eq!(render(&euclidean(3, 8, 0)), "x..x..x.");
    }

    #[test]
    fn test_known_patterns() {
        assert_eq!(render(&euclidean(5, 8, 0)), "x.xx.xx.");
        assert_eq!(render(&euclidean(4, 16, 0)), "x...x...x...x...");
        assert_eq!(render(&euclidean(2, 5, 0)), "x.x..");
    }

    #[test]
    fn test_rotation() {
        assert_eq!(render(&euclidean(3, 8, 1)), "..x..x.x");
        assert_eq!(render(&euclidean(3, 8, -1)), ".x..x..x");
        assert_eq!(euclidean(3, 8, 8), euclidean(3, 8, 0));
        assert_eq!(euclidean(3, 8, -7), euclidean(3, 8, 1));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(euclidean(0, 8, 3).iter().all(|h| !h));
        assert!(euclidean(-2, 8, 0).iter().all(|h| !h));
        assert!(euclidean(8, 8, 5).iter().all(|h| *h));
        assert!(euclidean(12, 8, 0).iter().all(|h| *h));
        assert_eq!(euclidean(12, 8, 0).len(), 8);
        assert!(euclidean(3, 0, 0).is_empty());
    }

    #[test]
    fn test_hit_count_and_length() {
        for steps in 1..=16u32 {
            for hits in 0..=steps as i32 {
                let pattern = euclidean(hits, steps, 0);
                assert_eq!(pattern.len(), steps as usize);
                assert_eq!(pattern.iter().filter(|h| **h).count(), hits as usize);
                assert_eq!(euclidean(hits, steps, steps as i32), pattern);
            }
        }
    }

    #[test]
    fn test_onsets() {
        let spec = EuclideanSpec::new(3, 8, 0);
        assert_eq!(spec.onsets(1920), vec![0, 720, 1440]);
        assert_eq!(spec.to_string(), "x..x..x.");
    }
}
