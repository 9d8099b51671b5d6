//! Generation-grouping schemes (§4.3): which packet indices belong to
//! which generation (BAND, WINDWRAP, RAND, PSEUDORAND, BATS).

use crate::config::{GroupingKind, Params, BALLOC};
use crate::error::SncError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};

/// `{gid, pktid}` — the i-th member's global index into `pp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub gid: usize,
    pub pktid: Vec<usize>,
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

fn band_generations(m: usize, size_b: usize, size_g: usize) -> Vec<Generation> {
    let gnum = ceil_div(m - size_g, size_b) + 1;
    (0..gnum)
        .map(|i| {
            let leading = std::cmp::min(i * size_b, m - size_g);
            Generation {
                gid: i,
                pktid: (leading..leading + size_g).collect(),
            }
        })
        .collect()
}

fn windwrap_generations(m: usize, size_b: usize, size_g: usize) -> Vec<Generation> {
    let gnum = ceil_div(m, size_b);
    (0..gnum)
        .map(|i| {
            let pktid = (0..size_g).map(|j| (i * size_b + j) % m).collect();
            Generation { gid: i, pktid }
        })
        .collect()
}

fn rand_generations(m: usize, size_b: usize, size_g: usize, seed: i64) -> Vec<Generation> {
    let gnum = ceil_div(m, size_b);
    let mut rng = StdRng::seed_from_u64(seed as u64);
    (0..gnum)
        .map(|i| {
            let mut pktid = Vec::with_capacity(size_g);
            let mut seen = HashSet::with_capacity(size_g);
            for j in 0..size_b {
                let idx = (i * size_b + j) % m;
                seen.insert(idx);
                pktid.push(idx);
            }
            while pktid.len() < size_g {
                let idx = rng.gen_range(0..m);
                if seen.insert(idx) {
                    pktid.push(idx);
                }
            }
            Generation { gid: i, pktid }
        })
        .collect()
}

/// Each generation's first `size_b` slots are its own disjoint band; the
/// remaining `size_g - size_b` slots are cross-mixed in from *other*
/// generations via a rotating `start`/`rotate` index, with per-slot
/// collision avoidance against the slots already filled. `magic_x` offsets
/// which generation a tail slot borrows from.
fn pseudorand_generations(m: usize, size_b: usize, size_g: usize, magic_x: i64) -> Vec<Generation> {
    let gnum = ceil_div(m - size_g, size_b) + 1;
    let mut rotate: i64 = 0;
    (0..gnum)
        .map(|i| {
            let mut pktid: Vec<usize> = Vec::with_capacity(size_g);
            for j in 0..size_b {
                let mut index = (i * size_b + j) % m;
                while pktid.contains(&index) {
                    index = (index + 1) % m;
                }
                pktid.push(index);
            }
            for j in size_b..size_g {
                let tmp = i as i64 - (j as i64 - size_b as i64 + magic_x);
                let mut start = tmp.rem_euclid(gnum as i64);
                if start == i as i64 {
                    start += 1;
                }
                let offset = (j as i64 - size_b as i64 + rotate) % size_g as i64;
                let mut index = (start * size_b as i64 + offset).rem_euclid(m as i64) as usize;
                while pktid.contains(&index) {
                    index = (index + 1) % m;
                }
                pktid.push(index);
            }
            rotate = (rotate + 7) % size_g as i64;
            Generation { gid: i, pktid }
        })
        .collect()
}

/// The full, deterministic generation table for bounded grouping schemes
/// (everything except BATS, which samples lazily — see [`BatsSampler`]).
pub fn build(params: &Params) -> Result<Vec<Generation>, SncError> {
    let m = params.pktnum();
    match params.grouping {
        GroupingKind::Band => Ok(band_generations(m, params.size_b, params.size_g)),
        GroupingKind::Windwrap => Ok(windwrap_generations(m, params.size_b, params.size_g)),
        GroupingKind::Rand => Ok(rand_generations(m, params.size_b, params.size_g, params.seed)),
        GroupingKind::Pseudorand => {
            let magic_x = params.magic_x();
            Ok(pseudorand_generations(m, params.size_b, params.size_g, magic_x))
        }
        GroupingKind::Bats => Err(SncError::InvalidParameter(
            "BATS has unbounded gnum; use BatsSampler instead".into(),
        )),
        GroupingKind::Raptor => Err(SncError::InvalidParameter(
            "RAPTOR grouping is not implemented".into(),
        )),
    }
}

/// Lazily samples BATS batches, `size_g` distinct indices uniform over
/// `[0, m)` per batch, allocated `BALLOC` batches at a time (§4.4).
pub struct BatsSampler {
    m: usize,
    size_g: usize,
    rng: StdRng,
    next_gid: usize,
    buffered: VecDeque<Generation>,
}

impl BatsSampler {
    pub fn new(params: &Params) -> Self {
        BatsSampler {
            m: params.pktnum(),
            size_g: params.size_g,
            rng: StdRng::seed_from_u64(params.seed as u64),
            next_gid: 0,
            buffered: VecDeque::new(),
        }
    }

    fn refill(&mut self) {
        for _ in 0..BALLOC {
            let mut seen = HashSet::with_capacity(self.size_g);
            while seen.len() < self.size_g {
                seen.insert(self.rng.gen_range(0..self.m));
            }
            let mut pktid: Vec<usize> = seen.into_iter().collect();
            pktid.sort_unstable();
            self.buffered.push_back(Generation {
                gid: self.next_gid,
                pktid,
            });
            self.next_gid += 1;
        }
    }

    /// Draws the next batch.
    pub fn next_batch(&mut self) -> Generation {
        if self.buffered.is_empty() {
            self.refill();
        }
        self.buffered.pop_front().expect("just refilled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_generations_cover_every_index() {
        let gens = band_generations(80, 16, 32);
        let mut covered = vec![false; 80];
        for g in &gens {
            for &idx in &g.pktid {
                covered[idx] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn band_generation_members_are_unique() {
        let gens = band_generations(80, 16, 32);
        for g in &gens {
            let set: HashSet<_> = g.pktid.iter().collect();
            assert_eq!(set.len(), g.pktid.len());
        }
    }

    #[test]
    fn windwrap_generations_wrap_around() {
        let gens = windwrap_generations(40, 8, 16);
        for g in &gens {
            assert_eq!(g.pktid.len(), 16);
            assert!(g.pktid.iter().all(|&idx| idx < 40));
        }
    }

    #[test]
    fn rand_generations_have_no_duplicates() {
        let gens = rand_generations(40, 8, 16, 7);
        for g in &gens {
            let set: HashSet<_> = g.pktid.iter().collect();
            assert_eq!(set.len(), g.pktid.len());
        }
    }

    #[test]
    fn rand_generations_are_reproducible_from_seed() {
        let a = rand_generations(40, 8, 16, 7);
        let b = rand_generations(40, 8, 16, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn pseudorand_generation_members_are_unique_and_in_range() {
        let m = 80;
        let size_b = 16;
        let size_g = 20;
        let gnum = ceil_div(m - size_g, size_b) + 1;
        let magic_x = (size_b as i64 + gnum as i64 - size_g as i64).min(7);
        let gens = pseudorand_generations(m, size_b, size_g, magic_x);
        for g in &gens {
            assert_eq!(g.pktid.len(), size_g);
            let set: HashSet<_> = g.pktid.iter().collect();
            assert_eq!(set.len(), g.pktid.len());
            assert!(g.pktid.iter().all(|&idx| idx < m));
        }
    }

    #[test]
    fn pseudorand_generations_are_reproducible() {
        let m = 80;
        let size_b = 16;
        let size_g = 20;
        let gnum = ceil_div(m - size_g, size_b) + 1;
        let magic_x = (size_b as i64 + gnum as i64 - size_g as i64).min(7);
        let a = pseudorand_generations(m, size_b, size_g, magic_x);
        let b = pseudorand_generations(m, size_b, size_g, magic_x);
        assert_eq!(a, b);
    }

    #[test]
    fn pseudorand_tail_slots_borrow_from_other_generations() {
        // Beyond the first size_b slots, membership is mixed in from other
        // generations rather than continuing the same contiguous band.
        let m = 200;
        let size_b = 8;
        let size_g = 40;
        let gnum = ceil_div(m - size_g, size_b) + 1;
        let magic_x = (size_b as i64 + gnum as i64 - size_g as i64).min(7);
        let gens = pseudorand_generations(m, size_b, size_g, magic_x);
        let g = &gens[2];
        let band_extended: Vec<usize> = (0..size_g).map(|j| (2 * size_b + j) % m).collect();
        assert_ne!(g.pktid, band_extended);
    }

    #[test]
    fn bats_sampler_yields_distinct_members_per_batch() {
        let params = Params {
            datasize: 1024,
            size_p: 64,
            size_c: 0,
            size_b: 8,
            size_g: 16,
            grouping: GroupingKind::Bats,
            gfpower: 8,
            bpc: false,
            sys: false,
            seed: 3,
            precode: crate::config::PrecodeKind::Ldpc,
        };
        let mut sampler = BatsSampler::new(&params);
        for _ in 0..BALLOC + 3 {
            let batch = sampler.next_batch();
            let set: HashSet<_> = batch.pktid.iter().collect();
            assert_eq!(set.len(), batch.pktid.len());
        }
    }
}
