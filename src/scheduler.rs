//! Generation-id scheduling: which generation the encoder draws from next
//! (§4.3), and which buffered generation the recoder re-emits from (§4.5).

use crate::error::SncError;
use rand::rngs::StdRng;
use rand::Rng;

/// Encoder-side scheduling policy. `SNC_NONUNIFORM_RAND=1` selects
/// `NonUniformBanded` for BAND codes (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeSchedule {
    Uniform,
    NonUniformBanded,
}

/// Per-generation draw weights for the non-uniform banded scheduler: the
/// two boundary generations get weight `size_g + 1`, interior generations
/// get weight `2`, producing the `[G+1, 2, 2, ..., 2, G+1]` sequence of §4.3.
pub fn banded_nonuniform_weights(gnum: usize, size_g: usize) -> Vec<usize> {
    let mut weights = vec![2usize; gnum];
    if let Some(first) = weights.first_mut() {
        *first = size_g + 1;
    }
    if gnum > 1 {
        if let Some(last) = weights.last_mut() {
            *last = size_g + 1;
        }
    }
    weights
}

/// Picks a generation id according to `schedule`.
pub fn pick_gid(
    schedule: EncodeSchedule,
    gnum: usize,
    size_g: usize,
    rng: &mut StdRng,
) -> usize {
    match schedule {
        EncodeSchedule::Uniform => rng.gen_range(0..gnum),
        EncodeSchedule::NonUniformBanded => {
            let weights = banded_nonuniform_weights(gnum, size_g);
            let total: usize = weights.iter().sum();
            let mut draw = rng.gen_range(0..total);
            for (i, &w) in weights.iter().enumerate() {
                if draw < w {
                    return i;
                }
                draw -= w;
            }
            gnum - 1
        }
    }
}

/// Recoder re-emission policy (§4.5). A closed enum: unlike the original
/// `sched_t` switch, which has no default branch and falls through
/// undefined on an unrecognized value, this is exhaustively matched and
/// unknown *input strings* are rejected before ever reaching a
/// `RecodeSchedule` value (see `RecodeSchedule::parse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecodeSchedule {
    Triv,
    Rand,
    Mlpi,
}

impl RecodeSchedule {
    pub fn parse(s: &str) -> Result<Self, SncError> {
        match s {
            "TRIV_SCHED" => Ok(RecodeSchedule::Triv),
            "RAND_SCHED" => Ok(RecodeSchedule::Rand),
            "MLPI_SCHED" => Ok(RecodeSchedule::Mlpi),
            other => Err(SncError::InvalidParameter(format!(
                "unknown recode schedule: {other}"
            ))),
        }
    }
}

/// Chooses which buffered generation the recoder should re-emit from next.
/// Returns `None` when no generation currently has buffered packets.
pub fn schedule_recode_generation(
    schedule: RecodeSchedule,
    nc: &[usize],
    nsched: &[usize],
    rng: &mut StdRng,
) -> Option<usize> {
    match schedule {
        RecodeSchedule::Triv => {
            if nc.is_empty() {
                None
            } else {
                Some(rng.gen_range(0..nc.len()))
            }
        }
        RecodeSchedule::Rand => {
            let candidates: Vec<usize> = (0..nc.len()).filter(|&i| nc[i] > 0).collect();
            if candidates.is_empty() {
                None
            } else {
                Some(candidates[rng.gen_range(0..candidates.len())])
            }
        }
        RecodeSchedule::Mlpi => (0..nc.len()).max_by_key(|&i| nc[i] as i64 - nsched[i] as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn unknown_schedule_string_is_rejected() {
        assert!(RecodeSchedule::parse("WAT_SCHED").is_err());
    }

    #[test]
    fn rand_sched_returns_none_when_buffers_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let nc = vec![0, 0, 0];
        let nsched = vec![0, 0, 0];
        assert_eq!(
            schedule_recode_generation(RecodeSchedule::Rand, &nc, &nsched, &mut rng),
            None
        );
    }

    #[test]
    fn mlpi_sched_picks_max_backlog() {
        let mut rng = StdRng::seed_from_u64(1);
        let nc = vec![3, 10, 4];
        let nsched = vec![0, 2, 0];
        assert_eq!(
            schedule_recode_generation(RecodeSchedule::Mlpi, &nc, &nsched, &mut rng),
            Some(1)
        );
    }

    #[test]
    fn nonuniform_weights_favor_boundary_generations() {
        let w = banded_nonuniform_weights(5, 31);
        assert_eq!(w, vec![32, 2, 2, 2, 32]);
    }
}
