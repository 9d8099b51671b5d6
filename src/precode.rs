//! Bipartite precode graph: LDPC/HDPC-style parity over the source packets
//! (§4.2). Uses a uniform small-degree distribution for LDPC, a denser
//! fixed degree for HDPC, switched by `SNC_PRECODE` (§6).

use crate::config::{Params, PrecodeKind};
use crate::error::SncError;
use crate::gf;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// `snum` source nodes on the left, `cnum` parity nodes on the right. Each
/// parity node's adjacency list carries the source index and the edge's
/// field coefficient (always 1 when `bpc`).
#[derive(Debug, Clone)]
pub struct PrecodeGraph {
    pub snum: usize,
    pub cnum: usize,
    /// `parity_edges[i]` lists `(source_index, coefficient)` for parity `i`.
    pub parity_edges: Vec<Vec<(usize, u16)>>,
    /// `source_edges[s]` lists the parity indices touching source `s`.
    pub source_edges: Vec<Vec<usize>>,
}

impl PrecodeGraph {
    /// Builds the graph deterministically from `params.seed`. Returns an
    /// empty graph (no edges) when `cnum == 0`, matching "0 disables
    /// precoding" (§3).
    pub fn build(params: &Params) -> Result<Self, SncError> {
        let snum = params.snum();
        let cnum = params.cnum();
        let mut parity_edges = vec![Vec::new(); cnum];
        let mut source_edges = vec![Vec::new(); snum];
        if cnum == 0 || snum == 0 {
            return Ok(PrecodeGraph {
                snum,
                cnum,
                parity_edges,
                source_edges,
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed as u64);
        let order = 1u32 << params.gfpower;

        for p in 0..cnum {
            let degree = match params.precode {
                PrecodeKind::Ldpc => rng.gen_range(2..=4).min(snum),
                PrecodeKind::Hdpc => (snum / 2).max(3).min(snum),
            };
            let chosen = sample(&mut rng, snum, degree);
            for src in chosen.iter() {
                let coef = if params.bpc {
                    1u16
                } else {
                    loop {
                        let c = rng.gen_range(1..order) as u16;
                        if c != 0 {
                            break c;
                        }
                    }
                };
                parity_edges[p].push((src, coef));
                source_edges[src].push(p);
            }
        }

        Ok(PrecodeGraph {
            snum,
            cnum,
            parity_edges,
            source_edges,
        })
    }

    /// Computes `pp[snum+i] = sum_{s in N(i)} coef(i,s) * pp[s]` for every
    /// parity `i`, in place. `pp` must hold `snum + cnum` entries, each
    /// `size_p` bytes. Parity rows are independent, so they're folded in
    /// parallel across `cnum`, since independent row-wise region kernels
    /// parallelize cleanly with rayon.
    pub fn encode_parities(&self, pp: &mut [Vec<u8>], gfpower: u8) -> Result<(), SncError> {
        if self.cnum == 0 {
            return Ok(());
        }
        let (sources, parities) = pp.split_at_mut(self.snum);
        let n_elems = if parities.is_empty() {
            0
        } else {
            parities[0].len() * 8 / gfpower as usize
        };
        parities
            .par_iter_mut()
            .zip(self.parity_edges.par_iter())
            .try_for_each(|(parity_buf, edges)| -> Result<(), SncError> {
                for b in parity_buf.iter_mut() {
                    *b = 0;
                }
                for &(src, coef) in edges {
                    gf::multiply_add_region(parity_buf, &sources[src], coef, n_elems, gfpower)?;
                }
                Ok(())
            })
    }
}
