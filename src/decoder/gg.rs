//! GG decoder (§4.7): per-generation dense Gaussian elimination, followed
//! by belief propagation over the precode graph.

use crate::config::Params;
use crate::decoder::{Decoder, ProcessOutcome};
use crate::error::SncError;
use crate::generation::{self, Generation};
use crate::gf;
use crate::linalg::{self, OpCounter};
use crate::packet::{CodedPacket, PacketKind};
use crate::precode::PrecodeGraph;

struct GenBuffer {
    rows_a: Vec<Vec<u16>>,
    rows_b: Vec<Vec<u8>>,
}

impl GenBuffer {
    fn new() -> Self {
        GenBuffer {
            rows_a: Vec::new(),
            rows_b: Vec::new(),
        }
    }
}

pub struct GgDecoder {
    params: Params,
    generations: Vec<Generation>,
    precode: PrecodeGraph,
    buffers: Vec<GenBuffer>,
    solved: Vec<bool>,
    pp: Vec<Option<Vec<u8>>>,
    received: usize,
    ops: OpCounter,
}

impl GgDecoder {
    pub fn new(params: Params) -> Result<Self, SncError> {
        let params = params.resolve()?;
        let generations = generation::build(&params)?;
        let precode = PrecodeGraph::build(&params)?;
        let pktnum = params.pktnum();
        Ok(GgDecoder {
            buffers: (0..generations.len()).map(|_| GenBuffer::new()).collect(),
            solved: vec![false; generations.len()],
            pp: vec![None; pktnum],
            generations,
            precode,
            received: 0,
            ops: OpCounter::default(),
            params,
        })
    }

    fn n_syms(&self) -> usize {
        self.params.size_p * 8 / self.params.gfpower as usize
    }

    fn try_solve_generation(&mut self, gid: usize) -> Result<(), SncError> {
        if self.solved[gid] {
            return Ok(());
        }
        let size_g = self.params.size_g;
        let buf = &self.buffers[gid];
        if buf.rows_a.len() < size_g {
            return Ok(());
        }

        let mut a = buf.rows_a.clone();
        let mut b = buf.rows_b.clone();
        let n_syms = self.n_syms();
        let gfpower = self.params.gfpower;

        linalg::forward_substitute(&mut a, &mut b, n_syms, gfpower, &mut self.ops)?;
        let full_rank = (0..size_g).all(|i| a[i][i] != 0);
        if !full_rank {
            return Ok(());
        }
        a.truncate(size_g);
        b.truncate(size_g);
        linalg::back_substitute(&mut a, &mut b, n_syms, gfpower, &mut self.ops)?;

        let pktid = self.generations[gid].pktid.clone();
        for (i, &idx) in pktid.iter().enumerate() {
            if self.pp[idx].is_none() {
                self.pp[idx] = Some(b[i].clone());
            }
        }
        self.solved[gid] = true;
        Ok(())
    }

    fn belief_propagate(&mut self) -> Result<(), SncError> {
        if self.params.cnum() == 0 {
            return Ok(());
        }
        let n_syms = self.n_syms();
        let gfpower = self.params.gfpower;
        let snum = self.params.snum();
        loop {
            let mut progressed = false;
            for i in 0..self.precode.parity_edges.len() {
                let parity_idx = snum + i;
                let parity_val = match &self.pp[parity_idx] {
                    Some(v) => v.clone(),
                    None => continue,
                };
                let edges = self.precode.parity_edges[i].clone();
                let unknowns: Vec<(usize, u16)> = edges
                    .iter()
                    .copied()
                    .filter(|&(s, _)| self.pp[s].is_none())
                    .collect();
                if unknowns.len() != 1 {
                    continue;
                }
                let (unknown_src, coef) = unknowns[0];
                let mut acc = parity_val;
                for &(s, c) in &edges {
                    if s == unknown_src {
                        continue;
                    }
                    if let Some(val) = &self.pp[s] {
                        gf::multiply_add_region(&mut acc, val, c, n_syms, gfpower)?;
                    }
                }
                let inv = gf::inverse(coef, gfpower)?;
                gf::multiply_region(&mut acc, inv, n_syms, gfpower)?;
                self.pp[unknown_src] = Some(acc);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        Ok(())
    }

    fn all_solved(&self) -> bool {
        (0..self.params.snum()).all(|i| self.pp[i].is_some())
    }
}

impl Decoder for GgDecoder {
    fn process_packet(&mut self, pkt: CodedPacket) -> Result<ProcessOutcome, SncError> {
        self.received += 1;
        pkt.validate_shape(&self.params)?;
        match pkt.kind {
            PacketKind::Systematic { ucid } => {
                if ucid >= self.pp.len() {
                    return Err(SncError::InvalidPacket("ucid out of range".into()));
                }
                if self.pp[ucid].is_none() {
                    self.pp[ucid] = Some(pkt.syms);
                }
            }
            PacketKind::Coded { gid } => {
                if gid >= self.generations.len() {
                    return Err(SncError::InvalidPacket("gid out of range".into()));
                }
                if !self.solved[gid] {
                    let gfpower = self.params.gfpower;
                    let size_g = self.params.size_g;
                    let mut row = vec![0u16; size_g];
                    for i in 0..size_g {
                        row[i] = gf::read_elem(&pkt.coes, i, gfpower);
                    }
                    let buf = &mut self.buffers[gid];
                    buf.rows_a.push(row);
                    buf.rows_b.push(pkt.syms);
                    // bound memory: drop the oldest once well past full rank
                    if buf.rows_a.len() > size_g * 2 {
                        buf.rows_a.remove(0);
                        buf.rows_b.remove(0);
                    }
                }
                self.try_solve_generation(gid)?;
            }
        }

        if self.solved.iter().all(|&s| s) {
            self.belief_propagate()?;
        }

        if self.all_solved() {
            log::info!(
                "GG finished: received={} overhead={}",
                self.received,
                self.received.saturating_sub(self.params.snum())
            );
            Ok(ProcessOutcome::Finished)
        } else {
            Ok(ProcessOutcome::Continue)
        }
    }

    fn finished(&self) -> bool {
        self.all_solved()
    }

    fn overhead(&self) -> usize {
        self.received.saturating_sub(self.params.snum())
    }

    fn operations(&self) -> u64 {
        self.ops.0
    }

    fn recover(&self) -> Result<Vec<u8>, SncError> {
        if !self.finished() {
            return Err(SncError::NotReady("decoder has not finished".into()));
        }
        let mut out = Vec::with_capacity(self.params.datasize);
        for i in 0..self.params.snum() {
            let row = self.pp[i].as_ref().expect("solved");
            out.extend_from_slice(row);
        }
        out.truncate(self.params.datasize);
        Ok(out)
    }
}
