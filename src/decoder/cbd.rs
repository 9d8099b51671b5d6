//! CBD decoder (§4.6): incremental triangulation of a banded system, in
//! row-compressed form. Applies to BAND-grouped codes, where a received
//! packet's nonzero coefficients fall in a contiguous window.

use crate::config::Params;
use crate::decoder::{Decoder, ProcessOutcome};
use crate::error::SncError;
use crate::generation::{self, Generation};
use crate::gf;
use crate::linalg::OpCounter;
use crate::packet::{CodedPacket, PacketKind};
use log::info;

/// Row `j`'s nonzero leading coefficients, starting at pivot column `j`.
struct Row {
    coefs: Vec<u16>,
    rhs: Vec<u8>,
}

pub struct CbdDecoder {
    params: Params,
    generations: Vec<Generation>,
    m: usize,
    rows: Vec<Option<Row>>,
    recovered: Vec<Option<Vec<u8>>>,
    rank: usize,
    finished: bool,
    received: usize,
    ops: OpCounter,
}

impl CbdDecoder {
    pub fn new(params: Params) -> Result<Self, SncError> {
        let params = params.resolve()?;
        let generations = generation::build(&params)?;
        let m = params.pktnum();
        Ok(CbdDecoder {
            rows: (0..m).map(|_| None).collect(),
            recovered: vec![None; m],
            generations,
            m,
            rank: 0,
            finished: false,
            received: 0,
            ops: OpCounter::default(),
            params,
        })
    }

    fn n_syms(&self) -> usize {
        self.params.size_p * 8 / self.params.gfpower as usize
    }

    /// Expands a packet into its global `(base, coefs, rhs)` triple. BAND
    /// generations select a contiguous window, so `base` is simply the
    /// window's leading index and `coefs` needs no remapping.
    fn expand(&self, pkt: &CodedPacket) -> Result<(usize, Vec<u16>, Vec<u8>), SncError> {
        pkt.validate_shape(&self.params)?;
        match pkt.kind {
            PacketKind::Systematic { ucid } => Ok((ucid, vec![1u16], pkt.syms.clone())),
            PacketKind::Coded { gid } => {
                let gen = self
                    .generations
                    .get(gid)
                    .ok_or_else(|| SncError::InvalidPacket("gid out of range".into()))?;
                let gfpower = self.params.gfpower;
                let size_g = self.params.size_g;
                let coefs: Vec<u16> = (0..size_g).map(|i| gf::read_elem(&pkt.coes, i, gfpower)).collect();
                let base = *gen.pktid.first().ok_or_else(|| {
                    SncError::InvalidPacket("empty generation membership".into())
                })?;
                Ok((base, coefs, pkt.syms.clone()))
            }
        }
    }

    /// Eliminates a packet's (globally-positioned) coefficient vector
    /// against the rows installed so far. A pivot row `j`'s nonzero span
    /// can reach up to `[j, j+size_g)` (§4.6), which may extend past the
    /// right edge of the incoming packet's own `[base, base+size_g)`
    /// window whenever `j > base` — the working `coefs` buffer has to grow
    /// to the right to absorb that, or the cancelled row's tail coefficients
    /// get silently dropped instead of folded in.
    fn eliminate(&mut self, base: usize, mut coefs: Vec<u16>, mut rhs: Vec<u8>) -> Result<(), SncError> {
        let gfpower = self.params.gfpower;
        let n_syms = self.n_syms();
        let max_len = self.m.saturating_sub(base);
        if coefs.len() > max_len {
            coefs.truncate(max_len);
        }

        loop {
            let lead = match coefs.iter().position(|&c| c != 0) {
                Some(l) => l,
                None => return Ok(()), // redundant packet: all-zero combination
            };
            let j = base + lead;

            match &self.rows[j] {
                None => {
                    self.rows[j] = Some(Row {
                        coefs: coefs[lead..].to_vec(),
                        rhs,
                    });
                    self.rank += 1;
                    if self.rank == self.m {
                        self.back_substitute()?;
                        self.finished = true;
                        info!(
                            "CBD finished: received={} overhead={}",
                            self.received,
                            self.received.saturating_sub(self.params.snum())
                        );
                    }
                    return Ok(());
                }
                Some(row) => {
                    let pivot = row.coefs[0];
                    let here = coefs[lead];
                    let q = gf::divide(here, pivot, gfpower)?;
                    let needed = (lead + row.coefs.len()).min(max_len);
                    if needed > coefs.len() {
                        coefs.resize(needed, 0);
                    }
                    for (k, &rc) in row.coefs.iter().enumerate() {
                        let idx = lead + k;
                        if idx >= coefs.len() {
                            break; // column >= m: genuinely out of range, not droppable data
                        }
                        coefs[idx] ^= gf::multiply(q, rc, gfpower);
                    }
                    self.ops.add(row.coefs.len() as u64);
                    gf::multiply_add_region(&mut rhs, &row.rhs, q, n_syms, gfpower)?;
                    self.ops.add(n_syms as u64);
                }
            }
        }
    }

    fn back_substitute(&mut self) -> Result<(), SncError> {
        let gfpower = self.params.gfpower;
        let n_syms = self.n_syms();
        for j in (0..self.m).rev() {
            let row = self.rows[j]
                .as_ref()
                .ok_or_else(|| SncError::NotReady("rank deficient".into()))?;
            let mut rhs = row.rhs.clone();
            for (k, &c) in row.coefs.iter().enumerate().skip(1) {
                let col = j + k;
                if col >= self.m || c == 0 {
                    continue;
                }
                if let Some(val) = &self.recovered[col] {
                    gf::multiply_add_region(&mut rhs, val, c, n_syms, gfpower)?;
                }
            }
            let inv = gf::inverse(row.coefs[0], gfpower)?;
            gf::multiply_region(&mut rhs, inv, n_syms, gfpower)?;
            self.ops.add(n_syms as u64);
            self.recovered[j] = Some(rhs);
        }
        Ok(())
    }
}

impl Decoder for CbdDecoder {
    fn process_packet(&mut self, pkt: CodedPacket) -> Result<ProcessOutcome, SncError> {
        self.received += 1;
        let (base, coefs, rhs) = self.expand(&pkt)?;
        self.eliminate(base, coefs, rhs)?;
        if self.finished {
            Ok(ProcessOutcome::Finished)
        } else {
            Ok(ProcessOutcome::Continue)
        }
    }

    fn finished(&self) -> bool {
        self.finished
    }

    fn overhead(&self) -> usize {
        self.received.saturating_sub(self.params.snum())
    }

    fn operations(&self) -> u64 {
        self.ops.0
    }

    fn recover(&self) -> Result<Vec<u8>, SncError> {
        if !self.finished {
            return Err(SncError::NotReady("decoder has not finished".into()));
        }
        let mut out = Vec::with_capacity(self.params.datasize);
        for i in 0..self.params.snum() {
            let row = self.recovered[i].as_ref().expect("finished implies all rows recovered");
            out.extend_from_slice(row);
        }
        out.truncate(self.params.datasize);
        Ok(out)
    }
}
