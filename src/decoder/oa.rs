//! OA decoder (§4.8): overlap-aware / inactivation decoding for precoded,
//! non-banded codes. Packets accumulate generation by generation; when a
//! row can't be reduced to a single unknown column against already-solved
//! pivots, its remaining columns are *inactivated* — deferred into a
//! small dense system solved once enough such rows have accumulated, via
//! the shared [`crate::linalg`] kernels (§4.8).

use crate::config::Params;
use crate::decoder::{Decoder, ProcessOutcome};
use crate::error::SncError;
use crate::generation::{self, Generation};
use crate::gf;
use crate::linalg::{self, OpCounter};
use crate::packet::{CodedPacket, PacketKind};
use std::collections::{BTreeMap, HashMap};

type SparseRow = BTreeMap<usize, u16>;

pub struct OaDecoder {
    params: Params,
    generations: Vec<Generation>,
    m: usize,
    /// Known values, by global column index.
    resolved: Vec<Option<Vec<u8>>>,
    /// Rows that reduced to more than one unknown column so far.
    pending: Vec<(SparseRow, Vec<u8>)>,
    received: usize,
    ops: OpCounter,
    finished: bool,
}

fn substitute_known(
    resolved: &[Option<Vec<u8>>],
    gfpower: u8,
    n_syms: usize,
    row: &mut SparseRow,
    rhs: &mut Vec<u8>,
) -> Result<(), SncError> {
    let known: Vec<usize> = row
        .keys()
        .copied()
        .filter(|&c| resolved[c].is_some())
        .collect();
    for c in known {
        let coef = row.remove(&c).unwrap();
        if coef == 0 {
            continue;
        }
        if let Some(val) = &resolved[c] {
            gf::multiply_add_region(rhs, val, coef, n_syms, gfpower)?;
        }
    }
    Ok(())
}

impl OaDecoder {
    pub fn new(params: Params) -> Result<Self, SncError> {
        let params = params.resolve()?;
        let generations = generation::build(&params)?;
        let m = params.pktnum();
        Ok(OaDecoder {
            resolved: vec![None; m],
            pending: Vec::new(),
            generations,
            m,
            received: 0,
            ops: OpCounter::default(),
            finished: false,
            params,
        })
    }

    fn n_syms(&self) -> usize {
        self.params.size_p * 8 / self.params.gfpower as usize
    }

    fn expand(&self, pkt: &CodedPacket) -> Result<(SparseRow, Vec<u8>), SncError> {
        pkt.validate_shape(&self.params)?;
        match &pkt.kind {
            PacketKind::Systematic { ucid } => {
                let mut row = SparseRow::new();
                row.insert(*ucid, 1);
                Ok((row, pkt.syms.clone()))
            }
            PacketKind::Coded { gid } => {
                let gen = self
                    .generations
                    .get(*gid)
                    .ok_or_else(|| SncError::InvalidPacket("gid out of range".into()))?;
                let gfpower = self.params.gfpower;
                let mut row = SparseRow::new();
                for (i, &col) in gen.pktid.iter().enumerate() {
                    let c = gf::read_elem(&pkt.coes, i, gfpower);
                    if c != 0 {
                        row.insert(col, c);
                    }
                }
                Ok((row, pkt.syms.clone()))
            }
        }
    }

    /// Drives known-column substitution and singleton promotion to a
    /// fixpoint, then attempts a dense solve over whatever inactivated
    /// columns remain.
    fn settle(&mut self) -> Result<(), SncError> {
        let gfpower = self.params.gfpower;
        let n_syms = self.n_syms();

        loop {
            for (row, rhs) in self.pending.iter_mut() {
                substitute_known(&self.resolved, gfpower, n_syms, row, rhs)?;
            }
            self.pending.retain(|(row, _)| !row.is_empty());

            let singleton = self.pending.iter().position(|(row, _)| row.len() == 1);
            let pos = match singleton {
                Some(p) => p,
                None => break,
            };
            let (row, rhs) = self.pending.remove(pos);
            let (&col, &coef) = row.iter().next().expect("singleton");
            let inv = gf::inverse(coef, gfpower)?;
            let mut val = rhs;
            gf::multiply_region(&mut val, inv, n_syms, gfpower)?;
            self.resolved[col] = Some(val);
        }

        self.try_dense_solve()?;

        if !self.finished && (0..self.m).all(|i| self.resolved[i].is_some()) {
            self.finished = true;
            log::info!(
                "OA finished: received={} overhead={}",
                self.received,
                self.received.saturating_sub(self.params.snum())
            );
        }
        Ok(())
    }

    fn try_dense_solve(&mut self) -> Result<(), SncError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut cols: Vec<usize> = self
            .pending
            .iter()
            .flat_map(|(row, _)| row.keys().copied())
            .collect();
        cols.sort_unstable();
        cols.dedup();
        if self.pending.len() < cols.len() || cols.is_empty() {
            return Ok(());
        }

        let col_index: HashMap<usize, usize> =
            cols.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let mut a: Vec<Vec<u16>> = self
            .pending
            .iter()
            .map(|(row, _)| {
                let mut r = vec![0u16; cols.len()];
                for (&c, &coef) in row.iter() {
                    r[col_index[&c]] = coef;
                }
                r
            })
            .collect();
        let mut b: Vec<Vec<u8>> = self.pending.iter().map(|(_, rhs)| rhs.clone()).collect();

        let gfpower = self.params.gfpower;
        let n_syms = self.n_syms();
        linalg::forward_substitute(&mut a, &mut b, n_syms, gfpower, &mut self.ops)?;
        let full_rank = (0..cols.len()).all(|i| a[i][i] != 0);
        if !full_rank {
            return Ok(());
        }
        a.truncate(cols.len());
        b.truncate(cols.len());
        linalg::back_substitute(&mut a, &mut b, n_syms, gfpower, &mut self.ops)?;

        for (i, &col) in cols.iter().enumerate() {
            self.resolved[col] = Some(b[i].clone());
        }
        self.pending.clear();
        Ok(())
    }
}

impl Decoder for OaDecoder {
    fn process_packet(&mut self, pkt: CodedPacket) -> Result<ProcessOutcome, SncError> {
        self.received += 1;
        let (mut row, mut rhs) = self.expand(&pkt)?;
        let gfpower = self.params.gfpower;
        let n_syms = self.n_syms();
        substitute_known(&self.resolved, gfpower, n_syms, &mut row, &mut rhs)?;

        if !row.is_empty() {
            self.pending.push((row, rhs));
        }
        self.settle()?;

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
            let row = self.resolved[i].as_ref().expect("finished implies resolved");
            out.extend_from_slice(row);
        }
        out.truncate(self.params.datasize);
        Ok(out)
    }
}
