//! Encoder (§4.4): holds the source-and-parity array and a generation
//! table, emits coded (or systematic) packets on demand.

use crate::config::{EnvOverrides, GroupingKind, Params};
use crate::error::SncError;
use crate::generation::{self, BatsSampler, Generation};
use crate::gf;
use crate::optimize::MemoryPool;
use crate::packet::CodedPacket;
use crate::precode::PrecodeGraph;
use crate::scheduler::{self, EncodeSchedule};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How many scratch payload buffers the encoder keeps warm in its pool.
const POOL_CAPACITY: usize = 4;

enum GenerationTable {
    Bounded(Vec<Generation>),
    Bats(BatsSampler),
}

pub struct Encoder {
    params: Params,
    pp: Vec<Vec<u8>>,
    generations: GenerationTable,
    schedule: EncodeSchedule,
    rng: StdRng,
    count: usize,
    /// BATS: index into the current batch, reset every `size_b` emissions.
    batsent: usize,
    current_batch: Option<Generation>,
    /// Scratch payload buffers for `emit()`'s accumulation step; a fresh,
    /// independently-owned `Vec` is still what the caller receives in the
    /// packet (§5 ownership: a produced packet is moved to the caller).
    pool: MemoryPool,
}

impl Encoder {
    /// Builds an encoder over `data`, zero-padding the final source packet
    /// to `size_p` bytes, precoding it, and materializing the generation
    /// table.
    pub fn from_data(data: &[u8], params: Params) -> Result<Self, SncError> {
        let params = params.resolve()?;
        if data.len() > params.datasize {
            return Err(SncError::InvalidParameter(
                "data longer than params.datasize".into(),
            ));
        }

        let snum = params.snum();
        let cnum = params.cnum();
        let mut pp: Vec<Vec<u8>> = Vec::with_capacity(snum + cnum);
        for i in 0..snum {
            let start = i * params.size_p;
            let end = std::cmp::min(start + params.size_p, data.len());
            let mut row = vec![0u8; params.size_p];
            if start < data.len() {
                row[..end - start].copy_from_slice(&data[start..end]);
            }
            pp.push(row);
        }
        for _ in 0..cnum {
            pp.push(vec![0u8; params.size_p]);
        }

        let graph = PrecodeGraph::build(&params)?;
        graph.encode_parities(&mut pp, params.gfpower)?;

        let generations = if params.grouping == GroupingKind::Bats {
            GenerationTable::Bats(BatsSampler::new(&params))
        } else {
            GenerationTable::Bounded(generation::build(&params)?)
        };

        let overrides = EnvOverrides::read();
        let schedule = if overrides.nonuniform_rand && params.grouping == GroupingKind::Band {
            EncodeSchedule::NonUniformBanded
        } else {
            EncodeSchedule::Uniform
        };

        info!(
            "encoder session: snum={} cnum={} size_g={} size_b={} type={:?} gfpower={}",
            snum, cnum, params.size_g, params.size_b, params.grouping, params.gfpower
        );

        let pool = MemoryPool::new(POOL_CAPACITY, params.size_p);

        Ok(Encoder {
            rng: StdRng::seed_from_u64(params.seed as u64),
            params,
            pp,
            generations,
            schedule,
            count: 0,
            batsent: 0,
            current_batch: None,
            pool,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Total packets emitted so far.
    pub fn count(&self) -> usize {
        self.count
    }

    fn pick_generation(&mut self) -> &Generation {
        match &mut self.generations {
            GenerationTable::Bounded(gens) => {
                let gid = scheduler::pick_gid(self.schedule, gens.len(), self.params.size_g, &mut self.rng);
                &gens[gid]
            }
            GenerationTable::Bats(sampler) => {
                if self.current_batch.is_none() || self.batsent == self.params.size_b {
                    self.current_batch = Some(sampler.next_batch());
                    self.batsent = 0;
                }
                self.batsent += 1;
                self.current_batch.as_ref().unwrap()
            }
        }
    }

    /// Emits the next packet. Systematic source packets are emitted first
    /// (uncoded) when `sys`, then the encoder switches to coded emission
    /// for every subsequent call — and forever for BATS/non-systematic
    /// codes (§4.4).
    pub fn emit(&mut self) -> Result<CodedPacket, SncError> {
        if self.params.sys && self.count < self.params.snum() {
            let ucid = self.count;
            let syms = self.pp[ucid].clone();
            self.count += 1;
            trace!("emit systematic ucid={ucid}");
            return Ok(CodedPacket::new_systematic(ucid, syms));
        }

        let gfpower = self.params.gfpower;
        let n_elems = self.params.size_p * 8 / gfpower as usize;
        let size_g = self.params.size_g;
        let order: u32 = 1 << gfpower;

        let generation = self.pick_generation();
        let gid = generation.gid;
        let pktid = generation.pktid.clone();

        let mut coes = vec![0u8; gf::packed_len(size_g, gfpower)];
        let mut scratch = self.pool.alloc();

        for (i, &src) in pktid.iter().enumerate() {
            let c = self.rng.gen_range(0..order) as u16;
            gf::write_elem(&mut coes, i, gfpower, c);
            if c != 0 {
                gf::multiply_add_region(&mut scratch, &self.pp[src], c, n_elems, gfpower)?;
            }
        }

        let syms = scratch.to_vec();
        self.pool.free(scratch);

        self.count += 1;
        debug!("emit coded gid={gid} count={}", self.count);
        Ok(CodedPacket::new_coded(gid, coes, syms))
    }
}
