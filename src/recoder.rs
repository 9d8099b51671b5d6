//! Recoder (§4.5): buffers coded packets per generation and re-emits fresh
//! linear combinations of them without decoding.

use crate::config::Params;
use crate::error::SncError;
use crate::gf;
use crate::packet::{CodedPacket, PacketKind};
use crate::scheduler::{self, RecodeSchedule};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub struct Recoder {
    params: Params,
    bufsize: usize,
    /// One FIFO per generation; `nc[gid]` is implicit in
    /// `buffers[gid].len()`.
    buffers: Vec<VecDeque<CodedPacket>>,
    nsched: Vec<usize>,
    schedule: RecodeSchedule,
    rng: StdRng,
}

impl Recoder {
    pub fn new(params: Params, gnum: usize, bufsize: usize, schedule: RecodeSchedule) -> Self {
        Recoder {
            rng: StdRng::seed_from_u64(params.seed as u64 ^ 0x5eed),
            params,
            bufsize,
            buffers: (0..gnum).map(|_| VecDeque::with_capacity(bufsize)).collect(),
            nsched: vec![0; gnum],
            schedule,
        }
    }

    /// Buffers a received packet. Only coded (non-systematic) packets
    /// participate in recoding; a systematic packet is rejected as
    /// `InvalidPacket` rather than silently dropped.
    pub fn buffer_packet(&mut self, pkt: CodedPacket) -> Result<(), SncError> {
        let gid = match pkt.kind {
            PacketKind::Coded { gid } => gid,
            PacketKind::Systematic { .. } => {
                return Err(SncError::InvalidPacket(
                    "recoder only buffers coded packets".into(),
                ))
            }
        };
        let buf = self
            .buffers
            .get_mut(gid)
            .ok_or_else(|| SncError::InvalidPacket(format!("gid {gid} out of range")))?;
        if buf.len() == self.bufsize {
            buf.pop_front();
            log::trace!("recoder buffer full for gid={gid}, evicting oldest");
        }
        buf.push_back(pkt);
        Ok(())
    }

    /// Generates a recoded packet: `Σ c_k · pkt_k` over all buffered
    /// packets of a scheduled generation, with fresh random `c_k`. Returns
    /// `None` when the scheduling policy finds nothing to send (only
    /// possible for `RAND_SCHED`/`MLPI_SCHED` against an empty buffer set).
    pub fn generate_recoded_packet(&mut self) -> Result<Option<CodedPacket>, SncError> {
        let nc: Vec<usize> = self.buffers.iter().map(|b| b.len()).collect();
        let gid = match scheduler::schedule_recode_generation(
            self.schedule,
            &nc,
            &self.nsched,
            &mut self.rng,
        ) {
            Some(gid) => gid,
            None => return Ok(None),
        };

        if self.buffers[gid].is_empty() {
            return Ok(None);
        }

        let gfpower = self.params.gfpower;
        let size_g = self.params.size_g;
        let n_syms = self.params.size_p * 8 / gfpower as usize;
        let order: u32 = 1 << gfpower;

        let mut coes = vec![0u8; gf::packed_len(size_g, gfpower)];
        let mut syms = vec![0u8; self.params.size_p];

        for pkt in self.buffers[gid].iter() {
            let c = self.rng.gen_range(0..order) as u16;
            if c == 0 {
                continue;
            }
            gf::multiply_add_region(&mut syms, &pkt.syms, c, n_syms, gfpower)?;
            gf::multiply_add_region(&mut coes, &pkt.coes, c, size_g, gfpower)?;
        }

        self.nsched[gid] += 1;
        Ok(Some(CodedPacket::new_coded(gid, coes, syms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupingKind, PrecodeKind};

    fn params() -> Params {
        Params {
            datasize: 10240,
            size_p: 128,
            size_c: 0,
            size_b: 16,
            size_g: 32,
            grouping: GroupingKind::Band,
            gfpower: 8,
            bpc: false,
            sys: false,
            seed: 1,
            precode: PrecodeKind::Ldpc,
        }
    }

    #[test]
    fn buffering_overwrites_oldest_when_full() {
        let p = params();
        let mut recoder = Recoder::new(p.clone(), 4, 2, RecodeSchedule::Triv);
        for i in 0..3u8 {
            let pkt = CodedPacket::new_coded(0, vec![0u8; 4], vec![i; p.size_p]);
            recoder.buffer_packet(pkt).unwrap();
        }
        assert_eq!(recoder.buffers[0].len(), 2);
        assert_eq!(recoder.buffers[0][0].syms[0], 1);
    }

    #[test]
    fn rejects_systematic_packets() {
        let p = params();
        let mut recoder = Recoder::new(p.clone(), 4, 2, RecodeSchedule::Triv);
        let pkt = CodedPacket::new_systematic(0, vec![0u8; p.size_p]);
        assert!(recoder.buffer_packet(pkt).is_err());
    }

    #[test]
    fn rand_sched_returns_none_until_buffered() {
        let p = params();
        let mut recoder = Recoder::new(p, 4, 2, RecodeSchedule::Rand);
        assert!(recoder.generate_recoded_packet().unwrap().is_none());
    }
}
