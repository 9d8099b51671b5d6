//! Coded packet shape, lifecycle, and wire framing (§3, §6).

use crate::config::Params;
use crate::error::SncError;
use crate::gf;

/// Distinguishes a linear combination from a systematic (uncoded) packet.
/// Replaces the `gid`/`ucid` sentinel pair of the original with a sum type,
/// per the REDESIGN FLAGS in §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Coded { gid: usize },
    Systematic { ucid: usize },
}

/// A coded (or systematic) packet. Move-only by virtue of ordinary Rust
/// ownership: there is no pool handle on the packet itself, only on the
/// scratch buffers the encoder/recoder use while building one (see
/// `crate::optimize::MemoryPool`). Once built, the packet is a plain,
/// independently-owned value the caller is free to send, clone, or drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedPacket {
    pub kind: PacketKind,
    /// Packed `gfpower`-bit coefficients, one per generation slot. Empty
    /// for systematic packets.
    pub coes: Vec<u8>,
    /// `size_p` raw payload bytes.
    pub syms: Vec<u8>,
}

impl CodedPacket {
    pub fn new_coded(gid: usize, coes: Vec<u8>, syms: Vec<u8>) -> Self {
        CodedPacket {
            kind: PacketKind::Coded { gid },
            coes,
            syms,
        }
    }

    pub fn new_systematic(ucid: usize, syms: Vec<u8>) -> Self {
        CodedPacket {
            kind: PacketKind::Systematic { ucid },
            coes: Vec::new(),
            syms,
        }
    }

    pub fn is_systematic(&self) -> bool {
        matches!(self.kind, PacketKind::Systematic { .. })
    }

    /// Checks `coes`/`syms` are sized as `params` expects. `decode_from`
    /// enforces this on the wire path; a decoder must call this itself for
    /// packets built directly via `new_coded`/`new_systematic` (e.g. by a
    /// recoder, or a caller holding a packet in memory) before indexing
    /// into them, per §7's "coes/syms missing" `InvalidPacket` case.
    pub fn validate_shape(&self, params: &Params) -> Result<(), SncError> {
        if self.syms.len() != params.size_p {
            return Err(SncError::InvalidPacket("syms length mismatch".into()));
        }
        if matches!(self.kind, PacketKind::Coded { .. }) {
            let expected = gf::packed_len(params.size_g, params.gfpower);
            if self.coes.len() != expected {
                return Err(SncError::InvalidPacket("coes length mismatch".into()));
            }
        }
        Ok(())
    }

    /// True when the code is a single-generation non-systematic RLNC, the
    /// one case where `gid` carries no information and is dropped from the
    /// wire layout (§6).
    fn omits_gid(params: &Params) -> bool {
        let pktnum = params.pktnum();
        params.size_g == pktnum && params.size_b == params.size_g && !params.sys
    }

    /// Size in bytes this packet occupies on the wire under `params`.
    pub fn wire_len(&self, params: &Params) -> usize {
        let mut len = 0;
        if !(matches!(self.kind, PacketKind::Coded { .. }) && Self::omits_gid(params)) {
            len += 4;
        }
        if self.is_systematic() {
            len += 4;
        }
        if matches!(self.kind, PacketKind::Coded { .. }) {
            len += gf::packed_len(params.size_g, params.gfpower);
        }
        len += params.size_p;
        len
    }

    /// Encodes the packet into `buf`, returning the number of bytes
    /// written. `buf` must be at least `wire_len(params)` bytes.
    pub fn encode_into(&self, buf: &mut [u8], params: &Params) -> Result<usize, SncError> {
        if buf.len() < self.wire_len(params) {
            return Err(SncError::InvalidPacket("buffer too short".into()));
        }
        let mut offset = 0;
        let omit_gid = matches!(self.kind, PacketKind::Coded { .. }) && Self::omits_gid(params);

        match self.kind {
            PacketKind::Coded { gid } => {
                if !omit_gid {
                    buf[offset..offset + 4].copy_from_slice(&(gid as i32).to_le_bytes());
                    offset += 4;
                }
            }
            PacketKind::Systematic { ucid } => {
                buf[offset..offset + 4].copy_from_slice(&(-1i32).to_le_bytes());
                offset += 4;
                buf[offset..offset + 4].copy_from_slice(&(ucid as i32).to_le_bytes());
                offset += 4;
            }
        }

        if matches!(self.kind, PacketKind::Coded { .. }) {
            let coe_len = gf::packed_len(params.size_g, params.gfpower);
            buf[offset..offset + coe_len].copy_from_slice(&self.coes[..coe_len]);
            offset += coe_len;
        }

        buf[offset..offset + params.size_p].copy_from_slice(&self.syms[..params.size_p]);
        offset += params.size_p;
        Ok(offset)
    }

    /// Decodes a packet from `buf`. Mirrors `encode_into`.
    pub fn decode_from(buf: &[u8], params: &Params) -> Result<Self, SncError> {
        let mut offset = 0;
        let omit_gid = Self::omits_gid(params);

        let raw_gid = if omit_gid {
            None
        } else {
            if buf.len() < offset + 4 {
                return Err(SncError::InvalidPacket("truncated gid".into()));
            }
            let gid = i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
            offset += 4;
            Some(gid)
        };

        let kind = if raw_gid == Some(-1) {
            if buf.len() < offset + 4 {
                return Err(SncError::InvalidPacket("truncated ucid".into()));
            }
            let ucid = i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
            offset += 4;
            if ucid < 0 {
                return Err(SncError::InvalidPacket("negative ucid".into()));
            }
            PacketKind::Systematic {
                ucid: ucid as usize,
            }
        } else {
            let gid = raw_gid.unwrap_or(0);
            if gid < 0 {
                return Err(SncError::InvalidPacket("negative gid".into()));
            }
            PacketKind::Coded { gid: gid as usize }
        };

        let coes = if matches!(kind, PacketKind::Coded { .. }) {
            let coe_len = gf::packed_len(params.size_g, params.gfpower);
            if buf.len() < offset + coe_len {
                return Err(SncError::InvalidPacket("truncated coes".into()));
            }
            let c = buf[offset..offset + coe_len].to_vec();
            offset += coe_len;
            c
        } else {
            Vec::new()
        };

        if buf.len() < offset + params.size_p {
            return Err(SncError::InvalidPacket("truncated syms".into()));
        }
        let syms = buf[offset..offset + params.size_p].to_vec();

        Ok(CodedPacket { kind, coes, syms })
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
            grouping: GroupingKind::Rand,
            gfpower: 8,
            bpc: false,
            sys: true,
            seed: 1,
            precode: PrecodeKind::Ldpc,
        }
    }

    #[test]
    fn coded_packet_round_trips() {
        let p = params();
        let coes = vec![3u8; gf::packed_len(p.size_g, p.gfpower)];
        let syms = vec![7u8; p.size_p];
        let pkt = CodedPacket::new_coded(4, coes, syms);
        let mut buf = vec![0u8; pkt.wire_len(&p)];
        pkt.encode_into(&mut buf, &p).unwrap();
        let back = CodedPacket::decode_from(&buf, &p).unwrap();
        assert_eq!(pkt, back);
    }

    #[test]
    fn systematic_packet_round_trips() {
        let p = params();
        let syms = vec![9u8; p.size_p];
        let pkt = CodedPacket::new_systematic(2, syms);
        let mut buf = vec![0u8; pkt.wire_len(&p)];
        pkt.encode_into(&mut buf, &p).unwrap();
        let back = CodedPacket::decode_from(&buf, &p).unwrap();
        assert_eq!(pkt, back);
    }

    #[test]
    fn wire_bytes_match_known_hex_fixture() {
        // size_g == pktnum and size_b == size_g, so the gid is omitted from
        // the frame (§6): the wire is just the packed coefficients followed
        // by the payload, back to back.
        let mut p = params();
        p.sys = false;
        p.size_c = 0;
        p.datasize = 16;
        p.size_p = 4;
        p.size_g = p.pktnum();
        p.size_b = p.size_g;
        let coes = vec![1u8, 2, 3, 4];
        let syms = vec![5u8, 6, 7, 8];
        let pkt = CodedPacket::new_coded(0, coes, syms);
        let mut buf = vec![0u8; pkt.wire_len(&p)];
        pkt.encode_into(&mut buf, &p).unwrap();
        assert_eq!(hex::encode(&buf), "0102030405060708");
    }

    #[test]
    fn single_generation_nonsystematic_omits_gid() {
        let mut p = params();
        p.sys = false;
        p.size_c = 0;
        p.size_g = p.pktnum();
        p.size_b = p.size_g;
        let coes = vec![1u8; gf::packed_len(p.size_g, p.gfpower)];
        let syms = vec![5u8; p.size_p];
        let pkt = CodedPacket::new_coded(0, coes, syms);
        assert_eq!(pkt.wire_len(&p), gf::packed_len(p.size_g, p.gfpower) + p.size_p);
    }

    #[test]
    fn validate_shape_rejects_undersized_coes() {
        let p = params();
        let coes = vec![1u8; gf::packed_len(p.size_g, p.gfpower) - 1];
        let syms = vec![5u8; p.size_p];
        let pkt = CodedPacket::new_coded(0, coes, syms);
        assert!(pkt.validate_shape(&p).is_err());
    }

    #[test]
    fn validate_shape_rejects_undersized_syms() {
        let p = params();
        let syms = vec![5u8; p.size_p - 1];
        let pkt = CodedPacket::new_systematic(0, syms);
        assert!(pkt.validate_shape(&p).is_err());
    }

    #[test]
    fn validate_shape_accepts_well_formed_packet() {
        let p = params();
        let coes = vec![1u8; gf::packed_len(p.size_g, p.gfpower)];
        let syms = vec![5u8; p.size_p];
        let pkt = CodedPacket::new_coded(0, coes, syms);
        assert!(pkt.validate_shape(&p).is_ok());
    }
}
