//! Session parameters and the configuration surface around them.
//!
//! A plain data struct, a `from_toml`/`from_file` pair, and a `validate()`
//! pass run once before an encoding or decoding session begins.

use crate::error::SncError;
use serde::Deserialize;
use std::path::Path;

/// Generation-grouping scheme. `Raptor` is reserved: the original source
/// never implements a grouping function for it either, so `Params::validate`
/// rejects it rather than silently falling back to another scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupingKind {
    Rand,
    Band,
    Windwrap,
    Pseudorand,
    Bats,
    Raptor,
}

/// Precode degree distribution. `SNC_PRECODE=HDPC` switches the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrecodeKind {
    Ldpc,
    Hdpc,
}

impl Default for PrecodeKind {
    fn default() -> Self {
        PrecodeKind::Ldpc
    }
}

/// Chunk size for lazily-allocated BATS batches.
pub const BALLOC: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub datasize: usize,
    pub size_p: usize,
    pub size_c: usize,
    pub size_b: usize,
    pub size_g: usize,
    #[serde(rename = "type")]
    pub grouping: GroupingKind,
    pub gfpower: u8,
    pub bpc: bool,
    pub sys: bool,
    /// -1 derives a seed from the clock at `resolve()` time; this crate
    /// never samples the clock itself, so a negative seed must be resolved
    /// by the caller before a session starts.
    pub seed: i64,
    #[serde(default)]
    pub precode: PrecodeKind,
}

impl Params {
    pub fn from_toml(s: &str) -> Result<Self, SncError> {
        toml::from_str(s).map_err(|e| SncError::InvalidParameter(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, SncError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| SncError::IoFailure(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn snum(&self) -> usize {
        (self.datasize + self.size_p - 1) / self.size_p
    }

    pub fn cnum(&self) -> usize {
        self.size_c
    }

    pub fn pktnum(&self) -> usize {
        self.snum() + self.cnum()
    }

    /// `gnum` per §4.3. `None` means unbounded (BATS allocates generations
    /// lazily in chunks of `BALLOC`).
    pub fn gnum(&self) -> Option<usize> {
        let m = self.pktnum();
        match self.grouping {
            GroupingKind::Band | GroupingKind::Pseudorand => {
                Some(ceil_div(m - self.size_g, self.size_b) + 1)
            }
            GroupingKind::Windwrap | GroupingKind::Rand => Some(ceil_div(m, self.size_b)),
            GroupingKind::Bats => None,
            GroupingKind::Raptor => None,
        }
    }

    /// `magicX = min(7, size_b + gnum - size_g)`: the cross-mixing offset
    /// used by the pseudorand grouping scheme's tail slots. Can be zero or
    /// negative when `size_g` is large relative to `size_b + gnum`; only
    /// ever clamped from above.
    pub fn magic_x(&self) -> i64 {
        let gnum = self.gnum().unwrap_or(0) as i64;
        (self.size_b as i64 + gnum - self.size_g as i64).min(7)
    }

    pub fn validate(&self) -> Result<(), SncError> {
        if self.size_p == 0 {
            return Err(SncError::InvalidParameter("size_p must be nonzero".into()));
        }
        if self.datasize == 0 {
            return Err(SncError::InvalidParameter("datasize must be nonzero".into()));
        }
        // BATS/RAPTOR exempt: size_b is the batch-send cadence there, not a
        // generation sub-window, so it carries no ordering relation to size_g.
        if self.grouping != GroupingKind::Bats
            && self.grouping != GroupingKind::Raptor
            && self.size_b > self.size_g
        {
            return Err(SncError::InvalidParameter("size_b must be <= size_g".into()));
        }
        if self.gfpower == 0 || self.gfpower > 8 {
            return Err(SncError::InvalidParameter(
                "gfpower must be in 1..=8".into(),
            ));
        }
        if self.grouping == GroupingKind::Raptor {
            return Err(SncError::InvalidParameter(
                "RAPTOR grouping is not implemented".into(),
            ));
        }
        let m = self.pktnum();
        if self.size_g > m {
            return Err(SncError::InvalidParameter(
                "size_g must be <= snum + cnum".into(),
            ));
        }
        // §4.1: source packets must contain a multiple of gfpower bits.
        if (self.size_p * 8) % (self.gfpower as usize) != 0 {
            return Err(SncError::InvalidParameter(
                "size_p*8 must be a multiple of gfpower".into(),
            ));
        }
        Ok(())
    }

    /// Applies recognized environment overrides and returns the resolved
    /// parameter set. Never mutates `self`.
    pub fn resolve(&self) -> Result<Params, SncError> {
        let overrides = EnvOverrides::read();
        let mut p = self.clone();
        if let Some(gfpower) = overrides.gf_power {
            p.gfpower = gfpower.min(8);
        }
        if let Some(precode) = overrides.precode {
            p.precode = precode;
        }
        p.validate()?;
        Ok(p)
    }
}

/// Recognized environment variables (§6). Read once per `resolve()` call
/// rather than scattered through the codebase.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub nonuniform_rand: bool,
    pub precode: Option<PrecodeKind>,
    pub gf_power: Option<u8>,
}

impl EnvOverrides {
    pub fn read() -> Self {
        Self {
            log_level: std::env::var("SNC_LOG_LEVEL").ok(),
            nonuniform_rand: std::env::var("SNC_NONUNIFORM_RAND")
                .map(|v| v == "1")
                .unwrap_or(false),
            precode: std::env::var("SNC_PRECODE").ok().and_then(|v| {
                if v.eq_ignore_ascii_case("HDPC") {
                    Some(PrecodeKind::Hdpc)
                } else {
                    None
                }
            }),
            gf_power: std::env::var("GF_POWER")
                .ok()
                .and_then(|v| v.parse::<u8>().ok()),
        }
    }
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
