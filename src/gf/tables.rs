//! Log/antilog tables for GF(2^k), 1 <= k <= 8.
//!
//! GF(2) and GF(256) are the fast paths named in §4.1; intermediate widths
//! fall back to the same table shape at a smaller order. Tables are built
//! once per `gfpower` and are read-only afterwards, matching the
//! process-wide, first-`constructField`-wins model of §5.

use std::sync::OnceLock;

/// Primitive polynomials for GF(2^k), k in 1..=8, in the standard table
/// used by Reed-Solomon / RLNC implementations (degree-k term implied).
const PRIMITIVE_POLY: [u16; 9] = [
    0,     // k=0, unused
    0x3,   // k=1: x + 1
    0x7,   // k=2: x^2 + x + 1
    0xB,   // k=3: x^3 + x + 1
    0x13,  // k=4: x^4 + x + 1
    0x25,  // k=5: x^5 + x^2 + 1
    0x43,  // k=6: x^6 + x + 1
    0x89,  // k=7: x^7 + x^3 + 1
    0x11D, // k=8: x^8 + x^4 + x^3 + x^2 + 1
];

pub struct GfTables {
    pub gfpower: u8,
    pub order: usize,
    /// log[0] is unused (log of zero is undefined).
    pub log: Vec<u16>,
    /// Doubled so `exp[log_a + log_b]` never needs a modulo.
    pub exp: Vec<u16>,
}

impl GfTables {
    fn build(gfpower: u8) -> Self {
        let order = 1usize << gfpower;
        let poly = PRIMITIVE_POLY[gfpower as usize] as usize;
        let mut log = vec![0u16; order];
        let mut exp = vec![0u16; order * 2];
        let mut x: usize = 1;
        for i in 0..order - 1 {
            exp[i] = x as u16;
            exp[i + order - 1] = x as u16;
            log[x] = i as u16;
            x <<= 1;
            if x >= order {
                x ^= poly;
            }
        }
        GfTables {
            gfpower,
            order,
            log,
            exp,
        }
    }
}

static TABLES: [OnceLock<GfTables>; 9] = [
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
];

/// Returns the process-wide table for `gfpower`, building it on first use.
pub fn tables_for(gfpower: u8) -> &'static GfTables {
    assert!((1..=8).contains(&gfpower), "gfpower must be in 1..=8");
    TABLES[gfpower as usize].get_or_init(|| GfTables::build(gfpower))
}
