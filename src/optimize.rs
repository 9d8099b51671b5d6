// Copyright (c) 2024, The QuicFuscate Project Authors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following disclaimer
//       in the documentation and/or other materials provided with the
//       distribution.
//
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived from
//       this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Runtime CPU feature detection, SIMD dispatch, and pooled aligned buffers
//! for the Galois-field region kernels.

use aligned_box::{AlignedBox, MIN_ALIGN};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use crossbeam_queue::ArrayQueue;
#[cfg(target_arch = "aarch64")]
use std::arch::is_aarch64_feature_detected;
#[cfg(target_arch = "x86_64")]
use std::arch::is_x86_feature_detected;

/// CPU features relevant to the GF region kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuFeature {
    AVX,
    AVX2,
    AVX512F,
    PCLMULQDQ,
    NEON,
}

/// Singleton for accessing detected CPU features; detection runs once.
pub struct FeatureDetector {
    features: HashMap<CpuFeature, bool>,
}

static DETECTOR: OnceLock<FeatureDetector> = OnceLock::new();

impl FeatureDetector {
    pub fn instance() -> &'static Self {
        DETECTOR.get_or_init(|| {
            let mut features = HashMap::new();
            #[cfg(target_arch = "x86_64")]
            {
                features.insert(CpuFeature::AVX, is_x86_feature_detected!("avx"));
                features.insert(CpuFeature::AVX2, is_x86_feature_detected!("avx2"));
                features.insert(CpuFeature::AVX512F, is_x86_feature_detected!("avx512f"));
                features.insert(CpuFeature::PCLMULQDQ, is_x86_feature_detected!("pclmulqdq"));
            }
            #[cfg(target_arch = "aarch64")]
            {
                features.insert(CpuFeature::NEON, is_aarch64_feature_detected!("neon"));
            }
            FeatureDetector { features }
        })
    }

    pub fn has_feature(&self, feature: CpuFeature) -> bool {
        *self.features.get(&feature).unwrap_or(&false)
    }
}

/// Execution policy for a GF region kernel.
pub trait SimdPolicy: Any {
    fn as_any(&self) -> &dyn Any;
}

pub struct Avx512;
impl SimdPolicy for Avx512 {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Avx2;
impl SimdPolicy for Avx2 {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Pclmulqdq;
impl SimdPolicy for Pclmulqdq {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Neon;
impl SimdPolicy for Neon {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Scalar;
impl SimdPolicy for Scalar {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Dispatches to the best available SIMD implementation at runtime, most
/// to least performant.
pub fn dispatch<F, R>(f: F) -> R
where
    F: Fn(&dyn SimdPolicy) -> R,
{
    let detector = FeatureDetector::instance();

    if detector.has_feature(CpuFeature::AVX512F) {
        f(&Avx512)
    } else if detector.has_feature(CpuFeature::AVX2) {
        f(&Avx2)
    } else if detector.has_feature(CpuFeature::PCLMULQDQ) {
        f(&Pclmulqdq)
    } else if detector.has_feature(CpuFeature::NEON) {
        f(&Neon)
    } else {
        f(&Scalar)
    }
}

/// Thread-safe pool of fixed-size, 64-byte aligned blocks backing packet
/// payloads and coefficient vectors.
pub struct MemoryPool {
    pool: Arc<ArrayQueue<AlignedBox<[u8]>>>,
    block_size: usize,
}

impl MemoryPool {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        let pool = ArrayQueue::new(capacity);
        for _ in 0..capacity {
            let aligned_box = AlignedBox::new_zeroed(block_size, MIN_ALIGN);
            let _ = pool.push(aligned_box);
        }
        Self {
            pool: Arc::new(pool),
            block_size,
        }
    }

    /// Allocates a block from the pool, growing it if empty.
    pub fn alloc(&self) -> AlignedBox<[u8]> {
        self.pool
            .pop()
            .unwrap_or_else(|| AlignedBox::new_zeroed(self.block_size, MIN_ALIGN))
    }

    /// Returns a block to the pool, zeroing it first. Dropped if the pool
    /// is already at capacity.
    pub fn free(&self, mut block: AlignedBox<[u8]>) {
        block.iter_mut().for_each(|x| *x = 0);
        let _ = self.pool.push(block);
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
