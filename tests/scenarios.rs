//! End-to-end scenarios S1-S6.

use sparsenc::{
    CbdDecoder, Decoder, Encoder, GgDecoder, GroupingKind, OaDecoder, Params, PrecodeKind,
    ProcessOutcome, Recoder,
};

fn pattern_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn run_to_completion<D: Decoder>(
    decoder: &mut D,
    mut next_packet: impl FnMut() -> sparsenc::CodedPacket,
    max_packets: usize,
) -> usize {
    let mut fed = 0;
    for _ in 0..max_packets {
        let pkt = next_packet();
        fed += 1;
        match decoder.process_packet(pkt).expect("packet should be valid") {
            ProcessOutcome::Finished => return fed,
            ProcessOutcome::Continue => {}
        }
    }
    panic!("decoder did not finish within {max_packets} packets");
}

#[test]
fn s1_band_cbd_no_precode_gf256() {
    let params = Params {
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
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let mut dec = CbdDecoder::new(params.clone()).unwrap();

    run_to_completion(&mut dec, || enc.emit().unwrap(), 10 * params.snum());

    assert!(dec.finished());
    assert!(dec.overhead() as f64 <= 1.10 * params.snum() as f64);
    assert_eq!(dec.recover().unwrap(), data);
}

#[test]
fn s2_rand_oa_with_ldpc_precode_gf256() {
    let params = Params {
        datasize: 65536,
        size_p: 256,
        size_c: 16,
        size_b: 32,
        size_g: 64,
        grouping: GroupingKind::Rand,
        gfpower: 8,
        bpc: true,
        sys: false,
        seed: 42,
        precode: PrecodeKind::Ldpc,
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let mut dec = OaDecoder::new(params.clone()).unwrap();

    run_to_completion(&mut dec, || enc.emit().unwrap(), 30 * params.snum());

    assert!(dec.finished());
    assert!(dec.overhead() as f64 <= 1.20 * params.snum() as f64);
    assert_eq!(dec.recover().unwrap(), data);
}

#[test]
fn s3_rand_gg_with_ldpc_precode_gf256() {
    let params = Params {
        datasize: 65536,
        size_p: 256,
        size_c: 16,
        size_b: 32,
        size_g: 64,
        grouping: GroupingKind::Rand,
        gfpower: 8,
        bpc: true,
        sys: false,
        seed: 42,
        precode: PrecodeKind::Ldpc,
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let mut dec = GgDecoder::new(params.clone()).unwrap();

    // GG needs a full-rank size_g x size_g system per generation before it
    // can even start, so it needs materially more packets than OA; bound it
    // generously but finitely, per §8 ("overhead higher than S2, but finite").
    run_to_completion(&mut dec, || enc.emit().unwrap(), 40 * params.snum());

    assert!(dec.finished());
    assert_eq!(dec.recover().unwrap(), data);
}

#[test]
fn s4_windwrap_gf2() {
    // §4.6 scopes CBD to BAND-grouped codes: its row-compressed storage
    // assumes column j's nonzeros lie in [j, j+size_g), which doesn't hold
    // across WINDWRAP's wraparound boundary. The GG decoder has no such
    // restriction, so it's used here instead (the original C test harness
    // likewise never pairs the CBD decoder with a non-BAND type).
    let params = Params {
        datasize: 4096,
        size_p: 64,
        size_c: 0,
        size_b: 8,
        size_g: 16,
        grouping: GroupingKind::Windwrap,
        gfpower: 1,
        bpc: false,
        sys: false,
        seed: 7,
        precode: PrecodeKind::Ldpc,
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let mut dec = GgDecoder::new(params.clone()).unwrap();

    run_to_completion(&mut dec, || enc.emit().unwrap(), 40 * params.snum());

    assert!(dec.finished());
    assert_eq!(dec.recover().unwrap(), data);
}

#[test]
fn s5_recoder_pass_through() {
    let params = Params {
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
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let gnum = sparsenc::generation::build(&params).unwrap().len();
    let mut recoder = Recoder::new(
        params.clone(),
        gnum,
        8,
        sparsenc::scheduler::RecodeSchedule::Mlpi,
    );
    let mut dec = CbdDecoder::new(params.clone()).unwrap();

    let mut finished = false;
    for _ in 0..40 * params.snum() {
        let pkt = enc.emit().unwrap();
        recoder.buffer_packet(pkt).unwrap();
        if let Some(recoded) = recoder.generate_recoded_packet().unwrap() {
            if let ProcessOutcome::Finished = dec.process_packet(recoded).unwrap() {
                finished = true;
                break;
            }
        }
    }

    assert!(finished, "decoder did not finish consuming recoded packets");
    assert_eq!(dec.recover().unwrap(), data);
}

#[test]
fn s6_systematic_shortcut_zero_overhead() {
    let params = Params {
        datasize: 10240,
        size_p: 128,
        size_c: 0,
        size_b: 16,
        size_g: 32,
        grouping: GroupingKind::Band,
        gfpower: 8,
        bpc: false,
        sys: true,
        seed: 1,
        precode: PrecodeKind::Ldpc,
    };
    let data = pattern_data(params.datasize);
    let mut enc = Encoder::from_data(&data, params.clone()).unwrap();
    let mut dec = CbdDecoder::new(params.clone()).unwrap();

    let snum = params.snum();
    for _ in 0..snum {
        let pkt = enc.emit().unwrap();
        assert!(pkt.is_systematic());
        dec.process_packet(pkt).unwrap();
    }

    assert!(dec.finished());
    assert_eq!(dec.overhead(), 0);
    assert_eq!(dec.recover().unwrap(), data);
}
