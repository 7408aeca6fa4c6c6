//! End-to-end scenarios from the decoding design's testable-properties
//! section: compile a small format tree, build a synthetic trace buffer by
//! hand, and check the resulting `Main.log` text.

use std::fs;
use std::io::Write;

use rtemsg::buffer;
use rtemsg::params::Params;
use rtemsg::session::Decoder;

fn write_fmt(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

fn trace_header(last_index: u32, fmt_id_bits: u8, freq: u32, buffer_size: u32) -> Vec<u8> {
    let cfg = (fmt_id_bits as u32) << 24;
    let mut v = Vec::new();
    for w in [last_index, 0u32, cfg, freq, 0u32, buffer_size] {
        v.extend_from_slice(&w.to_le_bytes());
    }
    v
}

fn params_for(fmt_dir: &std::path::Path, out_dir: &std::path::Path, bin: std::path::PathBuf) -> Params {
    let mut p = Params::default();
    p.fmt_folder = fmt_dir.to_path_buf();
    p.output_folder = out_dir.to_path_buf();
    p.binary_file = Some(bin);
    p.fmt_id_bits = 9;
    p
}

#[test]
fn minimal_decode_prints_message_number_and_literal() {
    let fmt_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let fmt_path = write_fmt(&fmt_dir, "a.fmt", "// MSG0_HELLO\n// \"hello %[N]N\\n\"\n");

    let fmt_id_bits = 9u8;
    let params = params_for(fmt_dir.path(), out_dir.path(), out_dir.path().join("trace.bin"));
    let mut decoder = Decoder::compile(&[fmt_path], params);
    assert!(decoder.plans.errors.is_empty(), "{:?}", decoder.plans.errors);

    // FIDs 0 and 2 are reserved for system messages, so look up whatever
    // FID the allocator actually gave `MSG0_HELLO` instead of assuming 0.
    let plan_index = decoder
        .plans
        .plans
        .iter()
        .position(|p| p.name == "MSG0_HELLO")
        .unwrap();
    let fid = decoder
        .plans
        .fid_plan_index
        .iter()
        .position(|slot| *slot == Some(plan_index))
        .unwrap() as u32;

    // One FMT-only word: bit0=1 (FMT), rest carries timestamp low.
    let shift = 32 - fmt_id_bits as u32;
    let fmt_word = (fid << shift) | 1;
    let mut bytes = trace_header(0, fmt_id_bits, 1_000_000, 16);
    bytes.extend_from_slice(&fmt_word.to_le_bytes());

    let bin_path = out_dir.path().join("trace.bin");
    fs::write(&bin_path, &bytes).unwrap();

    let trace_bytes = fs::read(&bin_path).unwrap();
    let (header, words) = buffer::load(&trace_bytes, fmt_id_bits).unwrap();
    let report = decoder.decode_buffer(&header, &words);
    assert_eq!(report.messages_decoded, 1);

    decoder.write_outputs().unwrap();
    let main_log = fs::read_to_string(out_dir.path().join("Main.log")).unwrap();
    assert!(main_log.contains("hello 00001"), "unexpected Main.log: {main_log}");
}

#[test]
fn header_resync_skips_rewrite_when_unchanged() {
    let fmt_dir = tempfile::tempdir().unwrap();
    let header_path = fmt_dir.path().join("a.fmt.h");
    fs::write(&header_path, "same").unwrap();
    let changed = rtemsg::compiler::header::replace_if_different(&header_path, "same", false).unwrap();
    assert!(!changed);
}
