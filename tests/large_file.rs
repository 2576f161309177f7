//! Scale tests: millions of rows through a bounded buffer.

use csv_typed::{Converter, HeaderPolicy, LineReader, ReaderBuilder};
use std::io::{BufWriter, Write};
use tempfile::NamedTempFile;

const NUM_1M: usize = 1 << 20;

fn generate_file() -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut out = BufWriter::new(file.reopen().unwrap());
    writeln!(out, "id,#1,#2,#3,#4,#5,#6,#7,#8").unwrap();
    for i in 0..NUM_1M {
        writeln!(
            out,
            "{},abcdefg,hijklmn,opq-rst,uvw-xyz,ABCDEFG,HIJKLMN,OPQ-RST,UVW-XYZ",
            i + 1
        )
        .unwrap();
    }
    out.flush().unwrap();
    file
}

#[test]
fn test_large_file_single_pass() {
    let file = generate_file();
    let mut reader = ReaderBuilder::new(9).from_path(file.path()).unwrap();
    reader
        .read_header(
            HeaderPolicy::IGNORE_MISSING,
            &["id", "#1", "#2", "#3", "#4", "#5", "#6", "#7", "#8"],
        )
        .unwrap();

    let mut id = 0usize;
    let mut c = vec![String::new(); 8];
    let mut count = 0usize;
    let [c1, c2, c3, c4, c5, c6, c7, c8] = &mut c[..] else {
        unreachable!()
    };
    while reader
        .read_row((
            &mut id, &mut *c1, &mut *c2, &mut *c3, &mut *c4, &mut *c5, &mut *c6, &mut *c7,
            &mut *c8,
        ))
        .unwrap()
    {
        count += 1;
        if id != count || c1.as_str() != "abcdefg" || c8.as_str() != "UVW-XYZ" {
            panic!("row {count} read back as id {id}: {c1} .. {c8}");
        }
    }
    assert_eq!(count, NUM_1M);
    assert_eq!(reader.line_number(), NUM_1M as u64 + 1);
}

#[test]
fn test_large_gbk_line() {
    // "烫" in GBK and UTF-8
    let gbk_char = b"\xCC\xCC";
    let utf_char = b"\xE7\x83\xAB";

    let mut long_line = gbk_char.repeat(NUM_1M);
    assert_eq!(long_line.len(), NUM_1M * 2);

    let gbk2utf = Converter::new("UTF-8", "GBK").unwrap();
    assert!(gbk2utf.try_convert(&mut long_line));
    assert_eq!(long_line.len(), NUM_1M * 3);
    assert!(long_line.chunks(3).all(|ch| ch == utf_char));

    let utf2gbk = gbk2utf.reversed();
    assert!(utf2gbk.try_convert(&mut long_line));
    assert_eq!(long_line.len(), NUM_1M * 2);
    assert!(long_line.chunks(2).all(|ch| ch == gbk_char));

    // 2 MiB without a newline is over the default limit
    let mut lines = LineReader::from_bytes("string.buf", &long_line);
    assert!(lines.next_line().is_err());

    // 1 MiB is exactly at it
    let half_line = &long_line[NUM_1M..];
    let mut lines = LineReader::from_bytes("string.buf", half_line);
    assert_eq!(lines.next_line().unwrap().map(<[u8]>::len), Some(NUM_1M));
}
