//! Wire-level codecs: varint/zigzag primitives and the delta-compressed
//! geometry coder.

pub mod geometry;
pub mod varint;

pub use geometry::{
    decode_runs, encode_label, encode_run, encode_runs, thin_run, write_separator, RunStats,
};
pub use varint::{
    decode_zigzag32, decode_zigzag64, encode_zigzag32, encode_zigzag64, read_varint32,
    read_varint64, varint32_len, varint64_len, write_varint32, write_varint64,
};
