//! Deterministic frame-indexed random-access reading and closed-GOP writing
//! of H.265/HEVC video.
//!
//! This crate is not a codec — FFmpeg (via `ffmpeg-the-third`) does the
//! actual decode/encode work. What it provides is the layer on top: a
//! mapping from 1-based frame indices to stream-level decode timestamps, a
//! seek-then-decode protocol that tolerates B-frame reordering, and a
//! GOP-aligned decoded-frame cache that makes nearby random accesses cheap.
//!
//! [`reader::Reader`] opens a file for indexed reads; [`writer::Writer`]
//! opens a path for sequential closed-GOP writes. Both own their FFmpeg
//! contexts exclusively and release them on every exit path, including an
//! early error or an unwind.

mod cache;
mod decode;
mod error;
mod ffmpeg_support;
mod frame;
mod index;
mod nal;
mod reader;
mod writer;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use frame::Frame;
pub use reader::{OutputFormat, Reader, ReaderOptions};
pub use writer::{Writer, WriterOptions};
