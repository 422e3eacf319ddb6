//! Small FFmpeg helper functions shared by `index`, `decode`, and `writer`.

use std::sync::Once;

use ffmpeg::{format::Pixel, Rational};

static FFMPEG_INIT: Once = Once::new();

/// Process-wide FFmpeg initialization: registers codecs/formats and pins the
/// log level to warning. Safe to call from every session constructor; runs
/// exactly once regardless of how many sessions are opened.
pub fn ensure_ffmpeg_initialized() {
    FFMPEG_INIT.call_once(|| {
        ffmpeg::init().expect("ffmpeg-the-third failed to initialize");
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);
    });
}

/// Computes `pts_increment = time_base.den * frame_rate.den / (time_base.num
/// * frame_rate.num)`, returning `None` when the division has a nonzero
/// remainder — the file's PTS granularity is incompatible with integer
/// frame indexing.
#[must_use]
pub fn pts_increment(time_base: Rational, frame_rate: Rational) -> Option<i64> {
    let num = i64::from(time_base.denominator()) * i64::from(frame_rate.denominator());
    let den = i64::from(time_base.numerator()) * i64::from(frame_rate.numerator());
    if den == 0 || num % den != 0 {
        None
    } else {
        Some(num / den)
    }
}

/// Heuristic used to reject hardware-only decoders: FFmpeg names
/// hardware-accelerated decoder variants with a well-known suffix
/// (`h264_cuvid`, `hevc_qsv`, `hevc_videotoolbox`, ...). A software decoder
/// for the same codec always exists under the bare codec name.
const HARDWARE_DECODER_SUFFIXES: &[&str] =
    &["_cuvid", "_qsv", "_v4l2m2m", "_vaapi", "_videotoolbox", "_mediacodec", "_nvdec", "_amf"];

#[must_use]
pub fn is_hardware_only_decoder(codec: &ffmpeg::Codec) -> bool {
    let name = codec.name();
    HARDWARE_DECODER_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Number of bytes per pixel for the output pixel formats this crate ever
/// produces (`GRAY8` or `RGB24`); any other format is treated as RGB24-like
/// for the purpose of dense-copy sizing, which never happens in practice
/// since `decode`/`writer` only ever request these two.
#[must_use]
pub fn channels_for(format: Pixel) -> usize {
    match format {
        Pixel::GRAY8 => 1,
        _ => 3,
    }
}

/// True when a decoder's native pixel format is one of FFmpeg's grayscale
/// families — used for output-format autodetection when neither the caller
/// nor the container metadata states a preference.
#[must_use]
pub fn is_grayscale_pixel_format(format: Pixel) -> bool {
    matches!(
        format,
        Pixel::GRAY8
            | Pixel::GRAY9
            | Pixel::GRAY10
            | Pixel::GRAY12
            | Pixel::GRAY14
            | Pixel::GRAY16
            | Pixel::GRAY9LE
            | Pixel::GRAY9BE
            | Pixel::GRAY10LE
            | Pixel::GRAY10BE
            | Pixel::GRAY12LE
            | Pixel::GRAY12BE
            | Pixel::GRAY14LE
            | Pixel::GRAY14BE
            | Pixel::GRAY16LE
            | Pixel::GRAY16BE
    )
}
