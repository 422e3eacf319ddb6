//! Decode-and-convert core — component B.
//!
//! Shared by the GOP cache's populate step (component C) and the range
//! reader (component E): seek-with-fallback, flush-after-seek, push/pull
//! decode loop with bitmap-tracked capture, end-of-stream null-packet
//! flush, and bilinear color conversion into a dense row-major buffer.

use std::ops::Range;

use ffmpeg::{
    decoder::Video as VideoDecoder,
    format::{context::Input, Pixel},
    software::scaling::{flag::Flags, Context as SwsContext},
};

use crate::{
    error::{Error, Result},
    ffmpeg_support,
    index::VideoInfo,
};

/// Seeks backward to `target_dts`, falling back to a seek-to-start if the
/// precise seek fails, then flushes the decoder's internal buffers. The
/// decoder must never carry reordering state across a seek.
fn seek_with_fallback(ictx: &mut Input, decoder: &mut VideoDecoder, target_dts: i64) -> Result<()> {
    if ictx.seek(target_dts, ..=target_dts).is_err() {
        let _ = ictx.seek(i64::MIN, ..);
    }
    decoder.flush();
    Ok(())
}

/// Decodes every frame whose index falls in `range` (zero-based, absolute,
/// half-open) into `out`, a pre-sized `range.len() * frame_size`-byte
/// buffer. Frames are captured in whatever order the decoder emits them
/// (tolerating B-frame reordering) via a completion bitmap, and the
/// function returns as soon as every slot is filled.
///
/// Rust's host array convention is already row-major, so there is no
/// transpose step at the boundary, only a direct dense copy: a column-major
/// host would need one bulk transpose here, but a row-major host doesn't.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_range_into(
    ictx: &mut Input,
    decoder: &mut VideoDecoder,
    video_stream_index: usize,
    pts_increment: i64,
    target_dts: i64,
    range: Range<usize>,
    scaler: &mut Option<SwsContext>,
    target_format: Pixel,
    out_width: u32,
    out_height: u32,
    out: &mut [u8],
    frame_size: usize,
    info: &VideoInfo,
) -> Result<()> {
    seek_with_fallback(ictx, decoder, target_dts)?;

    let range_len = range.len();
    let mut captured = vec![false; range_len];
    let mut remaining = range_len;
    let mut packets_read = 0usize;
    let mut dts_min: Option<i64> = None;
    let mut dts_max: Option<i64> = None;

    let mut packets = ictx.packets();
    loop {
        if remaining == 0 {
            break;
        }
        match packets.next() {
            Some(Ok((stream, packet))) => {
                if stream.index() != video_stream_index {
                    continue;
                }
                packets_read += 1;
                if let Some(dts) = packet.dts() {
                    dts_min = Some(dts_min.map_or(dts, |m: i64| m.min(dts)));
                    dts_max = Some(dts_max.map_or(dts, |m: i64| m.max(dts)));
                }
                decoder.send_packet(&packet).map_err(|source| Error::DecodeError {
                    path: info.path.clone(),
                    index: None,
                    source,
                })?;
                drain_decoded(
                    decoder,
                    scaler,
                    target_format,
                    out_width,
                    out_height,
                    pts_increment,
                    &range,
                    &mut captured,
                    &mut remaining,
                    out,
                    frame_size,
                    info,
                )?;
            },
            Some(Err(source)) => {
                return Err(Error::DecodeError {
                    path: info.path.clone(),
                    index: None,
                    source,
                })
            },
            None => {
                let _ = decoder.send_eof();
                drain_decoded(
                    decoder,
                    scaler,
                    target_format,
                    out_width,
                    out_height,
                    pts_increment,
                    &range,
                    &mut captured,
                    &mut remaining,
                    out,
                    frame_size,
                    info,
                )?;
                break;
            },
        }
    }

    if remaining > 0 {
        return Err(Error::NotFound {
            path: info.path.clone(),
            target_pts: target_dts,
            packets_read,
            dts_min,
            dts_max,
        });
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn drain_decoded(
    decoder: &mut VideoDecoder,
    scaler: &mut Option<SwsContext>,
    target_format: Pixel,
    out_width: u32,
    out_height: u32,
    pts_increment: i64,
    range: &Range<usize>,
    captured: &mut [bool],
    remaining: &mut usize,
    out: &mut [u8],
    frame_size: usize,
    info: &VideoInfo,
) -> Result<()> {
    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let Some(pts) = decoded.pts() else {
            continue;
        };
        if pts % pts_increment != 0 {
            continue;
        }
        let frame_index = (pts / pts_increment) as usize;
        if frame_index < range.start || frame_index >= range.end {
            continue;
        }
        let local = frame_index - range.start;
        if captured[local] {
            continue;
        }

        let sc = scaler.get_or_insert_with(|| {
            SwsContext::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                target_format,
                out_width,
                out_height,
                Flags::BILINEAR,
            )
            .expect("create swscale context")
        });

        let mut converted = ffmpeg::util::frame::video::Video::empty();
        sc.run(&decoded, &mut converted).map_err(|source| Error::DecodeError {
            path: info.path.clone(),
            index: Some(frame_index + 1),
            source,
        })?;

        let stride = converted.stride(0);
        let raw = converted.data(0);
        let channels = ffmpeg_support::channels_for(target_format);
        let row_bytes = out_width as usize * channels;
        let dst_start = local * frame_size;
        for row in 0..out_height as usize {
            let src = &raw[row * stride..row * stride + row_bytes];
            let dst = &mut out[dst_start + row * row_bytes..dst_start + (row + 1) * row_bytes];
            dst.copy_from_slice(src);
        }

        captured[local] = true;
        *remaining -= 1;
        if *remaining == 0 {
            return Ok(());
        }
    }
    Ok(())
}
