//! Frame-index (DTS/PTS) table builder — component A.
//!
//! Two-pass scan of an input file: pass 1 counts frames and rejects
//! open-GOP HEVC; pass 2 validates PTS alignment and builds the
//! frame-index -> DTS table every later read depends on.

use std::path::{Path, PathBuf};

use ffmpeg::{codec::Id as CodecId, format::input, media::Type as MediaType};

use crate::{
    error::{Error, Result},
    ffmpeg_support,
    nal,
};

/// Everything known about an opened read session once the index has been
/// built. Immutable once constructed; owned exclusively by one [`crate::reader::Reader`].
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub(crate) path:               PathBuf,
    pub(crate) frame_count:        usize,
    pub(crate) width:              u32,
    pub(crate) height:             u32,
    pub(crate) frame_rate:         (i32, i32),
    pub(crate) time_base:          (i32, i32),
    pub(crate) pts_increment:      i64,
    pub(crate) dts:                Vec<i64>,
    pub(crate) keyframes:          Vec<bool>,
    pub(crate) is_grayscale_hint:  Option<bool>,
    pub(crate) native_is_gray:     bool,
    pub(crate) video_stream_index: usize,
}

impl VideoInfo {
    /// Runs the full §4.A algorithm against `path`, returning a complete,
    /// validated `VideoInfo` or the specific reason the file was rejected.
    /// No partial `VideoInfo` is ever returned — any error aborts
    /// construction entirely.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub(crate) fn build(path: impl AsRef<Path>) -> Result<Self> {
        ffmpeg_support::ensure_ffmpeg_initialized();
        let path = path.as_ref().to_path_buf();

        let mut ictx = input(&path).map_err(|source| Error::OpenFailed {
            path: path.clone(),
            source,
        })?;

        let video_stream_index = ictx
            .streams()
            .best(MediaType::Video)
            .ok_or_else(|| Error::NoVideoStream {
                path: path.clone(),
            })?
            .index();

        let (time_base, frame_rate, codec_id, width, height, extradata) = {
            let stream = ictx.stream(video_stream_index).ok_or_else(|| Error::NoVideoStream {
                path: path.clone(),
            })?;
            let params = stream.parameters();
            let decoder_ctx =
                ffmpeg::codec::context::Context::from_parameters(params.clone()).map_err(|source| {
                    Error::StreamInfoFailed {
                        path: path.clone(),
                        source,
                    }
                })?;
            let decoder = decoder_ctx.decoder().video().map_err(|source| Error::StreamInfoFailed {
                path: path.clone(),
                source,
            })?;

            let tb = stream.time_base();
            let fr = stream.avg_frame_rate();
            let codec_id = params.id();

            // SAFETY: AVCodecParameters is a plain-old-data struct; extradata is
            // either null or a valid buffer of extradata_size bytes owned by the
            // stream's parameters for at least as long as `params` is alive.
            let extradata = unsafe {
                let p = params.as_ptr();
                let data = (*p).extradata;
                let len = (*p).extradata_size as usize;
                if data.is_null() || len == 0 {
                    None
                } else {
                    Some(std::slice::from_raw_parts(data, len).to_vec())
                }
            };

            (tb, fr, codec_id, decoder.width(), decoder.height(), extradata)
        };

        if frame_rate.numerator() <= 0 || frame_rate.denominator() <= 0 {
            return Err(Error::BadFrameRate {
                frame_rate_num: frame_rate.numerator(),
                frame_rate_den: frame_rate.denominator(),
                time_base_num:  time_base.numerator(),
                time_base_den:  time_base.denominator(),
            });
        }

        let pts_increment =
            ffmpeg_support::pts_increment(time_base, frame_rate).ok_or(Error::BadFrameRate {
                frame_rate_num: frame_rate.numerator(),
                frame_rate_den: frame_rate.denominator(),
                time_base_num:  time_base.numerator(),
                time_base_den:  time_base.denominator(),
            })?;

        Self::reject_hardware_decoder(&path, codec_id)?;

        let length_size = if codec_id == CodecId::HEVC {
            extradata.as_deref().and_then(nal::length_size_from_extradata)
        } else {
            None
        };

        // ── Pass 1: count packets, reject open-GOP HEVC ────────────────────
        let mut frame_count = 0usize;
        for result in ictx.packets() {
            let (stream, packet) = result.map_err(|source| Error::StreamInfoFailed {
                path: path.clone(),
                source,
            })?;
            if stream.index() != video_stream_index {
                continue;
            }
            if codec_id == CodecId::HEVC {
                if let Some(length_size) = length_size {
                    if let Some(payload) = packet.data() {
                        if let Some(nal_type) = nal::first_open_gop_nal(payload, length_size) {
                            return Err(Error::OpenGop {
                                path:     path.clone(),
                                nal_type,
                                nal_name: nal::open_gop_nal_name(nal_type),
                            });
                        }
                    }
                }
            }
            frame_count += 1;
        }

        if frame_count == 0 {
            return Err(Error::NoFrames {
                path,
            });
        }

        // ── Pass 2: build the DTS/keyframe tables ──────────────────────────
        ictx.seek(i64::MIN, ..).map_err(|source| Error::StreamInfoFailed {
            path: path.clone(),
            source,
        })?;

        let mut dts = vec![0i64; frame_count];
        let mut keyframes = vec![false; frame_count];
        let mut occurrences = vec![0u8; frame_count];

        for result in ictx.packets() {
            let (stream, packet) = result.map_err(|source| Error::StreamInfoFailed {
                path: path.clone(),
                source,
            })?;
            if stream.index() != video_stream_index {
                continue;
            }

            let pts = packet.pts().unwrap_or(0);
            let frame_index = frame_index_for_pts(&path, pts, pts_increment, frame_count)?;

            dts[frame_index] = packet.dts().unwrap_or(pts);
            keyframes[frame_index] = packet.is_key();
            occurrences[frame_index] += 1;
        }

        for (index, &count) in occurrences.iter().enumerate() {
            if count == 0 {
                return Err(Error::MissingPts {
                    path: path.clone(),
                    index,
                    frame_count,
                });
            }
            if count > 1 {
                return Err(Error::DuplicatePts {
                    path: path.clone(),
                    index,
                    frame_count,
                    count: count as usize,
                });
            }
        }

        ictx.seek(i64::MIN, ..).map_err(|source| Error::StreamInfoFailed {
            path: path.clone(),
            source,
        })?;

        let is_grayscale_hint = ictx.metadata().get("is_grayscale").map(|v| v == "1");

        let native_is_gray = {
            let stream = ictx.stream(video_stream_index).ok_or_else(|| Error::NoVideoStream {
                path: path.clone(),
            })?;
            let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|source| Error::StreamInfoFailed {
                    path: path.clone(),
                    source,
                })?;
            let decoder = decoder_ctx.decoder().video().map_err(|source| Error::StreamInfoFailed {
                path: path.clone(),
                source,
            })?;
            ffmpeg_support::is_grayscale_pixel_format(decoder.format())
        };

        Ok(Self {
            path,
            frame_count,
            width,
            height,
            frame_rate: (frame_rate.numerator(), frame_rate.denominator()),
            time_base: (time_base.numerator(), time_base.denominator()),
            pts_increment,
            dts,
            keyframes,
            is_grayscale_hint,
            native_is_gray,
            video_stream_index,
        })
    }

    fn reject_hardware_decoder(path: &Path, codec_id: CodecId) -> Result<()> {
        let codec = ffmpeg::decoder::find(codec_id).ok_or_else(|| Error::NoDecoder {
            path: path.to_path_buf(),
            codec: format!("{codec_id:?}"),
        })?;
        if ffmpeg_support::is_hardware_only_decoder(&codec) {
            return Err(Error::HardwareDecoder {
                path:    path.to_path_buf(),
                decoder: codec.name().to_string(),
            });
        }
        Ok(())
    }

    /// Returns the zero-based frame index of the nearest keyframe at or
    /// before `zero_index` — the start of the GOP containing it.
    pub(crate) fn gop_start_for(&self, zero_index: usize) -> usize {
        (0..=zero_index).rev().find(|&i| self.keyframes[i]).unwrap_or(0)
    }

    /// Returns the zero-based, exclusive end of the GOP starting at
    /// `gop_start` — the index of the next keyframe, or `frame_count` if
    /// `gop_start`'s GOP runs to the end of the file.
    pub(crate) fn gop_end_for(&self, gop_start: usize) -> usize {
        ((gop_start + 1)..self.frame_count)
            .find(|&i| self.keyframes[i])
            .unwrap_or(self.frame_count)
    }
}

/// Maps a packet PTS to its frame index under `pts_increment`, or rejects it.
/// Pulled out of `build`'s pass 2 so the alignment rule can be unit tested
/// without a demuxed stream.
fn frame_index_for_pts(path: &Path, pts: i64, pts_increment: i64, frame_count: usize) -> Result<usize> {
    if pts % pts_increment != 0 {
        return Err(Error::MisalignedPts {
            path: path.to_path_buf(),
            pts,
            pts_increment,
        });
    }
    let frame_index = pts / pts_increment;
    if frame_index < 0 || frame_index as usize >= frame_count {
        return Err(Error::MisalignedPts {
            path: path.to_path_buf(),
            pts,
            pts_increment,
        });
    }
    Ok(frame_index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_keyframes(keyframes: Vec<bool>) -> VideoInfo {
        let frame_count = keyframes.len();
        VideoInfo {
            path: PathBuf::from("test.mp4"),
            frame_count,
            width: 64,
            height: 48,
            frame_rate: (30, 1),
            time_base: (1, 90000),
            pts_increment: 3000,
            dts: vec![0; frame_count],
            keyframes,
            is_grayscale_hint: None,
            native_is_gray: false,
            video_stream_index: 0,
        }
    }

    #[test]
    fn aligned_pts_maps_to_expected_frame_index() {
        let path = Path::new("clip.mp4");
        assert_eq!(frame_index_for_pts(path, 0, 3000, 10).unwrap(), 0);
        assert_eq!(frame_index_for_pts(path, 9000, 3000, 10).unwrap(), 3);
    }

    #[test]
    fn misaligned_pts_is_rejected() {
        let path = Path::new("clip.mp4");
        let err = frame_index_for_pts(path, 1500, 3000, 10).unwrap_err();
        assert!(matches!(err, Error::MisalignedPts { pts: 1500, pts_increment: 3000, .. }));
    }

    #[test]
    fn out_of_range_pts_is_rejected() {
        let path = Path::new("clip.mp4");
        let err = frame_index_for_pts(path, 30_000, 3000, 10).unwrap_err();
        assert!(matches!(err, Error::MisalignedPts { .. }));
    }

    #[test]
    fn negative_pts_is_rejected() {
        let path = Path::new("clip.mp4");
        let err = frame_index_for_pts(path, -3000, 3000, 10).unwrap_err();
        assert!(matches!(err, Error::MisalignedPts { .. }));
    }

    #[test]
    fn gop_start_walks_back_to_nearest_keyframe() {
        let info = info_with_keyframes(vec![true, false, false, true, false, false, false]);
        assert_eq!(info.gop_start_for(0), 0);
        assert_eq!(info.gop_start_for(2), 0);
        assert_eq!(info.gop_start_for(3), 3);
        assert_eq!(info.gop_start_for(6), 3);
    }

    #[test]
    fn gop_end_stops_at_next_keyframe_or_eof() {
        let info = info_with_keyframes(vec![true, false, false, true, false, false, false]);
        assert_eq!(info.gop_end_for(0), 3);
        assert_eq!(info.gop_end_for(3), 7);
    }
}
