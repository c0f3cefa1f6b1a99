//! FFmpeg video source (feature: ingest-ffmpeg).
//!
//! Decodes a local video file or a network stream (`rtsp://`, `http://`, ...)
//! one frame per read. Network streams are opened over TCP with a socket
//! timeout so a dead camera surfaces as read errors instead of a hang. When a
//! file runs out of frames the source reports "no frame" from then on.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::software::scaling;
use ffmpeg::util::format::pixel::Pixel;

use super::convert;
use super::{Frame, FrameSource};

/// Socket I/O timeout for network inputs, in microseconds.
const NETWORK_TIMEOUT_US: &str = "5000000";

struct Scaler {
    context: scaling::context::Context,
    format: Pixel,
    width: u32,
    height: u32,
}

pub struct VideoSource {
    uri: String,
    input: Option<ffmpeg::format::context::Input>,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<Scaler>,
    frame_count: u64,
    draining: bool,
}

impl VideoSource {
    pub fn open(uri: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let uri = uri.to_string();
        let input = if uri.contains("://") {
            let mut options = ffmpeg::Dictionary::new();
            options.set("rtsp_transport", "tcp");
            options.set("timeout", NETWORK_TIMEOUT_US);
            ffmpeg::format::input_with_dictionary(&uri, options)
        } else {
            ffmpeg::format::input(&uri)
        }
        .with_context(|| format!("failed to open video input '{uri}' with ffmpeg"))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", uri))?;
        let stream_index = stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        log::info!(
            "VideoSource: connected to {} ({}x{})",
            uri,
            decoder.width(),
            decoder.height()
        );
        Ok(Self {
            uri,
            input: Some(input),
            stream_index,
            decoder,
            scaler: None,
            frame_count: 0,
            draining: false,
        })
    }

    fn to_frame(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = self.scaler.as_ref().map_or(true, |s| {
            s.format != format || s.width != width || s.height != height
        });
        if stale {
            let context = scaling::context::Context::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                scaling::flag::Flags::BILINEAR,
            )
            .context("create ffmpeg scaler")?;
            self.scaler = Some(Scaler {
                context,
                format,
                width,
                height,
            });
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg scaler unavailable"))?;

        let mut rgb = ffmpeg::frame::Video::empty();
        scaler
            .context
            .run(decoded, &mut rgb)
            .context("scale frame to RGB")?;
        let pixels = convert::pack_rows(
            rgb.data(0),
            width as usize * 3,
            rgb.stride(0),
            height as usize,
        )?;
        self.frame_count += 1;
        Frame::new(pixels, width, height)
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.input.is_none() {
                return Ok(None);
            }
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.to_frame(&decoded).map(Some);
            }

            let next = self.input.as_mut().and_then(|input| {
                input
                    .packets()
                    .next()
                    .map(|(stream, packet)| (stream.index(), packet))
            });
            match next {
                Some((index, packet)) => {
                    if index == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .with_context(|| format!("decode packet from {}", self.uri))?;
                    }
                }
                None if !self.draining => {
                    self.draining = true;
                    if let Err(err) = self.decoder.send_eof() {
                        log::debug!("VideoSource: flushing {} failed: {}", self.uri, err);
                    }
                }
                None => {
                    log::info!(
                        "VideoSource: {} ended after {} frames",
                        self.uri,
                        self.frame_count
                    );
                    self.input = None;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        if self.input.take().is_some() {
            log::info!(
                "VideoSource: closed {} after {} frames",
                self.uri,
                self.frame_count
            );
        }
    }
}
