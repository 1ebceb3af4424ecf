//! In-process H.264 encoder via rsmpeg (`native-encoder` feature).

use std::ffi::{CStr, CString};
use std::path::Path;

use image::RgbImage;
use rsmpeg::{
    avcodec::{AVCodec, AVCodecContext},
    avformat::AVFormatContextOutput,
    avutil::{AVFrame, AVRational},
    error::RsmpegError,
    ffi,
};

use super::encoder::{FrameSink, VideoConfig, VideoError};

/// Writes frames straight into a video-only H.264 file, no child process.
pub struct NativeEncoder {
    format_ctx: AVFormatContextOutput,
    codec_ctx: AVCodecContext,
    frame: AVFrame,
    config: VideoConfig,
    pts: i64,
    stream_index: i32,
    finished: bool,
}

impl NativeEncoder {
    pub fn new<P: AsRef<Path>>(path: P, config: VideoConfig) -> Result<Self, VideoError> {
        let path_str = path.as_ref().to_string_lossy();
        let path_cstring = CString::new(path_str.as_bytes())
            .map_err(|_| VideoError::FileOpen(path_str.to_string()))?;

        let codec = AVCodec::find_encoder_by_name(c"libx264")
            .ok_or_else(|| VideoError::CodecNotFound("libx264".to_string()))?;

        let mut format_ctx = AVFormatContextOutput::create(&path_cstring)?;

        let mut codec_ctx = AVCodecContext::new(&codec);
        codec_ctx.set_width(config.width as i32);
        codec_ctx.set_height(config.height as i32);
        codec_ctx.set_pix_fmt(ffi::AV_PIX_FMT_YUV420P);
        codec_ctx.set_time_base(AVRational {
            num: 1,
            den: config.fps as i32,
        });
        codec_ctx.set_framerate(AVRational {
            num: config.fps as i32,
            den: 1,
        });

        let crf = CString::new(config.crf.to_string())
            .map_err(|e| VideoError::Encoding(e.to_string()))?;
        let preset = CString::new(config.preset.as_str())
            .map_err(|e| VideoError::Encoding(e.to_string()))?;
        set_private_option(&mut codec_ctx, c"crf", &crf);
        set_private_option(&mut codec_ctx, c"preset", &preset);

        codec_ctx.open(None)?;

        let stream_index = {
            let mut stream = format_ctx.new_stream();
            stream.set_codecpar(codec_ctx.extract_codecpar());
            stream.set_time_base(codec_ctx.time_base);
            stream.index
        };

        format_ctx.write_header(&mut None)?;

        let mut frame = AVFrame::new();
        frame.set_format(ffi::AV_PIX_FMT_YUV420P);
        frame.set_width(config.width as i32);
        frame.set_height(config.height as i32);
        frame.alloc_buffer()?;

        Ok(Self {
            format_ctx,
            codec_ctx,
            frame,
            config,
            pts: 0,
            stream_index,
            finished: false,
        })
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Move every packet the encoder has ready into the container.
    fn drain_packets(&mut self) -> Result<(), VideoError> {
        let stream_time_base = self
            .format_ctx
            .streams()
            .get(self.stream_index as usize)
            .map(|stream| stream.time_base)
            .ok_or_else(|| VideoError::Encoding("output stream missing".to_string()))?;

        loop {
            let mut packet = match self.codec_ctx.receive_packet() {
                Ok(p) => p,
                Err(RsmpegError::EncoderDrainError) | Err(RsmpegError::EncoderFlushedError) => {
                    break
                }
                Err(e) => return Err(e.into()),
            };

            packet.set_stream_index(self.stream_index);
            packet.rescale_ts(self.codec_ctx.time_base, stream_time_base);
            self.format_ctx.interleaved_write_frame(&mut packet)?;
        }
        Ok(())
    }

    /// BT.601 RGB to YUV420P, chroma sampled from the top-left of each 2x2 block.
    fn fill_yuv420p(&mut self, rgb: &RgbImage) {
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let raw = rgb.as_raw();
        let y_plane = self.frame.data[0];
        let u_plane = self.frame.data[1];
        let v_plane = self.frame.data[2];
        let y_stride = self.frame.linesize[0] as usize;
        let u_stride = self.frame.linesize[1] as usize;
        let v_stride = self.frame.linesize[2] as usize;

        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) * 3;
                let r = raw[idx] as f32;
                let g = raw[idx + 1] as f32;
                let b = raw[idx + 2] as f32;

                let y_val = (0.299 * r + 0.587 * g + 0.114 * b) as u8;
                // SAFETY: the frame buffer was allocated for width x height YUV420P.
                unsafe {
                    *y_plane.add(y * y_stride + x) = y_val;
                }

                if x % 2 == 0 && y % 2 == 0 {
                    let u_val = (128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b) as u8;
                    let v_val = (128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b) as u8;
                    unsafe {
                        *u_plane.add((y / 2) * u_stride + (x / 2)) = u_val;
                        *v_plane.add((y / 2) * v_stride + (x / 2)) = v_val;
                    }
                }
            }
        }
    }
}

fn set_private_option(codec_ctx: &mut AVCodecContext, key: &CStr, value: &CStr) {
    unsafe {
        ffi::av_opt_set(
            codec_ctx.as_mut_ptr() as *mut _,
            key.as_ptr(),
            value.as_ptr(),
            ffi::AV_OPT_SEARCH_CHILDREN as i32,
        );
    }
}

impl FrameSink for NativeEncoder {
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        if self.finished {
            return Err(VideoError::Finished);
        }
        let expected = (self.config.width, self.config.height);
        if frame.dimensions() != expected {
            return Err(VideoError::FrameSize {
                expected,
                actual: frame.dimensions(),
            });
        }

        self.fill_yuv420p(&frame);
        self.frame.set_pts(self.pts);
        self.pts += 1;

        self.codec_ctx.send_frame(Some(&self.frame))?;
        self.drain_packets()
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.codec_ctx.send_frame(None)?;
        self.drain_packets()?;
        self.format_ctx.write_trailer()?;
        Ok(())
    }
}
