use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use crate::decoder::chunks::{Chunk, ChunkKind, ChunkReader};
use crate::decoder::compositor::Compositor;
use crate::decoder::frame_control::{split_frame_data, FrameControl, Region, Sequencer};
use crate::decoder::header::{parse_palette, parse_transparency, AnimationControl, ColorType, ImageHeader, Transparency};
use crate::decoder::reconstruct::Reconstructor;
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::FrameImage;
use crate::utils::info::ImageInfo;
use crate::utils::options::LoaderOptions;
use crate::utils::source::{ByteSource, FileSource, MemorySource, StreamSource};

/// One fully composited frame. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    /// Full-canvas RGBA8 snapshot.
    pub image: FrameImage,
    pub delay_num: u16,
    pub delay_den: u16,
    /// True when this frame is the stream's default (non-animation) image.
    pub is_default: bool,
}

impl Frame {
    /// Display time of the frame; zero when no delay is specified.
    pub fn delay(&self) -> Duration {
        if self.delay_den == 0 {
            return Duration::ZERO;
        }

        Duration::from_nanos(self.delay_num as u64 * 1_000_000_000 / self.delay_den as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No acTL: the IDAT image is the one and only frame.
    PlainImage,
    /// acTL seen: frames come from fcTL groups.
    StreamingFrames,
    Exhausted,
}

/// Pull-based APNG/PNG decoder.
///
/// Opening reads the signature, `IHDR`, and every chunk up to the first image
/// data or frame control. Each [`next_frame`](ApngLoader::next_frame) call then
/// reads exactly one frame group, rebuilds its pixels and composites it.
pub struct ApngLoader<S: ByteSource> {
    chunks: ChunkReader<S>,
    options: LoaderOptions,
    header: ImageHeader,
    palette: Option<Vec<[u8; 3]>>,
    transparency: Option<Transparency>,
    animation: Option<AnimationControl>,
    // A chunk read one step too far, handed out again by next_chunk
    lookahead: Option<Chunk>,
    sequencer: Sequencer,
    compositor: Compositor,
    phase: Phase,
    next_index: u32,
    default_image_done: bool,
}

impl<S: ByteSource> fmt::Debug for ApngLoader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApngLoader")
            .field("header", &self.header)
            .field("animation", &self.animation)
            .field("phase", &self.phase)
            .field("next_index", &self.next_index)
            .field("position", &self.chunks.position())
            .finish()
    }
}

impl ApngLoader<FileSource> {
    pub fn open_from_file<P: AsRef<Path>>(path: P) -> ApngResult<ApngLoader<FileSource>> {
        Self::open_from_file_with_options(path, LoaderOptions::default())
    }

    pub fn open_from_file_with_options<P: AsRef<Path>>(
        path: P,
        options: LoaderOptions,
    ) -> ApngResult<ApngLoader<FileSource>> {
        ApngLoader::new(FileSource::open(path)?, options)
    }
}

impl<'a> ApngLoader<MemorySource<'a>> {
    pub fn open_from_memory(bytes: &'a [u8]) -> ApngResult<ApngLoader<MemorySource<'a>>> {
        Self::open_from_memory_with_options(bytes, LoaderOptions::default())
    }

    pub fn open_from_memory_with_options(
        bytes: &'a [u8],
        options: LoaderOptions,
    ) -> ApngResult<ApngLoader<MemorySource<'a>>> {
        ApngLoader::new(MemorySource::new(bytes), options)
    }
}

impl<R: Read> ApngLoader<StreamSource<R>> {
    /// Reads from any stream whose total length is `len` bytes.
    pub fn open_from_reader(reader: R, len: u64) -> ApngResult<ApngLoader<StreamSource<R>>> {
        ApngLoader::new(StreamSource::new(reader, len), LoaderOptions::default())
    }
}

impl<S: ByteSource> ApngLoader<S> {
    pub fn new(source: S, options: LoaderOptions) -> ApngResult<ApngLoader<S>> {
        let mut chunks = ChunkReader::new(source, options.max_chunk_length)?;

        let header = match chunks.next_chunk()? {
            Some(chunk) if chunk.kind == ChunkKind::Ihdr => ImageHeader::parse(&chunk.data, &options)?,
            Some(chunk) => {
                return Err(ApngError::MalformedStream(format!("First chunk must be IHDR, found {}", chunk.kind)));
            }
            None => return Err(ApngError::MalformedStream("Stream has no chunks".into())),
        };

        debug!(
            "IHDR: {}x{}, {:?} at {} bits, interlace: {}",
            header.width, header.height, header.color_type, header.bit_depth, header.interlace
        );

        let compositor = Compositor::new(header.width, header.height);

        let mut loader = ApngLoader {
            chunks,
            options,
            header,
            palette: None,
            transparency: None,
            animation: None,
            lookahead: None,
            sequencer: Sequencer::new(),
            compositor,
            phase: Phase::PlainImage,
            next_index: 0,
            default_image_done: false,
        };

        loader.read_preamble()?;

        if loader.animation.is_some() {
            loader.phase = Phase::StreamingFrames;
        }

        Ok(loader)
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Number of animation frames, 1 for plain images.
    pub fn num_frames(&self) -> u32 {
        self.animation.map_or(1, |actl| actl.num_frames)
    }

    /// Loop count, 0 means infinite.
    pub fn num_plays(&self) -> u32 {
        self.animation.map_or(0, |actl| actl.num_plays)
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    pub fn has_frame(&self) -> bool {
        self.phase != Phase::Exhausted && self.next_index < self.num_frames()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.header.width,
            height: self.header.height,
            bit_depth: self.header.bit_depth,
            color_type: self.header.color_type,
            interlace: self.header.interlace,
            animated: self.is_animated(),
            num_frames: self.num_frames(),
            num_plays: self.num_plays(),
            palette_len: self.palette.as_ref().map(|palette| palette.len()),
        }
    }

    /// Decodes and composites the next frame.
    ///
    /// Any error ends the iteration: later calls fail with [`ApngError::NoMoreFrames`].
    pub fn next_frame(&mut self) -> ApngResult<Frame> {
        if !self.has_frame() {
            return Err(ApngError::NoMoreFrames);
        }

        let result = match self.phase {
            Phase::PlainImage => self.read_plain_image(),
            Phase::StreamingFrames => self.read_animation_frame(),
            Phase::Exhausted => Err(ApngError::NoMoreFrames),
        };

        match result {
            Ok(frame) => {
                self.next_index += 1;

                if self.next_index >= self.num_frames() {
                    self.phase = Phase::Exhausted;
                }

                Ok(frame)
            }
            Err(e) => {
                warn!("Stopping at frame {}: {}", self.next_index, e);
                self.phase = Phase::Exhausted;
                Err(e)
            }
        }
    }

    fn next_chunk(&mut self) -> ApngResult<Option<Chunk>> {
        match self.lookahead.take() {
            Some(chunk) => Ok(Some(chunk)),
            None => self.chunks.next_chunk(),
        }
    }

    /// Reads everything between IHDR and the first IDAT or fcTL.
    fn read_preamble(&mut self) -> ApngResult<()> {
        loop {
            let chunk = self
                .next_chunk()?
                .ok_or_else(|| ApngError::MalformedStream("Stream ends before any image data".into()))?;

            match chunk.kind {
                ChunkKind::Plte => {
                    if self.palette.is_some() {
                        return Err(ApngError::MalformedStream("Duplicate PLTE chunk".into()));
                    }

                    match self.header.color_type {
                        ColorType::Grayscale | ColorType::GrayscaleAlpha => {
                            warn!("Ignoring PLTE chunk in a grayscale image");
                        }
                        _ => self.palette = Some(parse_palette(&chunk.data)?),
                    }
                }
                ChunkKind::Trns => {
                    self.transparency =
                        parse_transparency(&chunk.data, self.header.color_type, self.palette.as_deref())?;
                }
                ChunkKind::Actl => {
                    if self.animation.is_some() {
                        return Err(ApngError::MalformedStream("Duplicate acTL chunk".into()));
                    }

                    let actl = AnimationControl::parse(&chunk.data)?;
                    debug!("acTL: {} frames, {} plays", actl.num_frames, actl.num_plays);
                    self.animation = Some(actl);
                }
                ChunkKind::Idat | ChunkKind::Fctl => {
                    self.lookahead = Some(chunk);
                    break;
                }
                ChunkKind::Fdat => {
                    return Err(ApngError::MalformedStream("fdAT chunk before any fcTL chunk".into()));
                }
                ChunkKind::Ihdr => return Err(ApngError::MalformedStream("Duplicate IHDR chunk".into())),
                ChunkKind::Iend => {
                    return Err(ApngError::MalformedStream("IEND before any image data".into()));
                }
                ChunkKind::Ignored(_) => self.skip_chunk(&chunk),
            }
        }

        if self.header.color_type == ColorType::Indexed && self.palette.is_none() {
            return Err(ApngError::MalformedStream("Indexed image without PLTE chunk".into()));
        }

        Ok(())
    }

    fn skip_chunk(&self, chunk: &Chunk) {
        if chunk.kind.is_critical() {
            warn!("Skipping unknown critical chunk {}", chunk.kind);
        } else {
            debug!("Skipping chunk {}", chunk.kind);
        }
    }

    fn reconstructor(&self) -> Reconstructor<'_> {
        Reconstructor::new(&self.header, self.palette.as_deref(), self.transparency.as_ref())
    }

    /// Collects the payloads of one run of consecutive IDAT chunks.
    fn collect_idat_run(&mut self) -> ApngResult<Vec<u8>> {
        let mut data = Vec::new();
        let mut started = false;

        while let Some(chunk) = self.next_chunk()? {
            match chunk.kind {
                ChunkKind::Idat => {
                    started = true;
                    data.extend_from_slice(&chunk.data);
                }
                _ if started => {
                    if chunk.kind == ChunkKind::Actl && self.animation.is_none() {
                        warn!("Ignoring acTL chunk after image data");
                    }

                    self.lookahead = Some(chunk);
                    break;
                }
                ChunkKind::Fctl | ChunkKind::Fdat => {
                    warn!("Ignoring {} chunk in a stream without acTL", chunk.kind);
                }
                ChunkKind::Iend => break,
                _ => self.skip_chunk(&chunk),
            }
        }

        if !started {
            return Err(ApngError::MalformedStream("Stream has no IDAT chunk".into()));
        }

        Ok(data)
    }

    fn read_plain_image(&mut self) -> ApngResult<Frame> {
        let data = self.collect_idat_run()?;
        let image = self.reconstructor().reconstruct(&data, self.header.width, self.header.height)?;

        self.default_image_done = true;

        Ok(Frame {
            index: 0,
            image,
            delay_num: 0,
            delay_den: 0,
            is_default: true,
        })
    }

    fn read_animation_frame(&mut self) -> ApngResult<Frame> {
        let control = self.read_frame_control()?;
        let (data, is_default) = self.collect_frame_group()?;

        if data.is_empty() {
            return Err(ApngError::MalformedStream(format!("Frame {} has no image data", self.next_index)));
        }

        if is_default && control.region != Region::full(self.header.width, self.header.height) {
            return Err(ApngError::MalformedStream(
                "fcTL of the default image must cover the whole canvas".into(),
            ));
        }

        debug!(
            "Frame {}: {:?}, {:?}/{:?}, {} bytes read up to offset {}{}",
            self.next_index,
            control.region,
            control.dispose_op,
            control.blend_op,
            data.len(),
            self.chunks.position(),
            if is_default { ", default image" } else { "" }
        );

        let region = control.region;
        let pixels = self.reconstructor().reconstruct(&data, region.width, region.height)?;
        let image = self.compositor.compose(&control, &pixels);

        Ok(Frame {
            index: self.next_index,
            image,
            delay_num: control.delay_num,
            delay_den: self.options.zero_denominator.resolve(control.delay_num, control.delay_den),
            is_default,
        })
    }

    /// Advances to the next fcTL, decoding (and dropping) a default image that is not a frame.
    fn read_frame_control(&mut self) -> ApngResult<FrameControl> {
        loop {
            let chunk = match self.next_chunk()? {
                Some(chunk) => chunk,
                None => return Err(self.missing_frames()),
            };

            match chunk.kind {
                ChunkKind::Fctl => {
                    let control = FrameControl::parse(&chunk.data, self.header.width, self.header.height)?;
                    self.sequencer.expect(control.sequence_number)?;

                    return Ok(control);
                }
                ChunkKind::Idat if !self.default_image_done => {
                    self.lookahead = Some(chunk);
                    self.skip_default_image()?;
                }
                ChunkKind::Idat => {
                    return Err(ApngError::MalformedStream("IDAT chunk after the default image".into()));
                }
                ChunkKind::Fdat => {
                    return Err(ApngError::MalformedStream("fdAT chunk without a preceding fcTL".into()));
                }
                ChunkKind::Iend => return Err(self.missing_frames()),
                ChunkKind::Ihdr => return Err(ApngError::MalformedStream("Duplicate IHDR chunk".into())),
                ChunkKind::Plte | ChunkKind::Trns | ChunkKind::Actl => {
                    warn!("Ignoring {} chunk after image data", chunk.kind);
                }
                ChunkKind::Ignored(_) => self.skip_chunk(&chunk),
            }
        }
    }

    /// The IDAT image precedes every fcTL, so it is only shown by viewers without APNG support.
    fn skip_default_image(&mut self) -> ApngResult<()> {
        let data = self.collect_idat_run()?;
        self.reconstructor().reconstruct(&data, self.header.width, self.header.height)?;
        self.default_image_done = true;

        debug!("Decoded default image ({} bytes), not part of the animation", data.len());

        Ok(())
    }

    /// Gathers the image data following an fcTL, up to the next fcTL or the end of the stream.
    fn collect_frame_group(&mut self) -> ApngResult<(Vec<u8>, bool)> {
        let mut data = Vec::new();
        let mut has_idat = false;
        let mut has_fdat = false;

        while let Some(chunk) = self.next_chunk()? {
            match chunk.kind {
                ChunkKind::Idat => {
                    if self.default_image_done || has_fdat {
                        return Err(ApngError::MalformedStream("IDAT chunk after the default image".into()));
                    }

                    has_idat = true;
                    data.extend_from_slice(&chunk.data);
                }
                ChunkKind::Fdat => {
                    if has_idat {
                        return Err(ApngError::MalformedStream("Frame mixes IDAT and fdAT chunks".into()));
                    }

                    let (sequence_number, frame_data) = split_frame_data(&chunk.data)?;
                    self.sequencer.expect(sequence_number)?;

                    has_fdat = true;
                    data.extend_from_slice(frame_data);
                }
                ChunkKind::Fctl => {
                    self.lookahead = Some(chunk);
                    break;
                }
                ChunkKind::Iend => break,
                ChunkKind::Ihdr => return Err(ApngError::MalformedStream("Duplicate IHDR chunk".into())),
                ChunkKind::Plte | ChunkKind::Trns | ChunkKind::Actl => {
                    warn!("Ignoring {} chunk after image data", chunk.kind);
                }
                ChunkKind::Ignored(_) => self.skip_chunk(&chunk),
            }
        }

        self.default_image_done = true;

        Ok((data, has_idat))
    }

    fn missing_frames(&self) -> ApngError {
        ApngError::MalformedStream(format!(
            "acTL declares {} frames, stream ends after {}",
            self.num_frames(),
            self.next_index
        ))
    }
}

impl<S: ByteSource> Iterator for ApngLoader<S> {
    type Item = ApngResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_frame() {
            return None;
        }

        Some(self.next_frame())
    }
}
