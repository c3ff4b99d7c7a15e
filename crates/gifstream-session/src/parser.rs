use std::sync::Arc;
use std::time::Duration;

use gifstream_codec::blocks::{APPLICATION_SIZE, GRAPHIC_CONTROL_SIZE};
use gifstream_codec::{
    lzw, ApplicationExtension, BlockTag, Canvas, ExtensionLabel, GraphicControl, Header,
    ImageDescriptor, Palette, ScreenDescriptor,
};
use gifstream_sched::{DeadlineScheduler, StreamReader};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};
use crate::presenter::{Presenter, SessionId};

/// What a completed stream contained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub version: String,
    pub width: u16,
    pub height: u16,
    /// Frames delivered to the presenter.
    pub frames: u64,
    /// Loop count from a NETSCAPE extension, if present (0 = forever).
    pub loop_count: Option<u16>,
    /// Comment, plain-text and unrecognised extensions skipped.
    pub extensions_skipped: u64,
    /// Image blocks that decoded to no pixels.
    pub empty_images: u64,
}

/// Parses one GIF stream from a [`StreamReader`] and presents its frames.
///
/// Every read may suspend on the network scheduler; each frame delay
/// suspends on the deadline scheduler. The parser owns the canvas, so
/// composition needs no locking.
pub struct StreamParser {
    reader: StreamReader,
    deadline: Arc<DeadlineScheduler>,
    presenter: Arc<dyn Presenter>,
    session: SessionId,
    honour_delays: bool,
    pending_control: Option<GraphicControl>,
    summary: StreamSummary,
}

impl StreamParser {
    pub fn new(
        reader: StreamReader,
        deadline: Arc<DeadlineScheduler>,
        presenter: Arc<dyn Presenter>,
        session: SessionId,
    ) -> Self {
        Self {
            reader,
            deadline,
            presenter,
            session,
            honour_delays: true,
            pending_control: None,
            summary: StreamSummary::default(),
        }
    }

    /// Present frames without waiting for their delays.
    pub fn with_honour_delays(mut self, honour: bool) -> Self {
        self.honour_delays = honour;
        self
    }

    /// Parse to the trailer.
    pub async fn run(mut self) -> Result<StreamSummary> {
        let header = Header::parse(&self.read_array("header").await?);
        if !header.has_gif_signature() {
            debug!(session = %self.session, signature = ?header.signature, "unexpected signature");
        }
        self.summary.version = header.version_str();

        let screen = ScreenDescriptor::parse(&self.read_array("screen descriptor").await?);
        self.summary.width = screen.width;
        self.summary.height = screen.height;
        let global = match screen.global_palette_len() {
            Some(len) => Some(self.read_palette(len, "global palette").await?),
            None => None,
        };
        debug!(
            session = %self.session,
            width = screen.width,
            height = screen.height,
            global_colors = global.as_ref().map_or(0, Palette::len),
            "stream header parsed"
        );

        let mut canvas = Canvas::new(screen.width, screen.height);
        loop {
            let tag = self.read_byte("block tag").await?;
            match BlockTag::from_byte(tag) {
                Some(BlockTag::Trailer) => break,
                Some(BlockTag::Image) => self.image(&mut canvas, global.as_ref()).await?,
                Some(BlockTag::Extension) => self.extension().await?,
                None => return Err(SessionError::UnknownBlockTag(tag)),
            }
        }

        debug!(session = %self.session, frames = self.summary.frames, "trailer reached");
        Ok(self.summary)
    }

    async fn image(&mut self, canvas: &mut Canvas, global: Option<&Palette>) -> Result<()> {
        let descriptor = ImageDescriptor::parse(&self.read_array("image descriptor").await?);
        let local = match descriptor.local_palette_len() {
            Some(len) => Some(self.read_palette(len, "local palette").await?),
            None => None,
        };
        let min_code_size = self.read_byte("minimum code size").await?;
        let data = self.read_sub_blocks("image data").await?;
        let control = self.pending_control.take();

        let indices = lzw::decode(&data, min_code_size)?;
        if indices.is_empty() {
            self.summary.empty_images += 1;
            debug!(session = %self.session, "image block without pixels skipped");
            return Ok(());
        }
        if descriptor.is_interlaced() {
            trace!(session = %self.session, "interlaced image composed in stored row order");
        }

        let palette = local.as_ref().or(global);
        let stats = canvas.compose(
            &descriptor,
            &indices,
            palette,
            control.and_then(|c| c.transparency()),
        );
        trace!(
            session = %self.session,
            written = stats.written,
            transparent = stats.transparent,
            clipped = stats.clipped,
            fallback = stats.fallback,
            "frame composed"
        );

        let delay = match control {
            Some(control) if self.honour_delays => control.delay(),
            _ => Duration::ZERO,
        };
        debug!(
            session = %self.session,
            frame = self.summary.frames,
            delay_ms = delay.as_millis() as u64,
            "frame ready"
        );
        self.deadline.sleep(delay).await;

        self.presenter
            .deliver_frame(canvas.pixels(), canvas.width(), canvas.height(), self.session);
        self.summary.frames += 1;
        Ok(())
    }

    async fn extension(&mut self) -> Result<()> {
        let label = ExtensionLabel::from(self.read_byte("extension label").await?);
        match label {
            ExtensionLabel::GraphicControl => {
                let size = self.read_byte("graphic control size").await?;
                if size != GRAPHIC_CONTROL_SIZE {
                    return Err(SessionError::MalformedEnvelope {
                        block: "graphic control",
                        detail: format!("size byte {size}, expected {GRAPHIC_CONTROL_SIZE}"),
                    });
                }
                let control = GraphicControl::parse(&self.read_array("graphic control").await?);
                let terminator = self.read_byte("graphic control terminator").await?;
                if terminator != 0 {
                    return Err(SessionError::MalformedEnvelope {
                        block: "graphic control",
                        detail: format!("terminator byte {terminator}, expected 0"),
                    });
                }
                trace!(session = %self.session, delay = control.delay_hundredths, "graphic control");
                self.pending_control = Some(control);
            }
            ExtensionLabel::Application => {
                let size = self.read_byte("application extension size").await?;
                if size != APPLICATION_SIZE {
                    return Err(SessionError::MalformedEnvelope {
                        block: "application extension",
                        detail: format!("size byte {size}, expected {APPLICATION_SIZE}"),
                    });
                }
                let app =
                    ApplicationExtension::parse(&self.read_array("application extension").await?);
                let data = self.read_sub_blocks("application data").await?;
                match app.loop_count(&data) {
                    Some(count) => {
                        debug!(session = %self.session, loop_count = count, "loop count");
                        self.summary.loop_count = Some(count);
                    }
                    None => self.summary.extensions_skipped += 1,
                }
            }
            ExtensionLabel::Comment | ExtensionLabel::PlainText | ExtensionLabel::Other(_) => {
                let skipped = self.skip_sub_blocks("extension data").await?;
                trace!(session = %self.session, ?label, bytes = skipped, "extension skipped");
                self.summary.extensions_skipped += 1;
            }
        }
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> Result<()> {
        let actual = self.reader.read(buf).await;
        if actual < buf.len() {
            return Err(self.short_read(context, buf.len(), actual));
        }
        Ok(())
    }

    async fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf, context).await?;
        Ok(buf)
    }

    async fn read_byte(&mut self, context: &'static str) -> Result<u8> {
        let [byte] = self.read_array::<1>(context).await?;
        Ok(byte)
    }

    async fn read_palette(&mut self, len: usize, context: &'static str) -> Result<Palette> {
        let mut raw = vec![0u8; len];
        self.read_exact(&mut raw, context).await?;
        Ok(Palette::from_bytes(&raw)?)
    }

    /// Concatenate a sub-block stream's payloads.
    async fn read_sub_blocks(&mut self, context: &'static str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let len = usize::from(self.read_byte(context).await?);
            if len == 0 {
                return Ok(data);
            }
            let start = data.len();
            data.resize(start + len, 0);
            self.read_exact(&mut data[start..], context).await?;
        }
    }

    async fn skip_sub_blocks(&mut self, context: &'static str) -> Result<usize> {
        let mut skipped = 0;
        let mut buf = [0u8; 255];
        loop {
            let len = usize::from(self.read_byte(context).await?);
            if len == 0 {
                return Ok(skipped);
            }
            self.read_exact(&mut buf[..len], context).await?;
            skipped += len;
        }
    }

    fn short_read(&self, context: &'static str, expected: usize, actual: usize) -> SessionError {
        match self.reader.failure() {
            Some(reason) => SessionError::TransferFailed {
                origin: self.reader.source().to_string(),
                reason,
            },
            None => SessionError::ShortRead {
                context,
                expected,
                actual,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_with_field_names() {
        let summary = StreamSummary {
            version: "89a".into(),
            width: 10,
            height: 4,
            frames: 2,
            loop_count: Some(0),
            extensions_skipped: 1,
            empty_images: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["version"], "89a");
        assert_eq!(json["frames"], 2);
        assert_eq!(json["loop_count"], 0);
        assert_eq!(json["extensions_skipped"], 1);
    }
}
