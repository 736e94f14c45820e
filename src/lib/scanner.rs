//! Scanner adapter. A [`ScanWidget`] does the decoding; this module attaches
//! it to a page region and paces what it decodes.
use std::time::Duration;

use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    time::{self, MissedTickBehavior},
};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};

use crate::page::Page;

/// Prefix `zbarcam` and similar decoders put in front of QR payloads.
const SYMBOLOGY_PREFIX: &str = "QR-Code:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Upper bound on decoded frames forwarded per second.
    pub fps: u32,
    /// Side of the square detection box, in pixels.
    pub qrbox: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { fps: 10, qrbox: 250 }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScannerError {
    #[error("scan region {0:?} is not on the page")]
    MissingElement(String),
    #[error("scanner fps must be greater than zero")]
    ZeroFps,
    #[error("scanner fps {0} is too high, at most one code per nanosecond")]
    FpsTooHigh(u32),
}

/// The decoding widget. Frames that fail to decode never reach the stream.
pub trait ScanWidget {
    fn render(self, config: ScannerConfig) -> BoxStream<'static, String>;
}

/// Reads already-decoded codes line by line, e.g. from a keyboard-wedge
/// scanner or `zbarcam --raw` piped into stdin.
pub struct LineWidget<R> {
    reader: R,
}

impl<R> LineWidget<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> ScanWidget for LineWidget<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn render(self, config: ScannerConfig) -> BoxStream<'static, String> {
        debug!("rendering line scanner with a {}px box", config.qrbox);

        LinesStream::new(BufReader::new(self.reader).lines())
            .take_while(|line| {
                let keep = match line {
                    Ok(_) => true,
                    Err(err) => {
                        warn!("scanner input failed: {err}");
                        false
                    }
                };
                futures::future::ready(keep)
            })
            .filter_map(|line| futures::future::ready(line.ok().and_then(|l| decode_line(&l))))
            .boxed()
    }
}

fn decode_line(line: &str) -> Option<String> {
    let line = line.trim();
    let code = line.strip_prefix(SYMBOLOGY_PREFIX).unwrap_or(line).trim();

    (!code.is_empty()).then(|| code.to_owned())
}

/// An active scanner attached to a page region.
pub struct Scanner {
    codes: BoxStream<'static, String>,
}

impl Scanner {
    /// Hands each decoded code to `on_decoded` until the widget stops.
    pub async fn render<F>(mut self, mut on_decoded: F)
    where
        F: FnMut(String),
    {
        while let Some(code) = self.codes.next().await {
            on_decoded(code);
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, String> {
        self.codes
    }
}

/// Activates `widget` on the page region `element_id`. Decoded codes are
/// let through at most `config.fps` times per second.
pub fn init_scanner<W>(
    page: &dyn Page,
    element_id: &str,
    config: ScannerConfig,
    widget: W,
) -> Result<Scanner, ScannerError>
where
    W: ScanWidget,
{
    if !page.has_element(element_id) {
        return Err(ScannerError::MissingElement(element_id.to_owned()));
    }

    if config.fps == 0 {
        return Err(ScannerError::ZeroFps);
    }

    let period = Duration::from_secs(1) / config.fps;
    if period.is_zero() {
        return Err(ScannerError::FpsTooHigh(config.fps));
    }

    info!(
        "scanner active on {element_id:?} at {} fps, {}px box",
        config.fps, config.qrbox
    );

    let codes = paced(widget.render(config), period);

    Ok(Scanner { codes })
}

fn paced<S>(codes: S, period: Duration) -> BoxStream<'static, String>
where
    S: Stream<Item = String> + Unpin + Send + 'static,
{
    let mut ticks = time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold((codes, ticks), |(mut codes, mut ticks)| async move {
        let code = codes.next().await?;
        ticks.tick().await;
        Some((code, (codes, ticks)))
    })
    .boxed()
}
