//! Board assembly: owns every layer stream and the deferred draw queue, and
//! lays out blocks of cells in two phases separated by queue flushes.

use std::io::Write;

use log::{debug, info, warn};

use crate::config::{BlockConfig, BoardConfig};
use crate::error::GerberError;
use crate::features::{JumperOrientation, SolderJumper, Via};
use crate::geometry::{vector, Vector};
use crate::gerber::GerberWriter;
use crate::layers::{Layer, COPPER_LAYERS};
use crate::queue::DrawQueue;

/// Aperture function tag for the board outline.
pub const PROFILE_FUNCTION: &str = "Profile";

/// Board-wide dimensions every feature generator reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardSettings {
    pub raster: f64,
    pub soldermask_expansion: f64,
    pub copper_layers: usize,
}

impl BoardSettings {
    /// Stackup index of the bottom copper layer.
    pub fn bottom_copper(&self) -> usize {
        self.copper_layers.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), GerberError> {
        crate::features::require_positive("raster", self.raster)?;
        if !(self.soldermask_expansion.is_finite() && self.soldermask_expansion >= 0.0) {
            return Err(GerberError::Config(format!(
                "soldermask expansion must not be negative, got {}",
                self.soldermask_expansion
            )));
        }
        if self.copper_layers != COPPER_LAYERS {
            return Err(GerberError::Config(format!(
                "only {COPPER_LAYERS} copper layers are supported, got {}",
                self.copper_layers
            )));
        }
        Ok(())
    }
}

/// How the layer streams were started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// New files: write the X2 file attributes and the format header.
    Fresh,
    /// Appending to copied base files whose header is already in place.
    Continue,
}

/// One writer per [`Layer`].
#[derive(Debug)]
pub struct LayerSet<W: Write> {
    // Indexed by `Layer as usize`
    writers: Vec<GerberWriter<W>>,
}

impl<W: Write> LayerSet<W> {
    /// Open a writer for every layer. If any open fails, the writers opened
    /// so far are flushed and dropped before the error is returned.
    pub fn open<F>(mut open: F) -> Result<Self, GerberError>
    where
        F: FnMut(Layer) -> Result<GerberWriter<W>, GerberError>,
    {
        let mut writers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            match open(layer) {
                Ok(writer) => writers.push(writer),
                Err(e) => {
                    warn!("failed to open {layer}: {e}");
                    Self { writers }.abandon();
                    return Err(e);
                }
            }
        }
        Ok(Self { writers })
    }

    pub fn get(&mut self, layer: Layer) -> &mut GerberWriter<W> {
        &mut self.writers[layer as usize]
    }

    pub fn copper(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        Ok(self.get(Layer::copper(index)?))
    }

    pub fn mask(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        Ok(self.get(Layer::mask(index)?))
    }

    pub fn silk(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        Ok(self.get(Layer::silk(index)?))
    }

    /// Terminate every stream. Streams after a failing one are abandoned.
    pub fn finish(self) -> Result<Vec<(Layer, W)>, GerberError> {
        let mut finished = Vec::with_capacity(self.writers.len());
        let mut writers = Layer::ALL.into_iter().zip(self.writers);
        while let Some((layer, writer)) = writers.next() {
            match writer.finish() {
                Ok(out) => finished.push((layer, out)),
                Err(e) => {
                    warn!("failed to finish {layer}: {e}");
                    for (layer, rest) in writers.by_ref() {
                        if let Err(e) = rest.abandon() {
                            warn!("failed to flush {layer}: {e}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(finished)
    }

    /// Flush every stream without terminating it.
    pub fn abandon(self) {
        for (layer, writer) in Layer::ALL.into_iter().zip(self.writers) {
            if let Err(e) = writer.abandon() {
                warn!("failed to flush {layer}: {e}");
            }
        }
    }
}

/// The layer streams of one board plus the queue of deferred fills.
#[derive(Debug)]
pub struct Board<W: Write> {
    layers: LayerSet<W>,
    queue: DrawQueue<LayerSet<W>>,
    settings: BoardSettings,
}

impl<W: Write> Board<W> {
    pub fn new(layers: LayerSet<W>, settings: BoardSettings) -> Self {
        Self {
            layers,
            queue: DrawQueue::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub fn layer(&mut self, layer: Layer) -> &mut GerberWriter<W> {
        self.layers.get(layer)
    }

    pub fn copper(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        self.layers.copper(index)
    }

    pub fn mask(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        self.layers.mask(index)
    }

    pub fn silk(&mut self, index: usize) -> Result<&mut GerberWriter<W>, GerberError> {
        self.layers.silk(index)
    }

    /// Queue drawing work for the next [`Self::flush`].
    pub fn defer<F>(&mut self, op: F)
    where
        F: FnOnce(&mut LayerSet<W>) -> Result<(), GerberError> + 'static,
    {
        self.queue.enqueue(op);
    }

    /// Number of queued operations.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn flush(&mut self) -> Result<(), GerberError> {
        self.queue.flush_all(&mut self.layers)
    }

    pub fn write_headers(&mut self, mode: HeaderMode) -> Result<(), GerberError> {
        debug!("writing {mode:?} headers");
        for layer in Layer::ALL {
            let g = self.layers.get(layer);
            match mode {
                HeaderMode::Fresh => {
                    for attr in layer.file_attributes() {
                        g.file_attribute(attr)?;
                    }
                    g.finish_header()?;
                }
                HeaderMode::Continue => {
                    g.dark()?;
                }
            }
        }
        Ok(())
    }

    /// Draw one block of cells.
    ///
    /// Pads and inner pours go down first. After a flush every jumper and
    /// via cuts its clearance, and the final flush adds their copper back
    /// so no clearance lands on a neighbour's fill.
    pub fn draw_block(&mut self, block: &BlockConfig, via: &Via) -> Result<(), GerberError> {
        let r = self.settings.raster;
        let bottom = self.settings.bottom_copper();
        let origin = vector(block.origin[0] as f64 * r, block.origin[1] as f64 * r);
        let cell = |ix: usize, iy: usize| origin + vector(ix as f64 * r, iy as f64 * r);
        info!(
            "drawing {}x{} block at cell {:?}",
            block.width, block.height, block.origin
        );

        for ix in 0..block.width {
            for iy in 0..block.height {
                block.pad.place(self, 0, cell(ix, iy), true)?;
                block.pad.place(self, bottom, cell(ix, iy), false)?;
            }
        }

        // copper pours
        let size = vector(block.width as f64 * r, block.height as f64 * r);
        for i in 1..bottom {
            self.copper(i)?.dark()?.contour(|g| {
                g.move_to(origin)?.linear_interpolation()?;
                g.interpolate(origin + vector(size.x, 0.0))?;
                g.interpolate(origin + size)?;
                g.interpolate(origin + vector(0.0, size.y))?;
                Ok(())
            })?;
        }

        self.flush()?;

        let jumper = &block.jumper;
        for ix in 0..block.width {
            for iy in 0..block.height {
                let corner = cell(ix, iy);

                // pad-to-pad jumpers
                if ix > 0 && iy > 0 {
                    for copper in [0, bottom] {
                        jumper.place(
                            self,
                            copper,
                            corner + vector(0.0, r / 2.0),
                            JumperOrientation::Horizontal,
                        )?;
                        jumper.place(
                            self,
                            copper,
                            corner + vector(r / 2.0, 0.0),
                            JumperOrientation::Vertical,
                        )?;
                    }
                }

                // pad-to-via jumper
                let pad_center = corner + vector(r / 2.0, r / 2.0);
                jumper.place(self, bottom, pad_center, JumperOrientation::Center)?;

                let via_at = corner + vector(0.0, r);
                let assigned = via_layer(ix, iy);
                let connection_length =
                    (pad_center - via_at).length() - jumper.connection_distance() / 2.0;
                via.place(self, assigned, via_at, connection_length, -45.0)?;
            }
        }

        self.flush()
    }

    /// Rectangle on the edge cuts layer from `min` to `max`.
    pub fn draw_outline(&mut self, min: Vector, max: Vector, width: f64) -> Result<(), GerberError> {
        debug!("outline {min:?} to {max:?}");
        self.layer(Layer::EdgeCuts)
            .dark()?
            .circle_with_function(width, PROFILE_FUNCTION)?
            .linear_interpolation()?
            .move_to(min)?
            .interpolate(vector(max.x, min.y))?
            .interpolate(max)?
            .interpolate(vector(min.x, max.y))?
            .interpolate(min)?;
        Ok(())
    }

    /// Draw everything `config` describes.
    pub fn draw(&mut self, config: &BoardConfig) -> Result<(), GerberError> {
        for block in &config.blocks {
            self.draw_block(block, &config.via)?;
        }
        if let (Some(outline), Some((min, max))) = (config.outline, config.extent()) {
            let m = outline.margin;
            self.draw_outline(
                vector(min[0] - m, min[1] - m),
                vector(max[0] + m, max[1] + m),
                outline.line_width,
            )?;
        }
        Ok(())
    }

    /// Run whatever is still queued, then terminate every stream.
    pub fn finish(mut self) -> Result<Vec<(Layer, W)>, GerberError> {
        if let Err(e) = self.flush() {
            self.layers.abandon();
            return Err(e);
        }
        self.layers.finish()
    }

    /// Flush every stream without terminating it, dropping queued work.
    pub fn abandon(self) {
        if !self.queue.is_empty() {
            warn!("dropping {} queued operation(s)", self.queue.len());
        }
        self.layers.abandon();
    }
}

/// Copper layer a cell's via connects to: inner layers on a checkerboard,
/// the top layer elsewhere.
fn via_layer(ix: usize, iy: usize) -> usize {
    match (ix % 2, iy % 2) {
        (1, 0) => 1,
        (0, 1) => 2,
        _ => 0,
    }
}

/// Open every layer, draw `config` and terminate the streams.
///
/// On failure every stream opened so far is flushed but left without an
/// end-of-file marker.
pub fn render<W, F>(
    config: &BoardConfig,
    mode: HeaderMode,
    open: F,
) -> Result<Vec<(Layer, W)>, GerberError>
where
    W: Write,
    F: FnMut(Layer) -> Result<GerberWriter<W>, GerberError>,
{
    config.validate()?;
    let layers = LayerSet::open(open)?;
    let mut board = Board::new(layers, config.settings());
    let drawn = board
        .write_headers(mode)
        .and_then(|()| board.draw(config));
    match drawn {
        Ok(()) => board.finish(),
        Err(e) => {
            warn!("aborting board: {e}");
            board.abandon();
            Err(e)
        }
    }
}
