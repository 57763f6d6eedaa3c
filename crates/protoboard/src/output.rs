//! Writing a board to disk: one Gerber file per layer, optionally continuing
//! from earlier files, plus zip bundling and read-back checks.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use uuid::Uuid;

use crate::board::{render, HeaderMode};
use crate::config::BoardConfig;
use crate::error::GerberError;
use crate::gerber::interpreter::LayerReport;
use crate::gerber::{check, GerberWriter};
use crate::layers::{identify_from_filename, Layer};

/// Where layer files go and, when continuing, where their bases are read.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub prefix: String,
    pub base_dir: Option<PathBuf>,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn file_name(&self, layer: Layer) -> String {
        format!("{}{}", self.prefix, layer.file_suffix())
    }

    pub fn layer_path(&self, layer: Layer) -> PathBuf {
        self.dir.join(self.file_name(layer))
    }

    pub fn base_path(&self, layer: Layer) -> Option<PathBuf> {
        self.base_dir.as_ref().map(|dir| dir.join(self.file_name(layer)))
    }
}

/// Files produced by one run.
#[derive(Debug, Clone)]
pub struct GeneratedBoard {
    /// `SameCoordinates` identifier of a fresh run.
    pub ident: Option<String>,
    pub files: Vec<(Layer, PathBuf)>,
}

/// Generate every layer of `config` under `paths`.
///
/// With a base directory each file starts as a copy of its base and new
/// geometry is appended; a missing base file fails before anything is drawn.
pub fn generate(config: &BoardConfig, paths: &OutputPaths) -> Result<GeneratedBoard, GerberError> {
    fs::create_dir_all(&paths.dir)?;

    let (mode, ident) = match paths.base_dir {
        Some(_) => (HeaderMode::Continue, None),
        None => (HeaderMode::Fresh, Some(Uuid::new_v4().to_string())),
    };
    info!(
        "generating {} layer(s) into {} ({mode:?})",
        Layer::ALL.len(),
        paths.dir.display()
    );

    // Every base is read before any output is created, since an output may
    // overwrite its own base
    let bases = Layer::ALL
        .iter()
        .map(|&layer| match paths.base_path(layer) {
            Some(base_path) => {
                debug!("{layer}: continuing {}", base_path.display());
                fs::read_to_string(&base_path)
                    .map(Some)
                    .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", base_path.display())))
            }
            None => Ok(None),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let open = |layer: Layer| -> Result<GerberWriter<BufWriter<File>>, GerberError> {
        let out = BufWriter::new(File::create(paths.layer_path(layer))?);
        match &bases[layer as usize] {
            Some(base) => GerberWriter::continue_from(out, base),
            None => GerberWriter::fresh(out, ident.as_deref().unwrap_or_default()),
        }
    };

    let written = render(config, mode, open)?;
    let files = written
        .into_iter()
        .map(|(layer, _)| (layer, paths.layer_path(layer)))
        .collect();
    Ok(GeneratedBoard { ident, files })
}

/// Pack the generated layer files into one zip archive.
pub fn bundle_zip(board: &GeneratedBoard, zip_path: &Path) -> Result<(), GerberError> {
    let mut zip = zip::ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (_, path) in &board.files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GerberError::Config(format!("bad file name: {}", path.display())))?;
        zip.start_file(name, options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }
    zip.finish()?.flush()?;
    info!("wrote {}", zip_path.display());
    Ok(())
}

/// Read a layer file back and check it.
pub fn check_file(path: &Path) -> Result<LayerReport, GerberError> {
    let source = fs::read_to_string(path)?;
    check(&source)
}

/// Check every layer file found in `dir`, sorted by layer.
///
/// Files that don't carry a layer suffix are skipped.
pub fn check_dir(dir: &Path) -> Result<Vec<(Layer, PathBuf, LayerReport)>, GerberError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(layer) = path.to_str().and_then(identify_from_filename) else {
            continue;
        };
        if !path.is_file() {
            continue;
        }
        let report = check_file(&path)?;
        found.push((layer, path, report));
    }
    found.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    Ok(found)
}
