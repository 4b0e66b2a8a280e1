//! File-backed frame source and detection sidecars.
//!
//! `idgate capture --frames <dir>` replays a directory of still images as a
//! frame stream, in filename order. Detection results come from optional
//! sidecar files: `shot01.jpg` pairs with `shot01.faces.json`, a JSON array
//! of detected faces in that frame's pixel space. A missing sidecar means
//! no faces for that frame.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use idgate_core::{AnalyzerError, DetectedFace, Frame, FrameAnalyzer, FrameSource, SourceError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Replays a directory of images as frames, then reports exhaustion.
pub struct FileSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl FileSource {
    pub fn new(dir: &Path) -> Result<Self> {
        let paths = list_images(dir)?;
        anyhow::ensure!(!paths.is_empty(), "no images found in {}", dir.display());
        tracing::info!(dir = %dir.display(), frames = paths.len(), "frame directory loaded");
        Ok(Self { paths, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Err(SourceError::Exhausted);
        };
        self.cursor += 1;

        let rgb = image::open(path)
            .map_err(|e| SourceError::Other(format!("{}: {e}", path.display())))?
            .to_rgb8();
        Ok(Frame {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
        })
    }
}

/// Replays sidecar detection files in the same order as [`FileSource`].
pub struct SidecarAnalyzer {
    script: Vec<Vec<DetectedFace>>,
    cursor: usize,
}

impl SidecarAnalyzer {
    pub fn new(dir: &Path) -> Result<Self> {
        let mut script = Vec::new();
        for path in list_images(dir)? {
            let sidecar = path.with_extension("faces.json");
            if sidecar.exists() {
                let raw = std::fs::read_to_string(&sidecar)
                    .with_context(|| format!("reading {}", sidecar.display()))?;
                let faces: Vec<DetectedFace> = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", sidecar.display()))?;
                script.push(faces);
            } else {
                script.push(Vec::new());
            }
        }
        Ok(Self { script, cursor: 0 })
    }
}

impl FrameAnalyzer for SidecarAnalyzer {
    fn analyze(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzerError> {
        let faces = self.script.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(faces)
    }
}
