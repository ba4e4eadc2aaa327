// src/step/transform.rs

//! File-content transforms applied by a step, in declared order.
//!
//! A transform consumes the whole [`FileSet`] produced by the previous one, so
//! many-to-one operations like [`Concat`] fit the same contract as per-file
//! ones like [`Scss`].

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::debug;

use crate::config::TransformSpec;

/// One file flowing through a transform pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Output path, relative to the step's destination directory.
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// Where the file was read from, if it maps to a single source file.
    pub origin: Option<PathBuf>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            origin: None,
        }
    }

    fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    fn text(&self, transform: &str) -> Result<String, TransformError> {
        String::from_utf8(self.contents.clone()).map_err(|_| {
            TransformError::new(transform, format!("{:?} is not valid UTF-8", self.path))
        })
    }
}

pub type FileSet = Vec<FileEntry>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{transform}: {message}")]
pub struct TransformError {
    pub transform: String,
    pub message: String,
}

impl TransformError {
    pub fn new(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transform: transform.into(),
            message: message.into(),
        }
    }
}

/// An order-sensitive, possibly failing file-set transformer.
pub trait Transform: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError>;
}

/// Build a transform from its config descriptor.
///
/// `include_paths` are extra import directories for stylesheet compilation.
pub fn build_transform(spec: &TransformSpec, include_paths: &[PathBuf]) -> Arc<dyn Transform> {
    match spec {
        TransformSpec::Scss { compressed } => Arc::new(Scss {
            compressed: *compressed,
            include_paths: include_paths.to_vec(),
        }),
        TransformSpec::MinifyCss => Arc::new(MinifyCss),
        TransformSpec::Concat { file, separator } => Arc::new(Concat {
            file: PathBuf::from(file),
            separator: separator.clone(),
        }),
        TransformSpec::Rename {
            prefix,
            suffix,
            extension,
        } => Arc::new(Rename {
            prefix: prefix.clone(),
            suffix: suffix.clone(),
            extension: extension.clone(),
        }),
        TransformSpec::OptimizeImages { quality } => Arc::new(OptimizeImages {
            quality: (*quality).clamp(1, 100),
        }),
        TransformSpec::Banner { text } => Arc::new(Banner { text: text.clone() }),
    }
}

/// Compile `.scss`, `.sass` and `.css` files with `grass`.
///
/// Partials (`_name.scss`) are only reachable through imports and are
/// dropped from the output. Other files pass through untouched.
#[derive(Debug, Clone)]
pub struct Scss {
    pub compressed: bool,
    pub include_paths: Vec<PathBuf>,
}

impl Transform for Scss {
    fn name(&self) -> &str {
        "scss"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        let mut out = Vec::with_capacity(files.len());

        for file in files {
            let (syntax, is_css) = match file.extension().as_deref() {
                Some("scss") => (grass::InputSyntax::Scss, false),
                Some("sass") => (grass::InputSyntax::Sass, false),
                Some("css") => (grass::InputSyntax::Css, true),
                _ => {
                    out.push(file);
                    continue;
                }
            };

            let is_partial = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            if is_partial && !is_css {
                debug!(path = ?file.path, "skipping stylesheet partial");
                continue;
            }

            let mut options = grass::Options::default()
                .input_syntax(syntax)
                .style(output_style(self.compressed));
            if let Some(dir) = file.origin.as_deref().and_then(Path::parent) {
                options = options.load_path(dir);
            }
            for dir in &self.include_paths {
                options = options.load_path(dir);
            }

            let css = grass::from_string(file.text(self.name())?, &options).map_err(|e| {
                TransformError::new(self.name(), format!("{}: {}", file.path.display(), e))
            })?;

            out.push(FileEntry {
                path: file.path.with_extension("css"),
                contents: css.into_bytes(),
                origin: file.origin,
            });
        }

        Ok(out)
    }
}

fn output_style(compressed: bool) -> grass::OutputStyle {
    if compressed {
        grass::OutputStyle::Compressed
    } else {
        grass::OutputStyle::Expanded
    }
}

/// Re-emit `.css` files in compressed form.
#[derive(Debug, Clone, Copy)]
pub struct MinifyCss;

impl Transform for MinifyCss {
    fn name(&self) -> &str {
        "minify_css"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        files
            .into_iter()
            .map(|mut file| {
                if file.extension().as_deref() != Some("css") {
                    return Ok(file);
                }
                let options = grass::Options::default()
                    .input_syntax(grass::InputSyntax::Css)
                    .style(grass::OutputStyle::Compressed);
                let css = grass::from_string(file.text(self.name())?, &options).map_err(|e| {
                    TransformError::new(self.name(), format!("{}: {}", file.path.display(), e))
                })?;
                file.contents = css.into_bytes();
                Ok(file)
            })
            .collect()
    }
}

/// Join all files, in order, into a single file.
///
/// An empty input produces no output file.
#[derive(Debug, Clone)]
pub struct Concat {
    pub file: PathBuf,
    pub separator: String,
}

impl Transform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        if files.is_empty() {
            return Ok(files);
        }

        let mut contents = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&file.contents);
        }

        Ok(vec![FileEntry::new(self.file.clone(), contents)])
    }
}

/// Rewrite file names: `<prefix><stem><suffix>.<extension>`.
#[derive(Debug, Clone)]
pub struct Rename {
    pub prefix: String,
    pub suffix: String,
    pub extension: Option<String>,
}

impl Rename {
    fn rename(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = match &self.extension {
            Some(ext) => Some(ext.trim_start_matches('.').to_string()),
            None => path
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
        };

        let mut name = format!("{}{}{}", self.prefix, stem, self.suffix);
        if let Some(ext) = ext.filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(&ext);
        }
        path.with_file_name(name)
    }
}

impl Transform for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        Ok(files
            .into_iter()
            .map(|mut file| {
                file.path = self.rename(&file.path);
                file
            })
            .collect())
    }
}

/// Re-encode PNG and JPEG images, keeping the original when it is smaller.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeImages {
    pub quality: u8,
}

impl OptimizeImages {
    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, self.quality))?;
            }
            _ => {
                img.write_with_encoder(PngEncoder::new_with_quality(
                    &mut buf,
                    CompressionType::Best,
                    FilterType::Adaptive,
                ))?;
            }
        }
        Ok(buf.into_inner())
    }
}

impl Transform for OptimizeImages {
    fn name(&self) -> &str {
        "optimize_images"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        files
            .into_iter()
            .map(|mut file| {
                let format = match file.extension().as_deref() {
                    Some("png") => ImageFormat::Png,
                    Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
                    _ => return Ok(file),
                };

                let img = image::load_from_memory_with_format(&file.contents, format)
                    .map_err(|e| {
                        TransformError::new(self.name(), format!("{}: {}", file.path.display(), e))
                    })?;
                let encoded = self.encode(&img, format).map_err(|e| {
                    TransformError::new(self.name(), format!("{}: {}", file.path.display(), e))
                })?;

                if encoded.len() < file.contents.len() {
                    debug!(
                        path = ?file.path,
                        before = file.contents.len(),
                        after = encoded.len(),
                        "image re-encoded"
                    );
                    file.contents = encoded;
                }
                Ok(file)
            })
            .collect()
    }
}

/// Prepend a fixed header line to every file.
#[derive(Debug, Clone)]
pub struct Banner {
    pub text: String,
}

impl Transform for Banner {
    fn name(&self) -> &str {
        "banner"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        Ok(files
            .into_iter()
            .map(|mut file| {
                let mut contents = Vec::with_capacity(self.text.len() + 1 + file.contents.len());
                contents.extend_from_slice(self.text.as_bytes());
                contents.push(b'\n');
                contents.append(&mut file.contents);
                file.contents = contents;
                file
            })
            .collect())
    }
}
