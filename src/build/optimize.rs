//! Production optimization: minification and image re-encoding.
//!
//! CSS is minified with lightningcss and scripts with the oxc minifier,
//! following the same parse → minify → print shape. Images are re-encoded
//! in parallel; results are collected in input order so the output never
//! depends on scheduling.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rayon::prelude::*;

use crate::config::ImageConfig;

use super::asset::{extension_of, has_webp_variant, webp_path};
use super::rules::minify_svg;

#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("failed to minify stylesheet '{name}': {message}")]
    Css { name: String, message: String },

    #[error("failed to minify script '{name}': {message}")]
    Script { name: String, message: String },

    #[error("failed to optimize image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Minify a stylesheet.
pub fn minify_css(name: &str, source: &str) -> Result<String, OptimizeError> {
    let to_error = |message: String| OptimizeError::Css {
        name: name.to_string(),
        message,
    };

    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: name.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| to_error(e.to_string()))?;
    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| to_error(e.to_string()))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| to_error(e.to_string()))?;
    Ok(result.code)
}

/// Minify a bundled script.
///
/// Chunks are classic scripts sharing one global scope, and one chunk may
/// define what a later chunk uses. The code is parsed as a script so
/// top-level declarations are neither dropped nor renamed.
pub fn minify_js(name: &str, source: &str) -> Result<String, OptimizeError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::script()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(OptimizeError::Script {
            name: name.to_string(),
            message: error.to_string(),
        });
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// An image after optimization.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Lossless webp derivative for png/jpeg sources
    pub webp: Option<(PathBuf, Vec<u8>)>,
}

/// Optimize images in parallel, keeping input order.
pub fn optimize_images(
    images: Vec<(PathBuf, Vec<u8>)>,
    config: &ImageConfig,
) -> Vec<Result<OptimizedImage, OptimizeError>> {
    images
        .into_par_iter()
        .map(|(path, bytes)| optimize_image(path, bytes, config))
        .collect()
}

/// Re-encode one image, keeping the original bytes unless the result is smaller.
pub fn optimize_image(path: PathBuf, bytes: Vec<u8>, config: &ImageConfig) -> Result<OptimizedImage, OptimizeError> {
    let to_error = |source: image::ImageError| OptimizeError::Image {
        path: path.clone(),
        source,
    };

    let extension = extension_of(&path).unwrap_or_default();
    let reencoded = match extension.as_str() {
        "png" => Some(reencode_png(&bytes, config.png_optimization_level).map_err(to_error)?),
        "jpg" | "jpeg" => Some(reencode_jpeg(&bytes, config.jpeg_quality).map_err(to_error)?),
        "gif" => Some(reencode_gif(&bytes).map_err(to_error)?),
        "svg" => std::str::from_utf8(&bytes).ok().map(|s| minify_svg(s).into_bytes()),
        _ => None,
    };

    let webp = if config.webp && has_webp_variant(&path) {
        let image = image::load_from_memory(&bytes).map_err(to_error)?;
        Some((webp_path(&path), encode_webp(&image).map_err(to_error)?))
    } else {
        None
    };

    let bytes = match reencoded {
        Some(smaller) if smaller.len() < bytes.len() => smaller,
        _ => bytes,
    };
    Ok(OptimizedImage { path, bytes, webp })
}

/// Map the 0-7 optimization level onto the encoder's compression presets.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=1 => CompressionType::Fast,
        2..=4 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn reencode_png(bytes: &[u8], level: u8) -> Result<Vec<u8>, image::ImageError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let mut out = Vec::new();
    image.write_with_encoder(PngEncoder::new_with_quality(
        &mut out,
        png_compression(level),
        FilterType::Adaptive,
    ))?;
    Ok(out)
}

// The encoder writes baseline JPEG; `jpeg_progressive` has no effect.
fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    let mut out = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out)
}

/// Re-encode every frame; the encoder does not interlace.
fn reencode_gif(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let frames = GifDecoder::new(Cursor::new(bytes))?.into_frames().collect_frames()?;
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
    let mut out = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
    Ok(out)
}

/// Whether a path is an image the optimize stage re-encodes.
pub fn is_optimizable(path: &Path) -> bool {
    matches!(
        extension_of(path).as_deref(),
        Some("png" | "jpg" | "jpeg" | "gif" | "svg")
    )
}
