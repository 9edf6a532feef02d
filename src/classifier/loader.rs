//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（相册文件 / 相机字节 / Base64）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 字节：体积限制。
//! - Base64：格式解析 + 预估解码体积限制。
//! - 统一：签名探测（`infer`）→ header 尺寸校验 → 完整解码 → 按 EXIF 方向摆正。

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

use super::source::{ImageSource, RawImageData, SourceImage};
use super::{ClassificationHandler, ClassifierError, NormalizerConfig};

impl ClassificationHandler {
    /// 从任意来源加载并解码源图片。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_classifier::classifier::{ClassificationHandler, ImageSource};
    ///
    /// let handler = ClassificationHandler::default();
    /// let image = handler.load(ImageSource::FilePath("/tmp/photo.jpg".into()))?;
    /// println!("{}x{}", image.width(), image.height());
    /// # Ok::<(), image_classifier::classifier::ClassifierError>(())
    /// ```
    pub fn load(&self, source: ImageSource) -> Result<SourceImage, ClassifierError> {
        let config = self.config_snapshot()?;
        Self::load_with(source, &config)
    }

    pub(crate) fn load_with(
        source: ImageSource,
        config: &NormalizerConfig,
    ) -> Result<SourceImage, ClassifierError> {
        let raw = match source {
            ImageSource::FilePath(path) => Self::load_from_file(&path, config)?,
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, config)?,
            ImageSource::Base64(data) => Self::load_from_base64(&data, config)?,
        };
        Self::decode_source(raw, config)
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(path: &str, config: &NormalizerConfig) -> Result<RawImageData, ClassifierError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(ClassifierError::FileSystem(format!("file not found: {}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| ClassifierError::FileSystem(format!("cannot stat file: {}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(ClassifierError::ResourceLimit(format!(
                "file is {:.2} MB (limit {:.2} MB)",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| ClassifierError::FileSystem(format!("cannot read file: {}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 相机帧等内存字节。
    fn load_from_bytes(bytes: Vec<u8>, config: &NormalizerConfig) -> Result<RawImageData, ClassifierError> {
        log::info!("📷 开始处理内存图片 - {} bytes", bytes.len());

        if bytes.len() as u64 > config.max_file_size {
            return Err(ClassifierError::ResourceLimit(format!(
                "image data is {:.2} MB (limit {:.2} MB)",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "bytes",
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    fn load_from_base64(data: &str, config: &NormalizerConfig) -> Result<RawImageData, ClassifierError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(ClassifierError::ResourceLimit(format!(
                "decoded base64 is {:.2} MB (limit {:.2} MB)",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "base64",
        })
    }

    /// 解码为位图：先读 header 尺寸做上限校验，再完整解码并按 EXIF 方向摆正。
    fn decode_source(raw: RawImageData, config: &NormalizerConfig) -> Result<SourceImage, ClassifierError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let mut decoder = ImageReader::new(Cursor::new(raw.bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| ClassifierError::InvalidFormat(format!("cannot detect format: {}", e)))?
            .into_decoder()
            .map_err(|e| ClassifierError::Decode(e.to_string()))?;

        let orientation = match decoder.orientation() {
            Ok(orientation) => orientation,
            Err(err) => {
                log::debug!("读取 EXIF 方向失败，按原方向处理：{}", err);
                image::metadata::Orientation::NoTransforms
            }
        };

        let mut decoded =
            DynamicImage::from_decoder(decoder).map_err(|e| ClassifierError::Decode(e.to_string()))?;
        decoded.apply_orientation(orientation);

        log::info!(
            "✅ 图片解码成功 - 来源: {} 尺寸: {}x{} 方向: {:?}",
            raw.source_hint,
            decoded.width(),
            decoded.height(),
            orientation
        );

        Ok(SourceImage::with_hint(decoded, raw.source_hint))
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ClassifierError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ClassifierError::InvalidFormat(format!("cannot detect format: {}", e)))?
            .into_dimensions()
            .map_err(|e| ClassifierError::InvalidFormat(format!("cannot read dimensions: {}", e)))
    }

    fn validate_pixel_limits(
        config: &NormalizerConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ClassifierError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ClassifierError::ResourceLimit("pixel count overflow".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(ClassifierError::ResourceLimit(format!(
                "{} pixels (limit {})",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &NormalizerConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ClassifierError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ClassifierError::ResourceLimit("decoded size overflow".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(ClassifierError::ResourceLimit(format!(
                "decoding needs {:.2} MB (limit {:.2} MB)",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    fn validate_image_signature(bytes: &[u8]) -> Result<(), ClassifierError> {
        if bytes.is_empty() {
            return Err(ClassifierError::InvalidFormat("image data is empty".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| ClassifierError::InvalidFormat("unrecognised file type".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ClassifierError::InvalidFormat(format!(
                "not an image: {}",
                kind.mime_type()
            )));
        }

        Ok(())
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ClassifierError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| ClassifierError::ResourceLimit("base64 length overflow".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| ClassifierError::ResourceLimit("base64 size estimate overflow".to_string()))
    }

    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ClassifierError> {
        let normalized = data.trim();

        let payload = if normalized.starts_with("data:image/") {
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| ClassifierError::InvalidFormat("missing ;base64, marker".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(ClassifierError::ResourceLimit(format!(
                "base64 would decode to {:.2} MB (limit {:.2} MB)",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ClassifierError::Decode(format!("invalid base64: {}", e)))
    }
}
