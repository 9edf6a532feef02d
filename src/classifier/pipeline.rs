//! # 归一化流水线模块
//!
//! ## 设计思路
//!
//! 将“任意尺寸位图 → 224×224×4 模型输入”集中管理。
//! 缩放为非等比（宽高各自缩放到 224），不裁剪、不留黑边，
//! 与移动端原有预处理保持一致。
//!
//! ## 实现思路
//!
//! 1. 拒绝零像素位图
//! 2. 缩放到 224×224（优先 `fast_image_resize`，失败回退 `image::resize_exact`）
//! 3. 在新分配的像素面上按 `PixelLayout` 写出 alpha 在前的 4 通道字节
//! 4. 校验字节长度后封装为 `NormalizedBuffer`

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

use super::source::{
    MODEL_INPUT_CHANNELS, MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH, NormalizedBuffer, PixelLayout,
    SourceImage,
};
use super::{ClassificationHandler, ClassifierError, NormalizerConfig};

impl ClassificationHandler {
    /// 将源图片归一化为模型输入缓冲。
    pub fn normalize(&self, image: &SourceImage) -> Result<NormalizedBuffer, ClassifierError> {
        let config = self.config_snapshot()?;
        Self::normalize_with(image, &config)
    }

    pub(crate) fn normalize_with(
        image: &SourceImage,
        config: &NormalizerConfig,
    ) -> Result<NormalizedBuffer, ClassifierError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifierError::Rasterization(format!(
                "source bitmap has no pixels ({}x{})",
                width, height
            )));
        }

        let resized = Self::resize_to_model_input(image.image(), config.resize_filter)?;
        let bytes = Self::rasterize(&resized, config.pixel_layout)?;
        let buffer = NormalizedBuffer::from_raw(config.pixel_layout, bytes)?;

        log::debug!(
            "🧩 归一化完成 - 来源: {} {}x{} -> {}x{}（filter={:?}, layout={:?}）",
            image.source_hint(),
            width,
            height,
            MODEL_INPUT_WIDTH,
            MODEL_INPUT_HEIGHT,
            config.resize_filter,
            config.pixel_layout
        );

        Ok(buffer)
    }

    /// 非等比缩放到模型输入尺寸。
    fn resize_to_model_input(
        image: &DynamicImage,
        filter: FilterType,
    ) -> Result<RgbaImage, ClassifierError> {
        if image.width() == MODEL_INPUT_WIDTH && image.height() == MODEL_INPUT_HEIGHT {
            return Ok(image.to_rgba8());
        }

        match Self::resize_with_fast_image_resize(image, MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT, filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::resize_exact：{}", err);
                Ok(image
                    .resize_exact(MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT, filter)
                    .to_rgba8())
            }
        }
    }

    fn resize_with_fast_image_resize(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, ClassifierError> {
        let src = image.to_rgba8();
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.into_raw(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| ClassifierError::Rasterization(format!("cannot wrap source pixels: {}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| ClassifierError::Rasterization(format!("resize failed: {}", e)))?;

        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| {
                ClassifierError::Rasterization("resized pixel buffer has unexpected length".to_string())
            })
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }

    /// RGBA → alpha 在前的 4 通道字节，写入新分配的像素面。
    fn rasterize(rgba: &RgbaImage, layout: PixelLayout) -> Result<Vec<u8>, ClassifierError> {
        if rgba.dimensions() != (MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT) {
            return Err(ClassifierError::Rasterization(format!(
                "resized surface is {}x{}, expected {}x{}",
                rgba.width(),
                rgba.height(),
                MODEL_INPUT_WIDTH,
                MODEL_INPUT_HEIGHT
            )));
        }

        let mut surface = Vec::new();
        surface
            .try_reserve_exact(NormalizedBuffer::LEN)
            .map_err(|e| {
                ClassifierError::BufferAllocation(format!(
                    "cannot allocate {}-byte pixel surface: {}",
                    NormalizedBuffer::LEN,
                    e
                ))
            })?;

        for px in rgba.as_raw().chunks_exact(MODEL_INPUT_CHANNELS) {
            let a = px[3];
            let r = premultiply(px[0], a);
            let g = premultiply(px[1], a);
            let b = premultiply(px[2], a);
            match layout {
                PixelLayout::NoneSkipFirst => surface.extend_from_slice(&[0xFF, r, g, b]),
                PixelLayout::PremultipliedFirst => surface.extend_from_slice(&[a, r, g, b]),
            }
        }

        Ok(surface)
    }
}

/// 颜色乘以 alpha（四舍五入），等价于绘制到黑色不透明背景上。
fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((channel as u16 * alpha as u16 + 127) / 255) as u8
}
