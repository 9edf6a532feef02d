//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义（相册文件 / 相机帧 / Base64）
//! - `SourceImage` 表示已解码、已摆正方向的位图
//! - `NormalizedBuffer` 表示可直接交给模型的 224×224×4 像素缓冲
//! - `ModelOutput` / `ClassificationResult` 表示模型原始输出与展示结果

use std::collections::HashMap;
use std::fmt;

use image::{DynamicImage, GenericImageView};

use super::ClassifierError;

/// 模型输入宽度（像素）。
pub const MODEL_INPUT_WIDTH: u32 = 224;
/// 模型输入高度（像素）。
pub const MODEL_INPUT_HEIGHT: u32 = 224;
/// 每像素通道数（每通道 8 bit）。
pub const MODEL_INPUT_CHANNELS: usize = 4;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 相册中选中的本地文件。
    FilePath(String),
    /// 相机拍摄得到的编码字节（JPEG / PNG / HEIF 转码后等）。
    Bytes(Vec<u8>),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
}

/// 输出缓冲的通道排布。两种排布都是 alpha 在前、每像素 4 字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelLayout {
    /// `X R G B`：首字节忽略（固定写 0xFF），颜色按不透明背景（黑）合成。
    #[default]
    NoneSkipFirst,
    /// `A R G B`：保留 alpha，颜色为预乘值。
    PremultipliedFirst,
}

/// 已解码的源图片。
///
/// 任意尺寸、任意色深；每次分类请求独占一份，用完即丢。
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    source_hint: &'static str,
}

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        Self::with_hint(image, "memory")
    }

    pub(crate) fn with_hint(image: DynamicImage, source_hint: &'static str) -> Self {
        Self { image, source_hint }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// 来源提示（用于日志与诊断）。
    pub fn source_hint(&self) -> &'static str {
        self.source_hint
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// 模型输入缓冲：224×224 像素，4 通道，行优先、自上而下。
///
/// 只能由归一化阶段构造，长度恒为 `224 * 224 * 4`。
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedBuffer {
    layout: PixelLayout,
    bytes: Vec<u8>,
}

impl NormalizedBuffer {
    pub const WIDTH: u32 = MODEL_INPUT_WIDTH;
    pub const HEIGHT: u32 = MODEL_INPUT_HEIGHT;
    pub const CHANNELS: usize = MODEL_INPUT_CHANNELS;
    pub const LEN: usize =
        MODEL_INPUT_WIDTH as usize * MODEL_INPUT_HEIGHT as usize * MODEL_INPUT_CHANNELS;

    pub(crate) fn from_raw(layout: PixelLayout, bytes: Vec<u8>) -> Result<Self, ClassifierError> {
        if bytes.len() != Self::LEN {
            return Err(ClassifierError::Rasterization(format!(
                "pixel buffer has {} bytes, expected {}",
                bytes.len(),
                Self::LEN
            )));
        }
        Ok(Self { layout, bytes })
    }

    pub fn width(&self) -> u32 {
        Self::WIDTH
    }

    pub fn height(&self) -> u32 {
        Self::HEIGHT
    }

    pub fn channels(&self) -> usize {
        Self::CHANNELS
    }

    pub fn bytes_per_row(&self) -> usize {
        Self::WIDTH as usize * Self::CHANNELS
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// 读取单个像素（按 `layout` 排布的 4 字节），越界返回 `None`。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= Self::WIDTH || y >= Self::HEIGHT {
            return None;
        }
        let offset = y as usize * self.bytes_per_row() + x as usize * Self::CHANNELS;
        let px = &self.bytes[offset..offset + Self::CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for NormalizedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedBuffer")
            .field("width", &Self::WIDTH)
            .field("height", &Self::HEIGHT)
            .field("layout", &self.layout)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// 模型原始输出：预测类别标识 + 类别概率表。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    /// 形如 `class_123` 的类别标识。
    pub class_label: String,
    /// 类别标识 → 概率（0~1）。
    pub probabilities: HashMap<String, f64>,
}

impl ModelOutput {
    pub fn new(class_label: impl Into<String>, probabilities: HashMap<String, f64>) -> Self {
        Self {
            class_label: class_label.into(),
            probabilities,
        }
    }
}

/// 展示用分类结果。
///
/// `Display` 输出即展示区文本：`Predicted: <label> (Confidence: <x.xx>)`。
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    label: String,
    resolved: bool,
    confidence: f64,
}

impl ClassificationResult {
    pub(crate) fn new(label: String, resolved: bool, confidence: f64) -> Self {
        Self {
            label,
            resolved,
            confidence,
        }
    }

    /// 可读标签；未能映射时为原始类别标识。
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 标签是否来自标签表（而非原始标识回退）。
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Predicted: {} (Confidence: {:.2})",
            self.label, self.confidence
        )
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}
