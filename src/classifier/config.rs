//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `NormalizerConfig`。
//! 模型输入尺寸（224×224×4）是模型契约的一部分，不在此处开放调整；
//! 可调的只有加载上限、缩放滤镜与通道排布。
//!
//! ## 实现思路
//!
//! - `Default` 提供与移动端模型默认契约一致的配置。
//! - `PerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体滤镜。
//! - `infer_performance_profile` 用于从当前配置反推档位。

use image::imageops::FilterType;

use super::ClassifierError;
use super::source::PixelLayout;

/// 归一化链路配置。
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 缩放到模型输入尺寸时使用的滤镜。
    pub resize_filter: FilterType,
    /// 输出缓冲的通道排布，需与模型输入契约一致。
    pub pixel_layout: PixelLayout,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: FilterType::Triangle,
            pixel_layout: PixelLayout::NoneSkipFirst,
        }
    }
}

/// 缩放质量档位。
///
/// - `Quality`：CatmullRom，细节保留最好
/// - `Balanced`：Triangle（双线性）
/// - `Speed`：Nearest，最快
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl PerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_classifier::classifier::PerformanceProfile;
    ///
    /// let p = PerformanceProfile::from_str("Balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_classifier::classifier::ClassifierError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, ClassifierError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ClassifierError::InvalidFormat(format!(
                "unknown performance profile: {} (expected quality / balanced / speed)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl NormalizerConfig {
    /// 基于当前滤镜反推性能档位。
    pub fn infer_performance_profile(&self) -> PerformanceProfile {
        match self.resize_filter {
            FilterType::Nearest => PerformanceProfile::Speed,
            FilterType::CatmullRom | FilterType::Lanczos3 | FilterType::Gaussian => {
                PerformanceProfile::Quality
            }
            FilterType::Triangle => PerformanceProfile::Balanced,
        }
    }

    /// 应用指定性能档位到实际参数。
    pub fn apply_performance_profile(&mut self, profile: PerformanceProfile) {
        self.resize_filter = match profile {
            PerformanceProfile::Quality => FilterType::CatmullRom,
            PerformanceProfile::Balanced => FilterType::Triangle,
            PerformanceProfile::Speed => FilterType::Nearest,
        };
    }
}
