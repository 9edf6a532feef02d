//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“加载 → 归一化 → 模型调用”整条链路的错误来源。
//! 通过 `thiserror` 保持人类可读错误：展示区直接显示 `Display` 文本，
//! 不再另设错误码界面。
//!
//! 解码阶段（`decoder`）永不失败，因此这里没有对应分支。

/// 分类链路统一错误类型。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    /// 没有可供分类的图片。
    #[error("No image to classify")]
    NoImage,

    /// 像素缓冲分配失败（内存不足 / 尺寸溢出）。
    #[error("Could not convert image: {0}")]
    BufferAllocation(String),

    /// 绘制到目标像素面失败（源位图损坏 / 像素数据异常）。
    #[error("Could not convert image: {0}")]
    Rasterization(String),

    /// 模型加载或推理失败，原样携带模型给出的描述。
    #[error("{0}")]
    ModelInvocation(String),

    #[error("File error: {0}")]
    FileSystem(String),

    #[error("Unsupported image: {0}")]
    InvalidFormat(String),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Image too large: {0}")]
    ResourceLimit(String),

    /// 上一次分类仍在进行中。
    #[error("A classification is already in progress")]
    Busy,

    /// 内部状态损坏（如配置锁中毒），与输入图片无关。
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClassifierError {
    /// 稳定错误码，供日志检索与宿主侧分支判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoImage => "no_image",
            Self::BufferAllocation(_) => "buffer_allocation",
            Self::Rasterization(_) => "rasterization",
            Self::ModelInvocation(_) => "model_invocation",
            Self::FileSystem(_) => "file_system",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Decode(_) => "decode",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Busy => "busy",
            Self::Internal(_) => "internal",
        }
    }

    /// 出错所在阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoImage | Self::Busy => "select",
            Self::FileSystem(_) | Self::InvalidFormat(_) | Self::Decode(_) | Self::ResourceLimit(_) => {
                "load"
            }
            Self::BufferAllocation(_) | Self::Rasterization(_) => "normalize",
            Self::ModelInvocation(_) => "invoke",
            Self::Internal(_) => "state",
        }
    }
}

impl From<ClassifierError> for String {
    fn from(error: ClassifierError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_description_is_verbatim() {
        let err = ClassifierError::ModelInvocation("model file missing".to_string());
        assert_eq!(err.to_string(), "model file missing");
        assert_eq!(err.stage(), "invoke");
    }

    #[test]
    fn normalizer_errors_share_conversion_wording() {
        let alloc = ClassifierError::BufferAllocation("out of memory".to_string());
        let raster = ClassifierError::Rasterization("empty bitmap".to_string());

        assert!(alloc.to_string().starts_with("Could not convert image"));
        assert!(raster.to_string().starts_with("Could not convert image"));
        assert_eq!(alloc.code(), "buffer_allocation");
        assert_eq!(raster.stage(), "normalize");
    }
}
