//! # 图像分类模块（classifier）
//!
//! ## 设计思路
//!
//! 该模块将“图片来源加载 → 归一化为模型输入 → 调用黑盒模型 → 解码展示结果”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：状态机、忙碌标记与展示状态（宿主 UI 唯一入口）
//! - `handler`：编排单次分类链路 + 运行时配置
//! - `loader`：文件 / 字节 / Base64 加载与安全校验
//! - `pipeline`：缩放与通道排布，产出 224×224×4 缓冲
//! - `model`：模型能力抽象（黑盒）
//! - `decoder`：类别标识 → 标签 + 置信度文本
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型，内部细节保持 `mod` 私有。
//! 宿主持有一个 `ClassifierService`，通过 `subscribe()` 获得展示状态。
//!
//! ## 新同事快速上手
//!
//! ```text
//! 相册 / 相机（ImagePicker）
//!    ↓
//! service.rs（忙碌标记 + 状态机 + watch 展示槽）
//!    ↓  spawn_blocking + oneshot
//! handler.rs / pipeline.rs（加载 + 归一化）
//!    ↓  spawn_blocking + oneshot
//! model.rs（黑盒推理）
//!    ↓
//! decoder.rs（标签映射 + 置信度格式化）
//!    ↓
//! DisplayState { phase, message, busy }
//! ```
//!
//! ## 分层职责建议
//!
//! - 缩放质量 / 通道排布变更优先改 `config.rs`
//! - 状态流转或并发策略变更优先改 `service.rs`
//! - 展示文本格式变更优先改 `source.rs`（`ClassificationResult` 的 `Display`）

mod config;
mod decoder;
mod error;
mod handler;
mod loader;
mod model;
mod pipeline;
mod service;
mod source;

pub use config::{NormalizerConfig, PerformanceProfile};
pub use decoder::{CLASS_LABEL_PREFIX, decode_prediction, parse_class_index};
pub use error::ClassifierError;
pub use handler::ClassificationHandler;
pub use model::{ClassificationModel, ModelError};
pub use service::{
    CaptureMode, ClassificationPhase, ClassifierService, DisplayState, ImagePicker,
    PLACEHOLDER_MESSAGE,
};
pub use source::{
    ClassificationResult, ImageSource, MODEL_INPUT_CHANNELS, MODEL_INPUT_HEIGHT,
    MODEL_INPUT_WIDTH, ModelOutput, NormalizedBuffer, PixelLayout, SourceImage,
};
