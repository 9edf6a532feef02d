//! # 模型能力抽象
//!
//! 预训练分类模型对本 crate 是黑盒：输入 `NormalizedBuffer`，输出 `ModelOutput`。
//! 任何推理后端（Core ML 桥接、ONNX、远端 stub……）只需实现 `ClassificationModel`，
//! 归一化与解码逻辑无需改动。
//!
//! 调用是同步阻塞的；编排层负责把它放到阻塞线程池上执行。

use super::ClassifierError;
use super::source::{ModelOutput, NormalizedBuffer};

/// 模型实现自定义的错误类型，只要求可读描述。
pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// 图像分类模型。
pub trait ClassificationModel: Send + Sync {
    /// 对单张归一化图片做一次预测。加载失败与推理失败都通过 `Err` 返回。
    fn predict(&self, input: &NormalizedBuffer) -> Result<ModelOutput, ModelError>;
}

impl<F> ClassificationModel for F
where
    F: Fn(&NormalizedBuffer) -> Result<ModelOutput, ModelError> + Send + Sync,
{
    fn predict(&self, input: &NormalizedBuffer) -> Result<ModelOutput, ModelError> {
        self(input)
    }
}

/// 调用模型并把失败统一映射为 `ModelInvocation`，描述原样保留。
pub(crate) fn invoke_model(
    model: &dyn ClassificationModel,
    input: &NormalizedBuffer,
) -> Result<ModelOutput, ClassifierError> {
    model.predict(input).map_err(|err| {
        let description = err.to_string();
        log::warn!("⚠️ 模型调用失败：{}", description);
        ClassifierError::ModelInvocation(description)
    })
}
