//! # 结果解码模块
//!
//! 将模型原始输出（类别标识 + 概率表）转换为展示结果。
//! 该阶段永不失败：概率缺失按 0 处理，标识无法映射时直接展示原始标识。

use super::source::{ClassificationResult, ModelOutput};

/// 类别标识的固定前缀，后接十进制下标，如 `class_281`。
pub const CLASS_LABEL_PREFIX: &str = "class_";

/// 解析类别标识中的下标；前缀不符或后缀不是非负十进制整数时返回 `None`。
pub fn parse_class_index(identifier: &str) -> Option<usize> {
    identifier.strip_prefix(CLASS_LABEL_PREFIX)?.parse().ok()
}

/// 解码模型输出。
///
/// # 示例
/// ```rust
/// use std::collections::HashMap;
/// use image_classifier::classifier::{decode_prediction, ModelOutput};
///
/// let output = ModelOutput::new("class_1", HashMap::from([("class_1".to_string(), 0.5)]));
/// let result = decode_prediction(&output, &["tench", "goldfish"]);
/// assert_eq!(result.to_string(), "Predicted: goldfish (Confidence: 0.50)");
/// ```
pub fn decode_prediction<S: AsRef<str>>(output: &ModelOutput, labels: &[S]) -> ClassificationResult {
    let confidence = output
        .probabilities
        .get(&output.class_label)
        .copied()
        .unwrap_or(0.0);

    let resolved: Option<&str> = parse_class_index(&output.class_label)
        .and_then(|index| labels.get(index))
        .map(|label| label.as_ref());

    match resolved {
        Some(label) => ClassificationResult::new(label.to_string(), true, confidence),
        None => {
            log::debug!(
                "类别标识无法映射到标签表（共 {} 项），按原样展示：{}",
                labels.len(),
                output.class_label
            );
            ClassificationResult::new(output.class_label.clone(), false, confidence)
        }
    }
}
