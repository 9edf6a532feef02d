//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ClassificationHandler` 只负责流程编排与配置管理，不持有任何展示状态。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 归一化为模型输入（`pipeline.rs`）
//! 3. 调用黑盒模型（`model.rs`）
//! 4. 解码为展示结果（`decoder.rs`）
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<NormalizerConfig>>` 支持运行时切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 `normalize/invoke/decode/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::decoder::decode_prediction;
use super::model::{ClassificationModel, invoke_model};
use super::source::{ClassificationResult, ModelOutput, NormalizedBuffer, PixelLayout, SourceImage};
use super::{ClassifierError, NormalizerConfig, PerformanceProfile};

/// 分类处理器。
#[derive(Debug, Clone, Default)]
pub struct ClassificationHandler {
    pub(super) config: Arc<RwLock<NormalizerConfig>>,
}

impl ClassificationHandler {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use image_classifier::classifier::{ClassificationHandler, NormalizerConfig};
    ///
    /// let handler = ClassificationHandler::new(NormalizerConfig::default());
    /// assert!(handler.config_snapshot().is_ok());
    /// ```
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<NormalizerConfig, ClassifierError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ClassifierError::Internal("config lock poisoned".to_string()))
    }

    /// 在写锁内修改配置。
    pub fn update_config<F>(&self, apply: F) -> Result<(), ClassifierError>
    where
        F: FnOnce(&mut NormalizerConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| ClassifierError::Internal("config lock poisoned".to_string()))?;
        apply(&mut config);
        Ok(())
    }

    /// 设置缩放质量档位。
    pub fn set_performance_profile(&self, profile: PerformanceProfile) -> Result<(), ClassifierError> {
        self.update_config(|config| {
            config.apply_performance_profile(profile);
            log::info!(
                "⚙️ 已切换缩放档位：{:?}（filter={:?}）",
                profile,
                config.resize_filter
            );
        })
    }

    /// 获取当前生效档位。
    pub fn get_performance_profile(&self) -> Result<PerformanceProfile, ClassifierError> {
        Ok(self.config_snapshot()?.infer_performance_profile())
    }

    /// 设置输出通道排布，需与所接模型的输入契约一致。
    pub fn set_pixel_layout(&self, layout: PixelLayout) -> Result<(), ClassifierError> {
        self.update_config(|config| config.pixel_layout = layout)
    }

    /// 调用模型。
    pub fn invoke(
        &self,
        model: &dyn ClassificationModel,
        input: &NormalizedBuffer,
    ) -> Result<ModelOutput, ClassifierError> {
        invoke_model(model, input)
    }

    /// 同步执行一次完整分类：归一化 → 模型 → 解码。
    ///
    /// 不涉及展示状态与线程切换，适合已在后台线程中的调用方；
    /// 需要忙碌标记与状态机的场景使用 `ClassifierService`。
    pub fn classify<S: AsRef<str>>(
        &self,
        image: Option<&SourceImage>,
        model: &dyn ClassificationModel,
        labels: &[S],
    ) -> Result<ClassificationResult, ClassifierError> {
        let image = image.ok_or(ClassifierError::NoImage)?;
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let normalize_start = Instant::now();
        let buffer = Self::normalize_with(image, &config)?;
        let normalize_elapsed = normalize_start.elapsed();

        let invoke_start = Instant::now();
        let output = invoke_model(model, &buffer)?;
        let invoke_elapsed = invoke_start.elapsed();

        let decode_start = Instant::now();
        let result = decode_prediction(&output, labels);
        let decode_elapsed = decode_start.elapsed();

        log::info!(
            "✅ 分类完成 - normalize={}ms invoke={}ms decode={}ms total={}ms",
            normalize_elapsed.as_millis(),
            invoke_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::ModelError;
    use image::{DynamicImage, ImageBuffer, Rgba};
    use std::collections::HashMap;

    fn gradient_image(width: u32, height: u32) -> SourceImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });
        SourceImage::new(DynamicImage::ImageRgba8(img))
    }

    fn fixed_model(label: &'static str, probability: f64) -> impl ClassificationModel {
        move |input: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            assert_eq!(input.as_bytes().len(), NormalizedBuffer::LEN);
            Ok(ModelOutput::new(
                label,
                HashMap::from([(label.to_string(), probability)]),
            ))
        }
    }

    #[test]
    fn classify_runs_full_chain() {
        let handler = ClassificationHandler::new(NormalizerConfig::default());
        let image = gradient_image(640, 480);
        let model = fixed_model("class_2", 0.91);

        let result = handler
            .classify(Some(&image), &model, &["tench", "goldfish", "great white shark"])
            .expect("classification should succeed");

        assert_eq!(result.to_string(), "Predicted: great white shark (Confidence: 0.91)");
    }

    #[test]
    fn classify_without_image_is_no_image() {
        let handler = ClassificationHandler::default();
        let model = fixed_model("class_0", 1.0);

        let result = handler.classify(None, &model, &["tench"]);
        assert_eq!(result, Err(ClassifierError::NoImage));
    }

    #[test]
    fn classify_surfaces_model_failure() {
        let handler = ClassificationHandler::default();
        let image = gradient_image(32, 32);
        let model = |_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            Err("prediction failed: input shape mismatch".into())
        };

        let result = handler.classify(Some(&image), &model, &["tench"]);
        assert_eq!(
            result,
            Err(ClassifierError::ModelInvocation(
                "prediction failed: input shape mismatch".to_string()
            ))
        );
    }

    #[test]
    fn profile_switch_is_visible_in_snapshot() {
        let handler = ClassificationHandler::default();
        handler
            .set_performance_profile(PerformanceProfile::Speed)
            .expect("profile switch should succeed");
        handler
            .set_pixel_layout(PixelLayout::PremultipliedFirst)
            .expect("layout switch should succeed");

        let snapshot = handler.config_snapshot().expect("snapshot should succeed");
        assert_eq!(snapshot.infer_performance_profile(), PerformanceProfile::Speed);
        assert_eq!(snapshot.pixel_layout, PixelLayout::PremultipliedFirst);
        assert_eq!(
            handler.get_performance_profile().expect("profile read should succeed"),
            PerformanceProfile::Speed
        );
    }

    #[test]
    fn poisoned_config_lock_is_internal_error() {
        let handler = ClassificationHandler::default();
        let shared = handler.clone();

        let joined = std::thread::spawn(move || {
            let _ = shared.update_config(|_| panic!("writer crashed while holding the lock"));
        })
        .join();
        assert!(joined.is_err());

        let err = handler
            .config_snapshot()
            .expect_err("poisoned lock should be reported");
        assert_eq!(err, ClassifierError::Internal("config lock poisoned".to_string()));
        assert_eq!(err.code(), "internal");
        assert_eq!(err.stage(), "state");
        assert!(handler.set_pixel_layout(PixelLayout::NoneSkipFirst).is_err());
    }
}
