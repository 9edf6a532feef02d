//! # 服务层（分类状态机）
//!
//! ## 设计思路
//!
//! `ClassifierService` 是宿主 UI 持有的唯一入口，负责：
//! 1. 驱动 `Idle → Normalizing → Invoking → Decoding → Displaying` 状态机
//!    （失败进入 `ErrorDisplaying`）
//! 2. 维护忙碌标记与唯一的展示状态槽
//! 3. 把耗时的归一化与模型调用放到阻塞线程池，结果经单槽通道送回
//!
//! ## 实现思路
//!
//! - 展示状态通过 `tokio::sync::watch` 发布给展示层；只有调用 `classify*`
//!   的任务会写入它，后台线程只负责计算。
//! - 每个后台阶段使用一个 `oneshot` 通道回传结果（单槽消息，而非回调）。
//! - 忙碌标记由 `BusyGuard` 持有：任何路径（含失败、panic、调用方丢弃 future）
//!   离开都会同时清除原子标记与展示槽中的 `busy`。
//! - 忙碌期间到来的新选择直接拒绝（`ClassifierError::Busy`），展示状态不变。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{oneshot, watch};

use super::decoder::decode_prediction;
use super::model::{ClassificationModel, invoke_model};
use super::source::{ClassificationResult, ImageSource, ModelOutput, SourceImage};
use super::{ClassificationHandler, ClassifierError, PerformanceProfile};
use crate::labels::imagenet_labels;

/// 尚未做过任何分类时展示区的文本。
pub const PLACEHOLDER_MESSAGE: &str = "No prediction yet";

/// 分类状态机的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassificationPhase {
    Idle,
    Normalizing,
    Invoking,
    Decoding,
    Displaying,
    ErrorDisplaying,
}

impl ClassificationPhase {
    /// 该阶段是否已结束本轮请求，可以接受新的图片选择。
    pub fn accepts_selection(self) -> bool {
        matches!(self, Self::Idle | Self::Displaying | Self::ErrorDisplaying)
    }
}

/// 展示层消费的状态快照：结果/错误文本 + 忙碌标记。
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub phase: ClassificationPhase,
    pub message: String,
    pub busy: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            phase: ClassificationPhase::Idle,
            message: PLACEHOLDER_MESSAGE.to_string(),
            busy: false,
        }
    }
}

/// 图片获取方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// 从相册选择。
    Gallery,
    /// 相机现拍。
    Camera,
}

/// 相册 / 相机适配器。返回 `None` 表示用户取消。
pub trait ImagePicker {
    fn pick(&self, mode: CaptureMode) -> Option<SourceImage>;
}

/// 忙碌标记的 RAII 守卫。
///
/// 同时持有展示状态的发送端：本轮未经 `settle` 就被丢弃（调用方取消、超时）时，
/// 在 drop 中把展示状态恢复为 `Idle` 且 `busy = false`，保留上一次的结果文本。
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    display: &'a watch::Sender<DisplayState>,
    settled: bool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, display: &'a watch::Sender<DisplayState>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag,
                display,
                settled: false,
            })
    }

    /// 写入终态并释放忙碌标记。
    ///
    /// 标记在展示槽的写锁内清除，后续请求的 `Normalizing` 一定排在本次终态之后。
    fn settle(mut self, phase: ClassificationPhase, message: String) {
        self.settled = true;
        let flag = self.flag;
        self.display.send_modify(|state| {
            log::debug!("状态切换：{:?} → {:?}", state.phase, phase);
            state.phase = phase;
            state.message = message;
            state.busy = false;
            flag.store(false, Ordering::Release);
        });
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let flag = self.flag;
        self.display.send_modify(|state| {
            log::warn!("⚠️ 分类在 {:?} 阶段被中途放弃，展示状态恢复为 Idle", state.phase);
            state.phase = ClassificationPhase::Idle;
            state.busy = false;
            flag.store(false, Ordering::Release);
        });
    }
}

/// 本轮请求的输入：已解码位图，或尚需加载的来源。
enum CycleInput {
    Decoded(SourceImage),
    Encoded(ImageSource),
}

/// 分类服务。
pub struct ClassifierService {
    handler: ClassificationHandler,
    model: Arc<dyn ClassificationModel>,
    labels: &'static [&'static str],
    busy: AtomicBool,
    display: watch::Sender<DisplayState>,
}

impl ClassifierService {
    /// 使用默认配置与 ImageNet 标签表创建服务。
    ///
    /// # 示例
    /// ```rust
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    /// use image_classifier::classifier::{ClassifierService, ModelError, ModelOutput, NormalizedBuffer};
    ///
    /// let model = |_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
    ///     Ok(ModelOutput::new("class_1", HashMap::new()))
    /// };
    /// let service = ClassifierService::new(Arc::new(model));
    /// assert_eq!(service.display_state().message, "No prediction yet");
    /// ```
    pub fn new(model: Arc<dyn ClassificationModel>) -> Self {
        Self::with_handler(ClassificationHandler::default(), model)
    }

    /// 使用自定义处理器（配置）创建服务。
    pub fn with_handler(handler: ClassificationHandler, model: Arc<dyn ClassificationModel>) -> Self {
        let (display, _) = watch::channel(DisplayState::default());
        Self {
            handler,
            model,
            labels: imagenet_labels(),
            busy: AtomicBool::new(false),
            display,
        }
    }

    /// 替换标签表（例如接入非 ImageNet 模型）。
    pub fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    pub fn handler(&self) -> &ClassificationHandler {
        &self.handler
    }

    /// 订阅展示状态。
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    pub fn display_state(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 切换缩放质量档位（`quality` / `balanced` / `speed`）。
    pub fn set_performance_profile(&self, profile: &str) -> Result<(), ClassifierError> {
        let profile = PerformanceProfile::from_str(profile)?;
        self.handler.set_performance_profile(profile)
    }

    /// 查询当前生效档位。
    pub fn get_performance_profile(&self) -> Result<String, ClassifierError> {
        let profile = self.handler.get_performance_profile()?;
        Ok(profile.as_str().to_string())
    }

    /// 通过适配器获取图片并分类。用户取消时返回 `Ok(None)`，状态不变。
    pub async fn select_and_classify(
        &self,
        picker: &dyn ImagePicker,
        mode: CaptureMode,
    ) -> Result<Option<ClassificationResult>, ClassifierError> {
        match picker.pick(mode) {
            Some(image) => self.classify(Some(image)).await.map(Some),
            None => {
                log::debug!("图片选择已取消（{:?}）", mode);
                Ok(None)
            }
        }
    }

    /// 对一张新到达的图片执行一轮分类。
    pub async fn classify(
        &self,
        image: Option<SourceImage>,
    ) -> Result<ClassificationResult, ClassifierError> {
        match image {
            Some(image) => self.run_cycle(CycleInput::Decoded(image)).await,
            None => Err(self.reject_missing_image()),
        }
    }

    /// 从编码来源（文件 / 相机字节 / Base64）加载后分类；加载计入 `Normalizing` 阶段。
    pub async fn classify_source(
        &self,
        source: ImageSource,
    ) -> Result<ClassificationResult, ClassifierError> {
        self.run_cycle(CycleInput::Encoded(source)).await
    }

    fn reject_missing_image(&self) -> ClassifierError {
        let Some(guard) = BusyGuard::acquire(&self.busy, &self.display) else {
            return ClassifierError::Busy;
        };

        let err = ClassifierError::NoImage;
        guard.settle(ClassificationPhase::Idle, err.to_string());
        err
    }

    async fn run_cycle(&self, input: CycleInput) -> Result<ClassificationResult, ClassifierError> {
        let Some(guard) = BusyGuard::acquire(&self.busy, &self.display) else {
            log::warn!("⏳ 上一次分类尚未结束，忽略新的图片选择");
            return Err(ClassifierError::Busy);
        };

        let total_start = Instant::now();
        self.transition(ClassificationPhase::Normalizing, true);

        let outcome = match self.normalize_and_invoke(input).await {
            Ok(output) => {
                self.transition(ClassificationPhase::Decoding, true);
                Ok(decode_prediction(&output, self.labels))
            }
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(result) => {
                guard.settle(ClassificationPhase::Displaying, result.to_string());
                log::info!(
                    "✅ 分类完成 - {} total={}ms",
                    result,
                    total_start.elapsed().as_millis()
                );
            }
            Err(err) => {
                guard.settle(ClassificationPhase::ErrorDisplaying, format!("Error: {}", err));
                log::warn!(
                    "⚠️ 分类失败 - code={} stage={} message={} total={}ms",
                    err.code(),
                    err.stage(),
                    err,
                    total_start.elapsed().as_millis()
                );
            }
        }

        outcome
    }

    async fn normalize_and_invoke(&self, input: CycleInput) -> Result<ModelOutput, ClassifierError> {
        let config = self.handler.config_snapshot()?;

        let normalize_start = Instant::now();
        let buffer = run_blocking(ClassifierError::Rasterization, move || {
            let image = match input {
                CycleInput::Decoded(image) => image,
                CycleInput::Encoded(source) => ClassificationHandler::load_with(source, &config)?,
            };
            ClassificationHandler::normalize_with(&image, &config)
        })
        .await?;
        let normalize_elapsed = normalize_start.elapsed();

        self.transition(ClassificationPhase::Invoking, true);

        let invoke_start = Instant::now();
        let model = Arc::clone(&self.model);
        let output = run_blocking(ClassifierError::ModelInvocation, move || {
            invoke_model(model.as_ref(), &buffer)
        })
        .await?;

        log::debug!(
            "阶段耗时 - normalize={}ms invoke={}ms",
            normalize_elapsed.as_millis(),
            invoke_start.elapsed().as_millis()
        );

        Ok(output)
    }

    fn transition(&self, phase: ClassificationPhase, busy: bool) {
        self.display.send_modify(|state| {
            log::debug!("状态切换：{:?} → {:?}", state.phase, phase);
            state.phase = phase;
            state.busy = busy;
        });
    }
}

/// 在阻塞线程池执行 `job`，结果经 `oneshot` 单槽通道送回。
///
/// 后台线程异常退出（未送回结果）时，用 `on_lost` 构造该阶段的错误。
async fn run_blocking<T, F>(
    on_lost: fn(String) -> ClassifierError,
    job: F,
) -> Result<T, ClassifierError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ClassifierError> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(job());
    });

    rx.await
        .map_err(|_| on_lost("background worker stopped before delivering a result".to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::ModelError;
    use crate::classifier::source::NormalizedBuffer;
    use image::{DynamicImage, ImageBuffer, Rgba};
    use std::collections::HashMap;

    static LABELS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

    fn photo() -> SourceImage {
        SourceImage::new(DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            48,
            32,
            Rgba([90, 60, 30, 255])
        )))
    }

    fn service_with<F>(model: F) -> ClassifierService
    where
        F: Fn(&NormalizedBuffer) -> Result<ModelOutput, ModelError> + Send + Sync + 'static,
    {
        ClassifierService::new(Arc::new(model)).with_labels(&LABELS)
    }

    #[test]
    fn busy_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let (display, _) = watch::channel(DisplayState::default());
        {
            let _guard = BusyGuard::acquire(&flag, &display).expect("first acquire should succeed");
            assert!(flag.load(Ordering::Acquire));
            assert!(BusyGuard::acquire(&flag, &display).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn unsettled_guard_resets_display_to_idle() {
        let flag = AtomicBool::new(false);
        let (display, _) = watch::channel(DisplayState {
            phase: ClassificationPhase::Displaying,
            message: "Predicted: a (Confidence: 0.10)".to_string(),
            busy: false,
        });

        {
            let _guard = BusyGuard::acquire(&flag, &display).expect("acquire should succeed");
            display.send_modify(|state| {
                state.phase = ClassificationPhase::Invoking;
                state.busy = true;
            });
        }

        assert_eq!(
            *display.borrow(),
            DisplayState {
                phase: ClassificationPhase::Idle,
                message: "Predicted: a (Confidence: 0.10)".to_string(),
                busy: false,
            }
        );
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn settled_guard_keeps_terminal_state() {
        let flag = AtomicBool::new(false);
        let (display, _) = watch::channel(DisplayState::default());

        BusyGuard::acquire(&flag, &display)
            .expect("acquire should succeed")
            .settle(ClassificationPhase::ErrorDisplaying, "Error: boom".to_string());

        let state = display.borrow().clone();
        assert_eq!(state.phase, ClassificationPhase::ErrorDisplaying);
        assert_eq!(state.message, "Error: boom");
        assert!(!state.busy);
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn terminal_phases_accept_new_selection() {
        assert!(ClassificationPhase::Idle.accepts_selection());
        assert!(ClassificationPhase::Displaying.accepts_selection());
        assert!(ClassificationPhase::ErrorDisplaying.accepts_selection());
        assert!(!ClassificationPhase::Normalizing.accepts_selection());
        assert!(!ClassificationPhase::Invoking.accepts_selection());
        assert!(!ClassificationPhase::Decoding.accepts_selection());
    }

    #[tokio::test]
    async fn missing_image_cannot_overwrite_a_running_cycle() {
        let service = service_with(|_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            Ok(ModelOutput::default())
        });

        let guard =
            BusyGuard::acquire(&service.busy, &service.display).expect("acquire should succeed");
        service.transition(ClassificationPhase::Normalizing, true);
        let running = service.display_state();

        assert_eq!(service.classify(None).await, Err(ClassifierError::Busy));
        assert_eq!(service.display_state(), running);
        assert!(service.is_busy());

        drop(guard);
        assert_eq!(service.classify(None).await, Err(ClassifierError::NoImage));
        let state = service.display_state();
        assert_eq!(state.phase, ClassificationPhase::Idle);
        assert_eq!(state.message, "No image to classify");
        assert!(!state.busy);
        assert!(!service.is_busy());
    }

    #[tokio::test]
    async fn successful_cycle_ends_in_displaying() {
        let service = service_with(|_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            Ok(ModelOutput::new(
                "class_5",
                HashMap::from([("class_5".to_string(), 0.8734)]),
            ))
        });

        let result = service.classify(Some(photo())).await.expect("classification should succeed");

        assert_eq!(result.to_string(), "Predicted: f (Confidence: 0.87)");
        assert_eq!(
            service.display_state(),
            DisplayState {
                phase: ClassificationPhase::Displaying,
                message: "Predicted: f (Confidence: 0.87)".to_string(),
                busy: false,
            }
        );
        assert!(!service.is_busy());
    }

    #[tokio::test]
    async fn model_failure_is_shown_verbatim() {
        let service = service_with(|_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            Err("Failed to load model resource".into())
        });

        let err = service.classify(Some(photo())).await.expect_err("model should fail");

        assert_eq!(err.code(), "model_invocation");
        let state = service.display_state();
        assert_eq!(state.phase, ClassificationPhase::ErrorDisplaying);
        assert_eq!(state.message, "Error: Failed to load model resource");
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn panicking_model_still_clears_busy() {
        let service = service_with(|_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            panic!("native inference crashed")
        });

        let err = service.classify(Some(photo())).await.expect_err("worker loss should fail");

        assert!(matches!(err, ClassifierError::ModelInvocation(_)));
        assert!(!service.is_busy());
        assert_eq!(service.display_state().phase, ClassificationPhase::ErrorDisplaying);
    }

    #[tokio::test]
    async fn profile_strings_are_forwarded() {
        let service = service_with(|_: &NormalizedBuffer| -> Result<ModelOutput, ModelError> {
            Ok(ModelOutput::default())
        });

        service
            .set_performance_profile("quality")
            .expect("profile switch should succeed");
        assert_eq!(
            service.get_performance_profile().expect("profile read should succeed"),
            "quality"
        );
        assert!(service.set_performance_profile("ultra").is_err());
    }
}
