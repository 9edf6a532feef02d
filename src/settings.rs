//! 宿主设置
//!
//! 宿主以 JSON 形式下发分类设置（camelCase 字段，全部可缺省），
//! 解析后一次性写入 `ClassificationHandler` 的运行时配置。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassificationHandler, NormalizerConfig, PerformanceProfile, PixelLayout};
use crate::error::AppError;

/// 可由宿主调整的分类设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    pub performance_profile: String,
    pub pixel_layout: PixelLayout,
    pub max_file_size: u64,
    pub max_decoded_pixels: u64,
    pub max_decoded_bytes: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from_config(&NormalizerConfig::default())
    }
}

impl ClassifierSettings {
    fn from_config(config: &NormalizerConfig) -> Self {
        Self {
            performance_profile: config.infer_performance_profile().as_str().to_string(),
            pixel_layout: config.pixel_layout,
            max_file_size: config.max_file_size,
            max_decoded_pixels: config.max_decoded_pixels,
            max_decoded_bytes: config.max_decoded_bytes,
        }
    }

    /// 解析宿主下发的 JSON；`null` 视为全部缺省。
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AppError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// 读取处理器当前生效的设置。
    pub fn from_handler(handler: &ClassificationHandler) -> Result<Self, AppError> {
        Ok(Self::from_config(&handler.config_snapshot()?))
    }

    fn validate(&self) -> Result<PerformanceProfile, AppError> {
        let profile = PerformanceProfile::from_str(&self.performance_profile)
            .map_err(|e| AppError::Settings(e.to_string()))?;

        for (name, value) in [
            ("maxFileSize", self.max_file_size),
            ("maxDecodedPixels", self.max_decoded_pixels),
            ("maxDecodedBytes", self.max_decoded_bytes),
        ] {
            if value == 0 {
                return Err(AppError::Settings(format!("{} must be positive", name)));
            }
        }

        Ok(profile)
    }

    /// 校验后写入处理器配置；校验失败时不修改现有配置。
    pub fn apply_to(&self, handler: &ClassificationHandler) -> Result<(), AppError> {
        let profile = self.validate()?;

        handler.update_config(|config| {
            config.apply_performance_profile(profile);
            config.pixel_layout = self.pixel_layout;
            config.max_file_size = self.max_file_size;
            config.max_decoded_pixels = self.max_decoded_pixels;
            config.max_decoded_bytes = self.max_decoded_bytes;
        })?;

        log::info!(
            "⚙️ 分类设置已应用：profile={} layout={:?}",
            profile.as_str(),
            self.pixel_layout
        );
        Ok(())
    }
}

/// 读取设置文件；文件不存在时返回 `None`。
pub fn load_settings(path: &Path) -> Result<Option<ClassifierSettings>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<serde_json::Value>(&content)?;
    ClassifierSettings::from_json(&parsed).map(Some)
}

/// 以格式化 JSON 写入设置文件，必要时创建父目录。
pub fn save_settings(path: &Path, settings: &ClassifierSettings) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops::FilterType;
    use serde_json::json;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = ClassifierSettings::from_json(&json!({ "performanceProfile": "speed" }))
            .expect("settings should parse");

        assert_eq!(settings.performance_profile, "speed");
        assert_eq!(settings.pixel_layout, PixelLayout::NoneSkipFirst);
        assert_eq!(settings.max_file_size, NormalizerConfig::default().max_file_size);
        assert_eq!(
            ClassifierSettings::from_json(&serde_json::Value::Null).expect("null should parse"),
            ClassifierSettings::default()
        );
    }

    #[test]
    fn apply_updates_handler_config() {
        let handler = ClassificationHandler::default();
        let settings = ClassifierSettings::from_json(&json!({
            "performanceProfile": "quality",
            "pixelLayout": "premultipliedFirst",
            "maxFileSize": 1024
        }))
        .expect("settings should parse");

        settings.apply_to(&handler).expect("settings should apply");

        let config = handler.config_snapshot().expect("snapshot should succeed");
        assert_eq!(config.resize_filter, FilterType::CatmullRom);
        assert_eq!(config.pixel_layout, PixelLayout::PremultipliedFirst);
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(
            ClassifierSettings::from_handler(&handler).expect("read back should succeed"),
            settings
        );
    }

    #[test]
    fn invalid_settings_leave_config_untouched() {
        let handler = ClassificationHandler::default();

        let unknown = ClassifierSettings::from_json(&json!({ "performanceProfile": "turbo" }))
            .expect("settings should parse");
        assert!(matches!(unknown.apply_to(&handler), Err(AppError::Settings(_))));

        let zero = ClassifierSettings::from_json(&json!({ "maxDecodedPixels": 0 }))
            .expect("settings should parse");
        assert!(matches!(zero.apply_to(&handler), Err(AppError::Settings(_))));

        assert_eq!(
            ClassifierSettings::from_handler(&handler).expect("read back should succeed"),
            ClassifierSettings::default()
        );
    }

    #[test]
    fn wrong_json_shape_is_json_error() {
        let result = ClassifierSettings::from_json(&json!({ "maxFileSize": "huge" }));
        assert!(matches!(result, Err(AppError::Json(_))));
    }

    #[test]
    fn settings_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("image-classifier-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        assert_eq!(load_settings(&path).expect("missing file is not an error"), None);

        let settings = ClassifierSettings {
            performance_profile: "speed".to_string(),
            ..ClassifierSettings::default()
        };
        save_settings(&path, &settings).expect("settings should save");
        assert_eq!(load_settings(&path).expect("settings should load"), Some(settings));

        let _ = fs::remove_dir_all(&dir);
    }
}
