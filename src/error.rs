//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，宿主桥接层（移动端绑定、命令分发等）
//! 统一返回 `Result<T, AppError>`，通过 `Serialize` 拿到可直接展示的错误文本。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ClassifierError`、`serde_json::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串。

use serde::Serialize;

use crate::classifier::ClassifierError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 分类流水线错误（加载 / 归一化 / 模型调用）
    #[error("{0}")]
    Classifier(#[from] ClassifierError),

    /// 设置内容不合法
    #[error("设置无效: {0}")]
    Settings(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置 JSON 结构无法解析
    #[error("设置解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
