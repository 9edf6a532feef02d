//! ImageNet 标签表
//!
//! # 设计思路
//!
//! 模型输出的类别下标 0~999 对应 ImageNet-1k 的 1000 个类别。
//! 标签以纯文本资源随库打包（每行一个，按下标顺序），
//! 通过 `once_cell::sync::Lazy` 在首次访问时解析一次，此后只读共享。

use once_cell::sync::Lazy;

/// ImageNet-1k 类别数。
pub const IMAGENET_CLASS_COUNT: usize = 1000;

static IMAGENET_LABELS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let labels: Vec<&'static str> = include_str!("../assets/imagenet_classes.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    log::debug!("🏷️ 标签表已加载：{} 项", labels.len());
    labels
});

/// 全局只读标签表，下标即类别编号。
pub fn imagenet_labels() -> &'static [&'static str] {
    IMAGENET_LABELS.as_slice()
}

/// 按类别编号取标签。
pub fn imagenet_label(index: usize) -> Option<&'static str> {
    imagenet_labels().get(index).copied()
}
