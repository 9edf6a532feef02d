//! # 图像分类前端核心：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            宿主 UI（相册 / 相机 / 结果文本 / 转圈）        │
//! │                                                          │
//! │   ImagePicker ──┐            watch::Receiver<DisplayState>│
//! └─────────────────┼──────────────────────↑─────────────────┘
//!                   ↓                      │
//! ┌─────────────────┼──────────────────────┼─────────────────┐
//! │                 ↓       后端 (Rust)    │                 │
//! │  ┌─ classifier                         │                 │
//! │  │   ├─ service   状态机 · 忙碌标记 · 展示状态 ───────────┘
//! │  │   ├─ loader    文件 / 字节 / Base64 加载               │
//! │  │   ├─ pipeline  224×224×4 归一化                        │
//! │  │   ├─ model     黑盒模型抽象                            │
//! │  │   └─ decoder   标签映射 + 置信度                       │
//! │  │                                                       │
//! │  ├─ labels ──── ImageNet-1k 标签表（只读）                │
//! │  ├─ settings ── 宿主 JSON 设置 → 运行时配置               │
//! │  └─ error ───── AppError (统一错误类型)                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，宿主桥接层的返回类型 |
//! | [`classifier`] | 图片加载、归一化、模型调用、结果解码与状态机 |
//! | [`labels`] | ImageNet 1000 类标签表 |
//! | [`settings`] | 解析宿主设置并应用到分类配置 |

pub mod error;
pub mod classifier;
pub mod labels;
pub mod settings;
