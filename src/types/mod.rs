//! 类型模块：请求输入与生成结果的核心数据类型。
//!
//! # Types Module
//!
//! Types shared between the generation cache and whatever delivery layer sits
//! in front of it.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PromptInput`] | Prompt text extracted from a parsed request body |
//! | [`ImageFormat`] | Image container detected from magic bytes |
//! | [`Resolved`] | Image bytes plus the fingerprint and cache outcome |
//! | [`CacheOutcome`] | Whether the image came from the store or the generator |

pub mod image;
pub mod prompt;

pub use image::{CacheOutcome, ImageFormat, Resolved};
pub use prompt::PromptInput;
