//! Push-notification adapters.

pub mod wechat;

pub use wechat::WeChatGateway;
