//! インターフェース層
//!
//! Web ビューとのブリッジと、それを WebSocket で提供する HTTP サーバー

pub mod bridge;
pub mod web;
