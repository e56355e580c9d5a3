//! 絵画集約
//!
//! 絵画レコード、添付画像の参照、外部サービスのトレイトを定義

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
