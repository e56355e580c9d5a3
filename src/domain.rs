//! ドメイン層
//!
//! 絵画レコードと、外部サービスとの境界となるトレイトを含む層

pub mod painting;
pub mod shared;
