//! 絵画集約のエンティティ
//!
//! 絵画レコードはイミュータブルなスナップショットとして扱う。
//! 変更操作は常に新しいスナップショットを返し、元の値は変更しない。

use crate::domain::painting::value_objects::{MediaType, PictureData};
use crate::domain::shared::value_objects::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// 絵画ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaintingId(Uuid);

impl PaintingId {
    /// 新しいIDを生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// 文字列から作成
    pub fn parse(s: &str) -> Result<Self, String> {
        let uuid = Uuid::parse_str(s.trim()).map_err(|e| format!("Invalid painting id: {e}"))?;
        Ok(Self(uuid))
    }

    /// 文字列として取得
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl FromStr for PaintingId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PaintingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 画像ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PictureId(Uuid);

impl PictureId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let uuid = Uuid::parse_str(s.trim()).map_err(|e| format!("Invalid picture id: {e}"))?;
        Ok(Self(uuid))
    }
}

impl fmt::Display for PictureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 画像への参照
///
/// UI 層は画像を所有せず、この参照を使ってサービスから取得する
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PictureRef {
    pub id: PictureId,
    pub checksum: String,
    pub byte_len: u64,
    pub media_type: MediaType,
    pub added_at: Timestamp,
}

impl PictureRef {
    /// 保存済みの画像データから参照を作成
    pub fn describe(id: PictureId, data: &PictureData) -> Self {
        Self {
            id,
            checksum: data.checksum(),
            byte_len: data.len() as u64,
            media_type: data.media_type(),
            added_at: Timestamp::now(),
        }
    }
}

/// 絵画エンティティ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Painting {
    pub id: PaintingId,
    pub title: String,
    pub main_picture: PictureRef,
    /// 追加順。表示は逆順
    pub wip: Vec<PictureRef>,
    pub references: Vec<PictureRef>,
    pub tags: BTreeSet<String>,
    pub finished: bool,
    pub finishing_date: Option<NaiveDate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: u32,
}

impl Painting {
    /// 新しい絵画を作成
    pub fn new(title: String, main_picture: PictureRef) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaintingId::generate(),
            title,
            main_picture,
            wip: Vec::new(),
            references: Vec::new(),
            tags: BTreeSet::new(),
            finished: false,
            finishing_date: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// WIP 画像を追加したスナップショット
    pub fn with_wip(&self, pictures: impl IntoIterator<Item = PictureRef>) -> Self {
        let mut next = self.successor();
        next.wip.extend(pictures);
        debug!(painting_id = %self.id, wip_count = next.wip.len(), "WIP画像を追加");
        next
    }

    /// 参考画像を追加したスナップショット。同じIDの画像は重複させない
    pub fn with_references(&self, pictures: impl IntoIterator<Item = PictureRef>) -> Self {
        let mut next = self.successor();
        for picture in pictures {
            if !next.references.iter().any(|r| r.id == picture.id) {
                next.references.push(picture);
            }
        }
        next
    }

    /// タグを追加したスナップショット
    pub fn with_tags(&self, tags: impl IntoIterator<Item = String>) -> Self {
        let mut next = self.successor();
        next.tags.extend(tags);
        next
    }

    /// 完成済みとした編集内容。バージョンは進めないので `change` で保存する
    pub fn finished_on(&self, date: NaiveDate) -> Self {
        let mut edited = self.clone();
        edited.finished = true;
        edited.finishing_date = Some(date);
        edited
    }

    /// 変更内容を受け入れ、バージョンを進めたスナップショット
    pub fn accept_change(&self, changed: &Painting) -> Self {
        let mut next = changed.clone();
        next.id = self.id.clone();
        next.created_at = self.created_at;
        next.version = self.version + 1;
        next.updated_at = Timestamp::now();
        next
    }

    /// WIP 画像を新しい順に取得
    pub fn wips_most_recent_first(&self) -> impl Iterator<Item = &PictureRef> {
        self.wip.iter().rev()
    }

    /// 添付されているすべての画像
    pub fn pictures(&self) -> impl Iterator<Item = &PictureRef> {
        std::iter::once(&self.main_picture)
            .chain(self.wip.iter())
            .chain(self.references.iter())
    }

    fn successor(&self) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = Timestamp::now();
        next
    }
}
