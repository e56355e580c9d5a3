//! 絵画集約の外部サービストレイト
//!
//! 永続化、クエリ、画像選択はこのクレートの外側にある協調者として扱う。
//! 具体的な実装は infrastructure 層、またはアプリケーションを組み立てる側が提供する。

use crate::domain::painting::entities::{Painting, PaintingId, PictureRef};
use crate::domain::painting::errors::{PictureError, ServiceError};
use crate::domain::painting::value_objects::{PickedPicture, PictureData};
use crate::domain::shared::value_objects::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// クエリ結果の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRow {
    pub id: PaintingId,
}

/// 変更の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// クエリ対象の変更通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub id: PaintingId,
    pub kind: ChangeKind,
    pub at: Timestamp,
}

impl ChangeNotification {
    pub fn new(id: PaintingId, kind: ChangeKind) -> Self {
        Self {
            id,
            kind,
            at: Timestamp::now(),
        }
    }
}

/// 絵画サービストレイト
#[async_trait]
pub trait PaintingService: Send + Sync {
    /// 絵画を取得
    async fn get(&self, id: &PaintingId) -> Result<Painting, ServiceError>;

    /// タイトルとメイン画像から新しい絵画を作成
    async fn compose_new(&self, title: &str, main_picture: PictureData) -> Result<Painting, ServiceError>;

    /// WIP 画像を追加
    async fn add_wip(&self, painting: &Painting, pictures: Vec<PictureData>) -> Result<Painting, ServiceError>;

    /// 参考画像を追加
    async fn add_references(
        &self,
        painting: &Painting,
        pictures: Vec<PictureData>,
    ) -> Result<Painting, ServiceError>;

    /// タグを追加
    async fn add_tags(&self, painting: &Painting, tags: BTreeSet<String>) -> Result<Painting, ServiceError>;

    /// 変更内容を保存
    async fn change(&self, painting: &Painting) -> Result<Painting, ServiceError>;

    /// 絵画を削除
    async fn delete(&self, id: &PaintingId) -> Result<(), ServiceError>;

    /// 画像のフル解像度のバイト列を取得
    async fn picture_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError>;

    /// 画像のサムネイルのバイト列を取得
    async fn picture_thumbnail_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError>;

    /// クエリ結果の行から絵画を取得
    ///
    /// クエリ実行後に削除された行は読み飛ばす
    async fn get_from_query_result(&self, rows: &[QueryRow]) -> Result<Vec<Painting>, ServiceError> {
        let mut paintings = Vec::with_capacity(rows.len());
        for row in rows {
            match self.get(&row.id).await {
                Ok(painting) => paintings.push(painting),
                Err(ServiceError::NotFound { id }) => {
                    debug!(painting_id = %id, "クエリ結果の絵画が既に削除されています");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(paintings)
    }
}

/// ひとつのクエリ
#[async_trait]
pub trait PaintingQuery: Send + Sync {
    /// クエリを一度だけ実行
    async fn run(&self) -> Result<Vec<QueryRow>, ServiceError>;

    /// クエリ対象の変更通知を購読
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification>;
}

/// クエリサービストレイト
pub trait QueryService: Send + Sync {
    /// すべての絵画を対象とするクエリ
    fn all_paintings_query(&self) -> Arc<dyn PaintingQuery>;
}

/// 画像選択トレイト
#[async_trait]
pub trait PictureProvider: Send + Sync {
    /// ユーザーに画像を選択させる。キャンセルされた場合は `None`
    async fn pick(&self) -> Result<Option<PickedPicture>, PictureError>;
}
