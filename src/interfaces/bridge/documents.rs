//! ドキュメントに渡すビューモデルの JSON 表現
//!
//! 画像はすべて JPEG のデータURLとして埋め込む。

use crate::application::thumbnails::encode_data_urls;
use crate::application::view_models::{DetailFields, ListSnapshot, PaintingSummary, SelectionState};
use serde::Serialize;

/// 一覧のドキュメント名
pub const OVERVIEW_DOCUMENT: &str = "overview";
/// 詳細のドキュメント名
pub const DETAIL_DOCUMENT: &str = "detail";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintingPreview {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
}

impl PaintingPreview {
    pub fn new(summary: &PaintingSummary, thumbnail: String) -> Self {
        Self {
            id: summary.id.as_str(),
            title: summary.title.clone(),
            thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionModel {
    pub count: usize,
    pub title: String,
    pub positions: Vec<usize>,
}

impl From<&SelectionState> for SelectionModel {
    fn from(selection: &SelectionState) -> Self {
        Self {
            count: selection.count(),
            title: selection.title(),
            positions: selection.positions().collect(),
        }
    }
}

/// 一覧ドキュメントのモデル
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewModel {
    pub paintings: Vec<PaintingPreview>,
    pub selection: SelectionModel,
}

impl OverviewModel {
    pub async fn encode(
        snapshot: &ListSnapshot,
        selection: &SelectionState,
        placeholder_size: u32,
    ) -> Self {
        let thumbnails = snapshot.items.iter().map(|item| item.thumbnail.clone()).collect();
        let urls = encode_data_urls(thumbnails, placeholder_size).await;
        Self {
            paintings: snapshot
                .items
                .iter()
                .zip(urls)
                .map(|(item, url)| PaintingPreview::new(item, url))
                .collect(),
            selection: selection.into(),
        }
    }
}

/// 詳細ドキュメントのモデル
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailHolder {
    pub id: String,
    pub title: String,
    pub main_image: String,
    /// 降順。ドキュメント側は先頭に追加していくため
    pub tags: Vec<String>,
    /// 新しい順
    pub wips: Vec<String>,
    pub refs: Vec<String>,
    pub finished: bool,
    /// `YYYY-MM-DD`
    pub finishing_date: Option<String>,
    pub version: u32,
}

impl DetailHolder {
    pub async fn encode(fields: &DetailFields, placeholder_size: u32) -> Self {
        let painting = &fields.painting;
        let images = std::iter::once(fields.main_image.image.clone())
            .chain(fields.wips.iter().map(|wip| wip.image.clone()))
            .chain(fields.refs.iter().map(|reference| reference.image.clone()))
            .collect();
        let mut urls = encode_data_urls(images, placeholder_size).await.into_iter();

        let main_image = urls.next().unwrap_or_default();
        let wips = urls.by_ref().take(fields.wips.len()).collect();
        let refs = urls.collect();

        Self {
            id: painting.id.as_str(),
            title: painting.title.clone(),
            main_image,
            tags: painting.tags.iter().rev().cloned().collect(),
            wips,
            refs,
            finished: painting.finished,
            finishing_date: painting
                .finishing_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
            version: painting.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::thumbnails::placeholder;
    use crate::application::view_models::DerivedImage;
    use crate::domain::painting::entities::{Painting, PaintingId, PictureId, PictureRef};
    use crate::domain::painting::value_objects::PictureData;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn derived() -> DerivedImage {
        DerivedImage {
            source: PictureId::generate(),
            image: placeholder(4),
        }
    }

    #[tokio::test]
    async fn test_detail_holder_shape() {
        let main = PictureRef::describe(PictureId::generate(), &PictureData::from(vec![1]));
        let painting = Painting::new("Canal".to_string(), main)
            .with_tags(["acrylic".to_string(), "city".to_string(), "blue".to_string()])
            .finished_on(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        let fields = DetailFields {
            painting: Arc::new(painting),
            main_image: derived(),
            wips: vec![derived(), derived()],
            refs: vec![derived()],
        };

        let holder = DetailHolder::encode(&fields, 4).await;
        assert_eq!(holder.tags, vec!["city", "blue", "acrylic"]);
        assert_eq!(holder.wips.len(), 2);
        assert_eq!(holder.refs.len(), 1);
        assert!(holder.main_image.starts_with("data:image/jpeg;base64,"));

        let value = serde_json::to_value(&holder).unwrap();
        assert_eq!(value["finishingDate"], json!("2024-03-09"));
        assert_eq!(value["finished"], json!(true));
        assert!(value.get("mainImage").is_some());
    }

    #[test]
    fn test_selection_model() {
        let mut selection = SelectionState::default();
        selection.toggle(4, PaintingId::generate());
        selection.toggle(1, PaintingId::generate());
        let model = SelectionModel::from(&selection);
        assert_eq!(model.positions, vec![1, 4]);
        assert_eq!(model.title, "2 selected");
    }
}
