//! ビューモデル
//!
//! 描画側が読む状態は常に丸ごと置き換えるイミュータブルなスナップショットとする。

use crate::application::image_cache::DecodedImage;
use crate::domain::painting::entities::{Painting, PaintingId, PictureId};
use crate::domain::painting::errors::ValidationError;
use crate::domain::painting::value_objects::{PickedPicture, PictureData, normalize_title};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 一覧の1項目
#[derive(Debug, Clone, PartialEq)]
pub struct PaintingSummary {
    pub id: PaintingId,
    pub title: String,
    pub thumbnail: DecodedImage,
    pub thumbnail_source_id: PictureId,
}

/// 一覧のスナップショット
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListSnapshot {
    /// このスナップショットを作った再読み込みの世代
    pub generation: u64,
    pub items: Vec<PaintingSummary>,
}

impl ListSnapshot {
    pub fn new(generation: u64, items: Vec<PaintingSummary>) -> Self {
        Self { generation, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&PaintingSummary> {
        self.items.get(position)
    }

    pub fn ids(&self) -> Vec<PaintingId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn contains(&self, id: &PaintingId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }
}

/// 選択中の一覧の位置と、その位置にあった絵画
///
/// 選択モードは集合が空でない間だけ有効。削除などの操作は位置ではなく絵画IDで行う
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    selected: BTreeMap<usize, PaintingId>,
}

impl SelectionState {
    /// 位置の選択を切り替える。選択された場合は `true`
    pub fn toggle(&mut self, position: usize, id: PaintingId) -> bool {
        if self.selected.remove(&position).is_some() {
            false
        } else {
            self.selected.insert(position, id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.selected.contains_key(&position)
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.keys().copied()
    }

    /// 選択中の絵画ID(位置の順)
    pub fn ids(&self) -> Vec<PaintingId> {
        self.selected.values().cloned().collect()
    }

    /// 新しい一覧での位置に付け替える。一覧から消えた絵画は選択から外す
    ///
    /// 変化があった場合は `true`
    pub fn remap(&mut self, snapshot: &ListSnapshot) -> bool {
        let remapped: BTreeMap<usize, PaintingId> = snapshot
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.selected.values().any(|id| id == &item.id))
            .map(|(position, item)| (position, item.id.clone()))
            .collect();
        if remapped == self.selected {
            return false;
        }
        self.selected = remapped;
        true
    }

    /// 選択モードのタイトル
    pub fn title(&self) -> String {
        format!("{} selected", self.count())
    }
}

/// 新しい絵画の入力中の内容
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddPaintingDraft {
    pub title: Option<String>,
    pub image: Option<PickedPicture>,
}

/// 検証済みの入力内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub title: String,
    pub image: PictureData,
}

impl AddPaintingDraft {
    /// タイトル、画像の順に検証する
    pub fn validate(&self) -> Result<ValidDraft, ValidationError> {
        let title = self
            .title
            .as_deref()
            .and_then(normalize_title)
            .ok_or(ValidationError::TitleMissing)?;
        let image = self.image.as_ref().ok_or(ValidationError::ImageMissing)?;
        if image.data.is_empty() {
            return Err(ValidationError::ImageNotReadable);
        }
        Ok(ValidDraft {
            title,
            image: image.data.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.image.is_none()
    }
}

/// 画像IDと表示用の画像
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedImage {
    pub source: PictureId,
    pub image: DecodedImage,
}

/// 詳細画面の派生フィールド
///
/// スナップショットが置き換わるたびに作り直す
#[derive(Debug, Clone)]
pub struct DetailFields {
    pub painting: Arc<Painting>,
    pub main_image: DerivedImage,
    /// 新しい順
    pub wips: Vec<DerivedImage>,
    pub refs: Vec<DerivedImage>,
}

impl DetailFields {
    /// 指定したスナップショットから作られたものか
    pub fn is_for(&self, painting: &Arc<Painting>) -> bool {
        Arc::ptr_eq(&self.painting, painting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picked(bytes: Vec<u8>) -> PickedPicture {
        PickedPicture::new(Some("canvas.png".to_string()), PictureData::from(bytes))
    }

    #[test]
    fn test_selection_toggle() {
        let mut selection = SelectionState::default();
        assert!(!selection.is_active());
        assert!(selection.toggle(2, PaintingId::generate()));
        let fifth = PaintingId::generate();
        assert!(selection.toggle(5, fifth.clone()));
        assert!(selection.is_active());
        assert_eq!(selection.title(), "2 selected");
        assert!(!selection.toggle(2, PaintingId::generate()));
        assert_eq!(selection.positions().collect::<Vec<_>>(), vec![5]);
        assert_eq!(selection.ids(), vec![fifth.clone()]);
        assert!(!selection.toggle(5, fifth));
        assert!(!selection.is_active());
    }

    #[test]
    fn test_selection_follows_paintings_to_new_positions() {
        let summary = |id: &PaintingId| PaintingSummary {
            id: id.clone(),
            title: String::new(),
            thumbnail: crate::application::thumbnails::placeholder(2),
            thumbnail_source_id: PictureId::generate(),
        };
        let (a, b, c) = (PaintingId::generate(), PaintingId::generate(), PaintingId::generate());
        let mut selection = SelectionState::default();
        selection.toggle(1, b.clone());
        selection.toggle(2, c.clone());

        // a と c が消え、先頭に新しい絵画が入った
        let added = PaintingId::generate();
        let snapshot = ListSnapshot::new(2, vec![summary(&added), summary(&b)]);
        assert!(selection.remap(&snapshot));
        assert_eq!(selection.positions().collect::<Vec<_>>(), vec![1]);
        assert_eq!(selection.ids(), vec![b]);
        assert!(!selection.remap(&snapshot));

        selection.remap(&ListSnapshot::new(3, vec![summary(&a)]));
        assert!(!selection.is_active());
    }

    #[test]
    fn test_draft_validation_order() {
        let draft = AddPaintingDraft {
            title: Some("   ".to_string()),
            image: Some(picked(vec![1, 2, 3])),
        };
        assert_eq!(draft.validate(), Err(ValidationError::TitleMissing));

        let draft = AddPaintingDraft {
            title: None,
            image: None,
        };
        assert_eq!(draft.validate(), Err(ValidationError::TitleMissing));

        let draft = AddPaintingDraft {
            title: Some("Dunes".to_string()),
            image: None,
        };
        assert_eq!(draft.validate(), Err(ValidationError::ImageMissing));

        let draft = AddPaintingDraft {
            title: Some("Dunes".to_string()),
            image: Some(picked(Vec::new())),
        };
        assert_eq!(draft.validate(), Err(ValidationError::ImageNotReadable));
    }

    #[test]
    fn test_draft_validation_success() {
        let draft = AddPaintingDraft {
            title: Some(" Dunes ".to_string()),
            image: Some(picked(vec![1, 2, 3])),
        };
        let valid = draft.validate().unwrap();
        assert_eq!(valid.title, "Dunes");
        assert_eq!(valid.image.bytes(), &[1, 2, 3]);
    }
}
