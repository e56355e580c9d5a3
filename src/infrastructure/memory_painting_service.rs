use crate::domain::painting::entities::{Painting, PaintingId, PictureId, PictureRef};
use crate::domain::painting::errors::ServiceError;
use crate::domain::painting::repositories::{
    ChangeKind, ChangeNotification, PaintingQuery, PaintingService, QueryRow, QueryService,
};
use crate::domain::painting::value_objects::{PictureData, normalize_tag, normalize_title};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument};

/// 変更通知のバッファ
const CHANGE_CAPACITY: usize = 64;

struct StoredPainting {
    painting: Painting,
    /// 作成順
    sequence: u64,
}

struct StoredPicture {
    data: PictureData,
    thumbnail: Option<Arc<[u8]>>,
}

/// インメモリの絵画サービス実装
///
/// クエリは作成順に全件を返す。サムネイルは最初に要求されたときに JPEG で作成する。
pub struct InMemoryPaintingService {
    paintings: Arc<RwLock<HashMap<PaintingId, StoredPainting>>>,
    pictures: Arc<RwLock<HashMap<PictureId, StoredPicture>>>,
    sequence: AtomicU64,
    changes: broadcast::Sender<ChangeNotification>,
    thumbnail_size: u32,
}

impl InMemoryPaintingService {
    pub fn new(thumbnail_size: u32) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            paintings: Arc::new(RwLock::new(HashMap::new())),
            pictures: Arc::new(RwLock::new(HashMap::new())),
            sequence: AtomicU64::new(0),
            changes,
            thumbnail_size: thumbnail_size.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.paintings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.paintings.read().await.is_empty()
    }

    fn notify(&self, id: &PaintingId, kind: ChangeKind) {
        // 購読者がいない場合は送信エラーになるが問題ない
        let _ = self.changes.send(ChangeNotification::new(id.clone(), kind));
    }

    async fn store_pictures(&self, pictures: Vec<PictureData>) -> Result<Vec<PictureRef>, ServiceError> {
        if let Some(index) = pictures.iter().position(PictureData::is_empty) {
            return Err(ServiceError::InvalidInput {
                message: format!("picture #{index} is empty"),
            });
        }

        let mut stored = self.pictures.write().await;
        Ok(pictures
            .into_iter()
            .map(|data| {
                let reference = PictureRef::describe(PictureId::generate(), &data);
                stored.insert(
                    reference.id.clone(),
                    StoredPicture {
                        data,
                        thumbnail: None,
                    },
                );
                reference
            })
            .collect())
    }

    async fn discard_pictures(&self, pictures: &[PictureRef]) {
        let mut stored = self.pictures.write().await;
        for picture in pictures {
            stored.remove(&picture.id);
        }
    }

    /// 保存済みのバージョンと一致する場合だけ変更を適用する
    async fn update<F>(&self, expected: &Painting, apply: F) -> Result<Painting, ServiceError>
    where
        F: FnOnce(&Painting) -> Painting,
    {
        let mut paintings = self.paintings.write().await;
        let stored = paintings
            .get_mut(&expected.id)
            .ok_or_else(|| ServiceError::NotFound {
                id: expected.id.clone(),
            })?;
        if stored.painting.version != expected.version {
            debug!(
                painting_id = %expected.id,
                stored = stored.painting.version,
                expected = expected.version,
                "バージョンが一致しません"
            );
            return Err(ServiceError::ConcurrentModification {
                id: expected.id.clone(),
            });
        }

        let next = apply(&stored.painting);
        stored.painting = next.clone();
        drop(paintings);

        self.notify(&next.id, ChangeKind::Updated);
        Ok(next)
    }

    async fn attach<F>(
        &self,
        painting: &Painting,
        pictures: Vec<PictureData>,
        apply: F,
    ) -> Result<Painting, ServiceError>
    where
        F: FnOnce(&Painting, Vec<PictureRef>) -> Painting,
    {
        let references = self.store_pictures(pictures).await?;
        let attached = references.clone();
        let result = self.update(painting, move |stored| apply(stored, attached)).await;
        if result.is_err() {
            self.discard_pictures(&references).await;
        }
        result
    }

    async fn picture_bytes(&self, picture: &PictureRef) -> Result<PictureData, ServiceError> {
        self.pictures
            .read()
            .await
            .get(&picture.id)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| ServiceError::PictureNotFound {
                id: picture.id.clone(),
            })
    }
}

#[async_trait]
impl PaintingService for InMemoryPaintingService {
    async fn get(&self, id: &PaintingId) -> Result<Painting, ServiceError> {
        self.paintings
            .read()
            .await
            .get(id)
            .map(|stored| stored.painting.clone())
            .ok_or_else(|| ServiceError::NotFound { id: id.clone() })
    }

    #[instrument(skip(self, main_picture), fields(bytes = main_picture.len()))]
    async fn compose_new(&self, title: &str, main_picture: PictureData) -> Result<Painting, ServiceError> {
        let title = normalize_title(title).ok_or_else(|| ServiceError::InvalidInput {
            message: "title is empty".to_string(),
        })?;
        let mut references = self.store_pictures(vec![main_picture]).await?;
        let main = references.remove(0);

        let painting = Painting::new(title, main);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.paintings.write().await.insert(
            painting.id.clone(),
            StoredPainting {
                painting: painting.clone(),
                sequence,
            },
        );
        info!(painting_id = %painting.id, title = %painting.title, "絵画を作成しました");

        self.notify(&painting.id, ChangeKind::Created);
        Ok(painting)
    }

    #[instrument(skip_all, fields(painting_id = %painting.id, count = pictures.len()))]
    async fn add_wip(&self, painting: &Painting, pictures: Vec<PictureData>) -> Result<Painting, ServiceError> {
        self.attach(painting, pictures, |stored, references| stored.with_wip(references))
            .await
    }

    #[instrument(skip_all, fields(painting_id = %painting.id, count = pictures.len()))]
    async fn add_references(
        &self,
        painting: &Painting,
        pictures: Vec<PictureData>,
    ) -> Result<Painting, ServiceError> {
        self.attach(painting, pictures, |stored, references| {
            stored.with_references(references)
        })
        .await
    }

    #[instrument(skip_all, fields(painting_id = %painting.id))]
    async fn add_tags(&self, painting: &Painting, tags: BTreeSet<String>) -> Result<Painting, ServiceError> {
        let tags: BTreeSet<String> = tags.iter().filter_map(|tag| normalize_tag(tag)).collect();
        if tags.is_empty() {
            return Err(ServiceError::InvalidInput {
                message: "no tags to add".to_string(),
            });
        }
        self.update(painting, |stored| stored.with_tags(tags)).await
    }

    #[instrument(skip_all, fields(painting_id = %painting.id, version = painting.version))]
    async fn change(&self, painting: &Painting) -> Result<Painting, ServiceError> {
        if normalize_title(&painting.title).is_none() {
            return Err(ServiceError::InvalidInput {
                message: "title is empty".to_string(),
            });
        }
        self.update(painting, |stored| stored.accept_change(painting)).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &PaintingId) -> Result<(), ServiceError> {
        let removed = self
            .paintings
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound { id: id.clone() })?;

        let pictures: Vec<PictureRef> = removed.painting.pictures().cloned().collect();
        self.discard_pictures(&pictures).await;
        info!(painting_id = %id, "絵画を削除しました");

        self.notify(id, ChangeKind::Deleted);
        Ok(())
    }

    async fn picture_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError> {
        Ok(self.picture_bytes(picture).await?.bytes().to_vec())
    }

    async fn picture_thumbnail_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError> {
        let cached = self
            .pictures
            .read()
            .await
            .get(&picture.id)
            .and_then(|stored| stored.thumbnail.clone());
        if let Some(thumbnail) = cached {
            return Ok(thumbnail.to_vec());
        }

        let data = self.picture_bytes(picture).await?;
        let size = self.thumbnail_size;
        let thumbnail: Arc<[u8]> = tokio::task::spawn_blocking(move || encode_thumbnail(&data, size))
            .await
            .map_err(|e| ServiceError::Internal {
                message: e.to_string(),
            })??
            .into();

        if let Some(stored) = self.pictures.write().await.get_mut(&picture.id) {
            stored.thumbnail = Some(thumbnail.clone());
        }
        Ok(thumbnail.to_vec())
    }
}

impl QueryService for InMemoryPaintingService {
    fn all_paintings_query(&self) -> Arc<dyn PaintingQuery> {
        Arc::new(AllPaintingsQuery {
            paintings: self.paintings.clone(),
            changes: self.changes.clone(),
        })
    }
}

/// すべての絵画を作成順に返すクエリ
struct AllPaintingsQuery {
    paintings: Arc<RwLock<HashMap<PaintingId, StoredPainting>>>,
    changes: broadcast::Sender<ChangeNotification>,
}

#[async_trait]
impl PaintingQuery for AllPaintingsQuery {
    async fn run(&self) -> Result<Vec<QueryRow>, ServiceError> {
        let paintings = self.paintings.read().await;
        let mut rows: Vec<(u64, PaintingId)> = paintings
            .values()
            .map(|stored| (stored.sequence, stored.painting.id.clone()))
            .collect();
        rows.sort_unstable_by_key(|(sequence, _)| *sequence);
        Ok(rows.into_iter().map(|(_, id)| QueryRow { id }).collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.changes.subscribe()
    }
}

fn encode_thumbnail(data: &PictureData, size: u32) -> Result<Vec<u8>, ServiceError> {
    let image = image::load_from_memory(data.bytes()).map_err(|e| ServiceError::Storage {
        message: format!("thumbnail unavailable: {e}"),
    })?;
    let thumbnail = image.resize(size, size, FilterType::Triangle).to_rgb8();

    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(thumbnail)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| ServiceError::Internal {
            message: e.to_string(),
        })?;
    Ok(buffer)
}
