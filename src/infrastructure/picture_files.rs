//! ファイルシステムからの画像の読み込み

use crate::application::controllers::AddPaintingController;
use crate::application::view::View;
use crate::domain::painting::entities::PaintingId;
use crate::domain::painting::errors::PictureError;
use crate::domain::painting::repositories::{PaintingService, PictureProvider};
use crate::domain::painting::value_objects::{MediaType, PickedPicture, PictureData};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 画像ファイルを読み込む
///
/// ファイルが存在し、読み込み可能で、空でないことを確認する
pub async fn open_picture_file(path: &Path) -> Result<PickedPicture, PictureError> {
    let shown = path.display().to_string();
    let not_readable = |reason: String| PictureError::NotReadable {
        path: shown.clone(),
        reason,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => not_readable("file does not exist".to_string()),
        _ => not_readable(e.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(not_readable("not a regular file".to_string()));
    }
    if metadata.len() == 0 {
        return Err(PictureError::Empty {
            path: shown.clone(),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| not_readable(e.to_string()))?;
    if bytes.is_empty() {
        return Err(PictureError::Empty { path: shown });
    }
    debug!(path = %shown, bytes = bytes.len(), "画像ファイルを読み込みました");

    Ok(PickedPicture::new(Some(shown), PictureData::from(bytes)))
}

/// グロブパターンに一致する画像ファイルを名前順に列挙する
pub fn find_picture_files(pattern: &str) -> Result<Vec<PathBuf>, PictureError> {
    let entries = glob::glob(pattern).map_err(|e| PictureError::Unavailable {
        message: format!("invalid pattern {pattern}: {e}"),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("パスを読み込めません: {}", e);
                None
            }
        })
        .filter(|path| path.is_file() && is_picture_path(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_picture_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MediaType::from_extension(ext) != MediaType::Unknown)
        .unwrap_or(false)
}

/// 指定したファイルを順に返す画像選択
///
/// キューが空になると選択はキャンセル扱い
#[derive(Default)]
pub struct FilePictureProvider {
    queue: Mutex<VecDeque<PathBuf>>,
}

impl FilePictureProvider {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            queue: Mutex::new(paths.into_iter().collect()),
        }
    }

    pub fn push(&self, path: impl Into<PathBuf>) {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(path.into());
    }

    pub fn remaining(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl PictureProvider for FilePictureProvider {
    async fn pick(&self) -> Result<Option<PickedPicture>, PictureError> {
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match next {
            Some(path) => open_picture_file(&path).await.map(Some),
            None => Ok(None),
        }
    }
}

/// 一括取り込みの結果
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<PaintingId>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// パターンに一致する画像ファイルをそれぞれ新しい絵画として取り込む
///
/// タイトルはファイル名から拡張子を除いたもの
pub async fn import_pictures(
    pattern: &str,
    service: Arc<dyn PaintingService>,
    view: Arc<dyn View>,
) -> Result<ImportReport, PictureError> {
    let files = find_picture_files(pattern)?;
    info!("{}件の画像ファイルを取り込みます: {}", files.len(), pattern);

    let mut report = ImportReport::default();
    for path in files {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
            .unwrap_or_default();
        let provider = Arc::new(FilePictureProvider::new([path.clone()]));
        let controller = AddPaintingController::new(service.clone(), provider, view.clone());
        controller.set_title(&title).await;

        let result = match controller.pick_image().await {
            Ok(true) => controller.submit().await.map(|painting| painting.id),
            Ok(false) => continue,
            Err(e) => Err(e),
        };
        match result {
            Ok(id) => report.imported.push(id),
            Err(e) => {
                warn!(path = %path.display(), "取り込みに失敗しました: {}", e);
                report.skipped.push((path, e.to_string()));
            }
        }
    }

    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "画像ファイルの取り込みが完了しました"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{RecordingView, sample_png};
    use crate::infrastructure::InMemoryPaintingService;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("paiman-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_open_picture_file_checks() {
        let dir = scratch_dir();
        let missing = dir.join("missing.png");
        assert!(matches!(
            open_picture_file(&missing).await,
            Err(PictureError::NotReadable { .. })
        ));

        let empty = dir.join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            open_picture_file(&empty).await,
            Err(PictureError::Empty { .. })
        ));

        assert!(matches!(
            open_picture_file(&dir).await,
            Err(PictureError::NotReadable { .. })
        ));

        let good = dir.join("good.png");
        std::fs::write(&good, sample_png(4, 4, [1, 2, 3])).unwrap();
        let picked = open_picture_file(&good).await.unwrap();
        assert_eq!(picked.data.media_type(), MediaType::Png);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_provider_drains_queue() {
        let dir = scratch_dir();
        let path = dir.join("sketch.png");
        std::fs::write(&path, sample_png(4, 4, [1, 2, 3])).unwrap();

        let provider = FilePictureProvider::new([path]);
        assert_eq!(provider.remaining(), 1);
        assert!(provider.pick().await.unwrap().is_some());
        assert!(provider.pick().await.unwrap().is_none());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_import_pictures() {
        let dir = scratch_dir();
        std::fs::write(dir.join("blue_hour.png"), sample_png(8, 8, [0, 0, 200])).unwrap();
        std::fs::write(dir.join("broken.jpg"), b"not really a jpeg").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let service = Arc::new(InMemoryPaintingService::new(16));
        let view = RecordingView::new();
        let pattern = format!("{}/*", dir.display());
        let report = import_pictures(&pattern, service.clone(), view).await.unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        let painting = service.get(&report.imported[0]).await.unwrap();
        assert_eq!(painting.title, "blue hour");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
