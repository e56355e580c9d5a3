use rust_embed::Embed;

/// Web ビューの静的アセットを埋め込む
#[derive(Embed)]
#[folder = "web/"]
#[include = "*"]
#[include = "**/*"]
pub struct WebAssets;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_assets_available() {
        for path in ["index.html", "css/style.css", "js/bridge.js"] {
            assert!(WebAssets::get(path).is_some(), "{path} が埋め込まれていません");
        }
    }

    #[test]
    fn test_bridge_script_defines_document_functions() {
        let script = WebAssets::get("js/bridge.js").unwrap();
        let script = std::str::from_utf8(&script.data).unwrap();
        for function in [
            "updatePaintings",
            "setRefreshing",
            "setSelection",
            "refreshPreviews",
            "openAddDialog",
            "addDialogSetPicture",
            "closeAddDialog",
            "openPicturePicker",
            "updateHolder",
            "showFieldError",
            "showError",
            "showNotification",
        ] {
            assert!(script.contains(&format!("function {function}(")), "{function} がありません");
        }
    }
}
