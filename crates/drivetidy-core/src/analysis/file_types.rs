/// File type categorisation based on file extensions.
///
/// Groups files into broad categories (Documents, Images, Video, Audio,
/// Archives, Code, Executables, System, Other) and computes size/count
/// totals per category. The same classifier drives the scattered-type
/// structure check.
use super::names::split_name;
use crate::model::ItemStore;
use serde::Serialize;
use std::collections::HashMap;

/// Broad file type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FileCategory {
    Documents,
    Images,
    Video,
    Audio,
    Archives,
    Code,
    Executables,
    System,
    Other,
}

impl FileCategory {
    /// Every category, in display order.
    pub const ALL: [FileCategory; 9] = [
        Self::Documents,
        Self::Images,
        Self::Video,
        Self::Audio,
        Self::Archives,
        Self::Code,
        Self::Executables,
        Self::System,
        Self::Other,
    ];

    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Images => "Images",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Archives => "Archives",
            Self::Code => "Code",
            Self::Executables => "Executables",
            Self::System => "System",
            Self::Other => "Other",
        }
    }

    /// Lowercase folder-name words that mark a folder as the home of this
    /// category.
    pub fn folder_aliases(self) -> &'static [&'static str] {
        match self {
            Self::Documents => &["documents", "document", "docs", "doc", "papers"],
            Self::Images => &["images", "image", "photos", "photo", "pictures", "pics", "img"],
            Self::Video => &["video", "videos", "movies", "films", "clips"],
            Self::Audio => &["audio", "music", "sounds", "recordings", "podcasts"],
            Self::Archives => &["archives", "archive", "backups", "backup", "zips"],
            Self::Code => &["code", "src", "source", "scripts", "projects", "dev"],
            Self::Executables => &["executables", "programs", "installers", "apps", "setup"],
            Self::System => &["system", "logs", "config"],
            Self::Other => &[],
        }
    }

    /// Whether `folder_name` names this category, e.g. "My Photos" for
    /// `Images`.
    pub fn is_named_by(self, folder_name: &str) -> bool {
        let aliases = self.folder_aliases();
        let label = self.label().to_lowercase();
        folder_name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .any(|word| word == label || aliases.contains(&word.as_str()))
    }
}

/// Size and count totals for a single file category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: FileCategory,
    pub total_size: u64,
    pub file_count: u64,
}

/// Categorise a file extension into a broad category.
///
/// Extensions are lowercased into a fixed-size stack buffer rather than a
/// `String`. Extensions longer than 16 bytes are treated as `Other`.
pub fn categorise_extension(ext: &str) -> FileCategory {
    let bytes = ext.as_bytes();
    if bytes.len() > 16 {
        return FileCategory::Other;
    }

    let mut lower = [0u8; 16];
    for (dest, &src) in lower.iter_mut().zip(bytes.iter()) {
        *dest = src.to_ascii_lowercase();
    }
    let lower_str = match std::str::from_utf8(&lower[..bytes.len()]) {
        Ok(s) => s,
        Err(_) => return FileCategory::Other,
    };

    match lower_str {
        "doc" | "docx" | "pdf" | "txt" | "rtf" | "odt" | "ods" | "odp" | "xls" | "xlsx" | "ppt"
        | "pptx" | "csv" | "md" | "epub" | "pages" | "numbers" | "key" => FileCategory::Documents,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tiff" | "tif"
        | "psd" | "raw" | "cr2" | "nef" | "heic" | "heif" => FileCategory::Images,
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "3gp" => {
            FileCategory::Video
        }
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" | "opus" => FileCategory::Audio,
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "zst" | "cab" | "iso" | "dmg" => {
            FileCategory::Archives
        }
        "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "c" | "cpp" | "h" | "hpp" | "cs" | "java"
        | "go" | "rb" | "php" | "swift" | "kt" | "scala" | "html" | "css" | "scss" | "json"
        | "xml" | "yaml" | "yml" | "toml" | "sql" | "sh" | "bat" | "ps1" | "ipynb" => {
            FileCategory::Code
        }
        "exe" | "msi" | "dll" | "so" | "dylib" | "app" | "apk" | "deb" | "rpm" | "pkg" => {
            FileCategory::Executables
        }
        "sys" | "drv" | "inf" | "log" | "dat" | "reg" | "tmp" | "bak" | "ini" => {
            FileCategory::System
        }
        _ => FileCategory::Other,
    }
}

/// Categorise a file by the extension of its name.
pub fn categorise_name(name: &str) -> FileCategory {
    categorise_extension(split_name(name).1)
}

/// Compute per-category size and count stats for every file in the store,
/// largest category first (ties in display order).
pub fn analyse_file_types(store: &ItemStore) -> Vec<CategoryStats> {
    let mut map: HashMap<FileCategory, CategoryStats> = HashMap::with_capacity(9);

    for item in store.files() {
        let cat = categorise_name(&item.name);
        let entry = map.entry(cat).or_insert_with(|| CategoryStats {
            category: cat,
            total_size: 0,
            file_count: 0,
        });
        entry.total_size += item.size();
        entry.file_count += 1;
    }

    let mut results: Vec<CategoryStats> = map.into_values().collect();
    results.sort_by(|a, b| {
        b.total_size
            .cmp(&a.total_size)
            .then_with(|| a.category.cmp(&b.category))
    });
    results
}
