//! File categories and the path classifier.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Content category of a file.
///
/// Variants are declared in tie-break priority order: when an extension is
/// known to several categories, the earliest variant wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Packages,
    Archives,
    Executables,
    Documents,
    Images,
    Videos,
    Logs,
    Other,
}

impl Category {
    /// Every category, in priority order.
    pub fn all() -> impl Iterator<Item = Category> {
        Category::iter()
    }

    /// Extensions (lowercase, without the dot) mapped to this category.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Category::Packages => &[
                "deb", "rpm", "apk", "snap", "flatpak", "whl", "crate", "pkg", "appx", "msix",
            ],
            Category::Archives => &[
                "zip", "tar", "gz", "tgz", "bz2", "tbz2", "xz", "txz", "zst", "rar", "7z", "lz",
                "lzma", "cab", "iso", "deb", "rpm",
            ],
            Category::Executables => &[
                "exe", "msi", "dmg", "app", "appimage", "bin", "run", "com", "elf", "deb", "rpm",
            ],
            Category::Documents => &[
                "pdf", "doc", "docx", "txt", "odt", "rtf", "tex", "md", "xls", "xlsx", "ods",
                "csv", "ppt", "pptx", "odp", "epub",
            ],
            Category::Images => &[
                "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "tiff", "tif", "ico", "heic",
                "raw",
            ],
            Category::Videos => &[
                "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "mpg", "mpeg",
            ],
            Category::Logs => &["log", "journal", "trace"],
            Category::Other => &[],
        }
    }
}

/// Maps a path (and optionally a content prefix) to a [`Category`].
///
/// Classification is pure: the classifier never touches the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathClassifier;

impl PathClassifier {
    /// Number of leading bytes the classifier wants for content sniffing.
    pub const SNIFF_LEN: usize = 512;

    /// Create a classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classify a path, falling back to `prefix` when the extension is unknown.
    pub fn classify(&self, path: &Path, prefix: Option<&[u8]>) -> Category {
        if let Some(category) = self.classify_name(path) {
            return category;
        }
        prefix.and_then(sniff).unwrap_or(Category::Other)
    }

    /// Classify using the file name alone. `None` if the extension is not recognized.
    pub fn classify_name(&self, path: &Path) -> Option<Category> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();

        if is_rotated_log(&name) {
            return Some(Category::Logs);
        }

        let ext = Path::new(&name).extension()?.to_str()?;
        Category::iter().find(|c| c.extensions().contains(&ext))
    }
}

/// `syslog.1`, `app.log.3`, `app.log.2.gz`, `kern.log.old`.
fn is_rotated_log(name: &str) -> bool {
    let stem = name.strip_suffix(".gz").unwrap_or(name);
    let Some((base, suffix)) = stem.rsplit_once('.') else {
        return false;
    };
    let numbered = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
    (base.ends_with(".log") && (numbered || suffix == "old"))
        || (numbered && matches!(base, "syslog" | "messages" | "dmesg" | "wtmp" | "btmp"))
}

/// Identify a category from magic numbers.
fn sniff(bytes: &[u8]) -> Option<Category> {
    const MAGIC: &[(usize, &[u8], Category)] = &[
        (0, b"!<arch>\ndebian", Category::Packages),
        (0, &[0xED, 0xAB, 0xEE, 0xDB], Category::Packages),
        (0, b"PK\x03\x04", Category::Archives),
        (0, &[0x1F, 0x8B], Category::Archives),
        (0, b"BZh", Category::Archives),
        (0, &[0xFD, b'7', b'z', b'X', b'Z', 0x00], Category::Archives),
        (0, &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C], Category::Archives),
        (0, &[0x28, 0xB5, 0x2F, 0xFD], Category::Archives),
        (0, b"Rar!\x1A\x07", Category::Archives),
        (257, b"ustar", Category::Archives),
        (0, b"\x7FELF", Category::Executables),
        (0, b"MZ", Category::Executables),
        (0, b"#!", Category::Executables),
        (0, b"%PDF", Category::Documents),
        (0, b"{\\rtf", Category::Documents),
        (0, &[0x89, b'P', b'N', b'G'], Category::Images),
        (0, &[0xFF, 0xD8, 0xFF], Category::Images),
        (0, b"GIF87a", Category::Images),
        (0, b"GIF89a", Category::Images),
        (0, b"BM", Category::Images),
        (4, b"ftyp", Category::Videos),
        (0, &[0x1A, 0x45, 0xDF, 0xA3], Category::Videos),
        (0, &[0x00, 0x00, 0x01, 0xBA], Category::Videos),
    ];

    let matched = MAGIC
        .iter()
        .filter(|(offset, magic, _)| {
            bytes
                .get(*offset..*offset + magic.len())
                .is_some_and(|window| window == *magic)
        })
        .map(|(_, _, category)| *category)
        .min();

    if matched.is_some() {
        return matched;
    }

    // RIFF containers: AVI is video, WEBP is an image.
    if bytes.starts_with(b"RIFF") {
        match bytes.get(8..12) {
            Some(b"AVI ") => return Some(Category::Videos),
            Some(b"WEBP") => return Some(Category::Images),
            _ => {}
        }
    }

    None
}
