use reqwest::Url;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Used when the URL path has no usable final segment.
pub const DEFAULT_FILENAME: &str = "index.html";

/// Local file name for `url`: its last non-empty path segment, percent-decoded.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .filter(|name| {
            !matches!(name.as_str(), "." | "..") && !name.contains(['/', '\\', '\0'])
        })
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Where the download is written. `output` may name a file, or a directory
/// (existing, or spelled with a trailing separator) that receives the name
/// derived from the URL.
pub fn resolve_output_path(output: Option<&Path>, url: &Url) -> PathBuf {
    match output {
        None => PathBuf::from(filename_from_url(url)),
        Some(path) if names_directory(path) => path.join(filename_from_url(url)),
        Some(path) => path.to_path_buf(),
    }
}

fn names_directory(path: &Path) -> bool {
    let text = path.as_os_str().to_string_lossy();
    path.is_dir() || text.ends_with('/') || text.ends_with(MAIN_SEPARATOR)
}
