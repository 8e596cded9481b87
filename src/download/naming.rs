//! Download filename derivation, per spec.md §4.5: `<safe_title>_<post_id><ext>`.

const MAX_TITLE_LEN: usize = 100;
const DEFAULT_EXTENSION: &str = ".mp4";

/// First 100 chars of `title`, filesystem-illegal characters collapsed
/// to `_`.
pub fn safe_title(title: &str) -> String {
    let truncated: String = title.chars().take(MAX_TITLE_LEN).collect();
    truncated
        .chars()
        .map(|c| if is_illegal(c) { '_' } else { c })
        .collect()
}

fn is_illegal(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Extension derived from the URL path when it looks like a real
/// extension (≤5 chars, starts with `.`); otherwise `.mp4`.
pub fn extension_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let path = parsed.path();
            let dot = path.rfind('.')?;
            let candidate = &path[dot..];
            (candidate.len() <= 5 && candidate.starts_with('.')).then(|| candidate.to_string())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn download_filename(title: &str, post_id: &str, media_url: &str) -> String {
    format!("{}_{}{}", safe_title(title), post_id, extension_from_url(media_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_illegal_characters() {
        assert_eq!(safe_title("a/b:c*d?"), "a_b_c_d_");
    }

    #[test]
    fn truncates_to_100_chars() {
        let long_title = "x".repeat(250);
        assert_eq!(safe_title(&long_title).chars().count(), MAX_TITLE_LEN);
    }

    #[test]
    fn extension_from_url_uses_recognizable_extension() {
        assert_eq!(extension_from_url("https://cdn/x/file.vid"), ".vid");
    }

    #[test]
    fn extension_from_url_falls_back_to_mp4() {
        assert_eq!(extension_from_url("https://cdn/x/stream?id=1"), ".mp4");
        assert_eq!(extension_from_url("https://cdn/x/file.verylongext"), ".mp4");
    }

    #[test]
    fn download_filename_combines_parts() {
        assert_eq!(download_filename("A", "X1", "https://cdn/X1.vid"), "A_X1.vid");
    }
}
