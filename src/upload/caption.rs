//! Caption assembly and Markdown escaping, per spec.md §4.6.

const MARKDOWN_CONTROL_CHARS: &[char] = &['_', '*', '[', ']', '(', ')', '`'];

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_CONTROL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn build_caption(title: &str, width: u32, height: u32, duration_seconds: u32, size_bytes: u64) -> String {
    let minutes = duration_seconds / 60;
    let seconds = duration_seconds % 60;
    format!(
        "{}\n{}x{} · {}:{:02} · {}",
        escape_markdown(title),
        width,
        height,
        minutes,
        seconds,
        human_size(size_bytes),
    )
}

fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }
    format!("{:.1} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_control_characters() {
        assert_eq!(escape_markdown("a_b*c[d](e)`f"), "a\\_b\\*c\\[d\\]\\(e\\)\\`f");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_markdown("Hello World"), "Hello World");
    }

    #[test]
    fn human_size_formats_megabytes() {
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn build_caption_includes_duration_and_size() {
        let caption = build_caption("My Video", 1920, 1080, 125, 5 * 1024 * 1024);
        assert!(caption.contains("1920x1080"));
        assert!(caption.contains("2:05"));
        assert!(caption.contains("5.0 MB"));
    }
}
