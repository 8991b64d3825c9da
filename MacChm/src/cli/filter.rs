//! Entry filtering and size formatting shared by the CLI commands

/// Simple glob pattern matching (supports * and ?, ASCII case-insensitive)
pub fn matches_glob(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();
    matches_glob_recursive(&pattern_chars, &text_chars)
}

fn matches_glob_recursive(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => {
            (0..=text.len()).any(|skip| matches_glob_recursive(rest, &text[skip..]))
        }
        Some(('?', rest)) => !text.is_empty() && matches_glob_recursive(rest, &text[1..]),
        Some((c, rest)) => text.split_first().is_some_and(|(t, text_rest)| {
            t.eq_ignore_ascii_case(c) && matches_glob_recursive(rest, text_rest)
        }),
    }
}

/// Match a container path by its file name or its full path.
pub fn matches_entry(pattern: &str, path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    matches_glob(pattern, file_name) || matches_glob(pattern, path)
}

/// Format byte size for human-readable output
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}
