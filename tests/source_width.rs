use std::fs;
use std::path::{Path, PathBuf};

const MAX_WIDTH: usize = 100;

fn rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

/// Raw strings and JSON rows cannot be wrapped by rustfmt.
fn is_literal_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["r#\"", "r##\"", "\"", "{\""]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

#[test]
fn code_lines_fit_the_formatter_width() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    for dir in ["src", "tests", "crates"] {
        rust_files(&root.join(dir), &mut files);
    }
    assert!(!files.is_empty());

    let mut overlong = Vec::new();
    for file in &files {
        let source = fs::read_to_string(file).expect("read source");
        for (index, line) in source.lines().enumerate() {
            if line.chars().count() > MAX_WIDTH && !is_literal_line(line) {
                let relative = file.strip_prefix(root).unwrap_or(file);
                overlong.push(format!("{}:{}", relative.display(), index + 1));
            }
        }
    }

    assert!(overlong.is_empty(), "lines over {MAX_WIDTH} columns: {overlong:?}");
}
