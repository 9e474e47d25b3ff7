use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
    process::{Command, Stdio},
    time::Instant,
};

use tempfile::TempDir;
use tracing::{info, warn};

use super::types::{RasterFormat, RenderError, Rasterizer};

/// Rasterizer shelling out to an `rsvg-convert` compatible CLI.
#[derive(Debug, Clone)]
pub struct CliRasterizer {
    cli_path: PathBuf,
}

impl CliRasterizer {
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }
}

impl Rasterizer for CliRasterizer {
    fn rasterize(&self, pages: &[String], format: RasterFormat) -> Result<Vec<u8>, RenderError> {
        let started_at = Instant::now();
        let pages = match format {
            RasterFormat::Png => &pages[..pages.len().min(1)],
            RasterFormat::Pdf => pages,
        };
        if pages.is_empty() {
            return Err(RenderError::Aborted {
                message: "no pages to rasterize".to_string(),
            });
        }

        let workdir = TempDir::new()?;
        let mut inputs = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let path = workdir.path().join(format!("page{}.svg", index + 1));
            fs::write(&path, page)?;
            inputs.push(path);
        }
        let output_path = workdir.path().join(format!("out.{}", format.as_str()));

        let output = Command::new(&self.cli_path)
            .arg("--format")
            .arg(format.as_str())
            .arg("--output")
            .arg(&output_path)
            .args(&inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                warn!(
                    target = "kartenwerk::render",
                    op = "rasterize",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    error = %err,
                    "Failed to spawn rasterizer CLI"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::RasterizerNotFound(err)
                } else {
                    RenderError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "kartenwerk::render",
                op = "rasterize",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "rasterizer_cli",
                stderr = %stderr,
                "Rasterizer CLI invocation failed"
            );
            return Err(RenderError::Rasterizer { exit_code, stderr });
        }

        let bytes = fs::read(&output_path)?;
        info!(
            target = "kartenwerk::render",
            op = "rasterize",
            result = "ok",
            format = format.as_str(),
            pages = pages.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            output_bytes = bytes.len(),
            "Pages rasterized via CLI"
        );
        Ok(bytes)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{os::unix::fs::PermissionsExt, path::Path};

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("set perms");
    }

    fn fake_cli(dir: &Path, args_path: &Path) -> PathBuf {
        let script_path = dir.join("fake-rsvg");
        let script = format!(
            r#"#!/bin/sh
set -eu
echo "$@" > "{args_file}"
out=""
fmt=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output)
      shift
      out="$1"
      ;;
    --format)
      shift
      fmt="$1"
      ;;
    *)
      ;;
  esac
  shift
done
if [ -z "$out" ]; then
  echo "missing --output" >&2
  exit 2
fi
printf '%s' "$fmt-bytes" > "$out"
"#,
            args_file = args_path.display()
        );
        fs::write(&script_path, script).expect("write script");
        make_executable(&script_path);
        script_path
    }

    #[test]
    fn png_uses_only_the_map_page() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let rasterizer = CliRasterizer::new(fake_cli(dir.path(), &args_path));

        let bytes = rasterizer
            .rasterize(
                &["<svg/>".to_string(), "<svg/>".to_string()],
                RasterFormat::Png,
            )
            .expect("png rendered");
        assert_eq!(bytes, b"png-bytes");

        let args = fs::read_to_string(&args_path).expect("read args");
        assert!(args.contains("--format png"), "args: {args}");
        assert!(args.contains("page1.svg"), "args: {args}");
        assert!(!args.contains("page2.svg"), "args: {args}");
    }

    #[test]
    fn pdf_appends_every_page() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let rasterizer = CliRasterizer::new(fake_cli(dir.path(), &args_path));

        let bytes = rasterizer
            .rasterize(
                &["<svg/>".to_string(), "<svg/>".to_string()],
                RasterFormat::Pdf,
            )
            .expect("pdf rendered");
        assert_eq!(bytes, b"pdf-bytes");

        let args = fs::read_to_string(&args_path).expect("read args");
        assert!(args.contains("page1.svg") && args.contains("page2.svg"), "args: {args}");
    }

    #[test]
    fn surfaces_cli_errors() {
        let dir = TempDir::new().expect("temp dir");
        let script_path = dir.path().join("fake-rsvg");
        fs::write(
            &script_path,
            r#"#!/bin/sh
echo "boom" >&2
exit 42
"#,
        )
        .expect("write script");
        make_executable(&script_path);

        let err = CliRasterizer::new(script_path)
            .rasterize(&["<svg/>".to_string()], RasterFormat::Png)
            .expect_err("expected cli failure");
        match err {
            RenderError::Rasterizer { exit_code, stderr } => {
                assert_eq!(exit_code, Some(42));
                assert!(stderr.contains("boom"), "stderr did not propagate: {stderr}");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn missing_cli_is_reported() {
        let err = CliRasterizer::new("/nonexistent/rsvg-convert")
            .rasterize(&["<svg/>".to_string()], RasterFormat::Png)
            .expect_err("missing binary");
        assert!(matches!(err, RenderError::RasterizerNotFound(_)));
    }
}
