//! Ghostscript invocation
//!
//! Locates the `gs` binary, builds the argument lists for the three jobs the
//! subprocess backend needs (page count, page raster, page text) and runs
//! them with output captured to files inside the caller's scratch directory.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::backend::RENDER_DPI;
use super::error::{RenderError, Result};

/// Environment variable overriding the Ghostscript binary location
pub const TOOL_ENV_VAR: &str = "PDF_READER_GHOSTSCRIPT";

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDOUT_FILE: &str = "tool-stdout.log";
const STDERR_FILE: &str = "tool-stderr.log";

#[cfg(windows)]
const WINDOWS_INSTALL_ROOT: &str = r"C:\Program Files\gs";

/// Captured output of one tool run
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout and stderr joined for diagnostics
    #[must_use]
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// A resolved Ghostscript executable
#[derive(Clone, Debug)]
pub struct Ghostscript {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl Ghostscript {
    /// Use the binary at `path` without any lookup
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
        }
    }

    /// Kill runs that take longer than `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Find the binary: [`TOOL_ENV_VAR`], then `configured`, then the
    /// platform's default install locations.
    ///
    /// An explicit path (environment or config) must exist; it is never
    /// silently replaced by a default.
    pub fn resolve(configured: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(TOOL_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        if let Some(explicit) = from_env.or_else(|| configured.map(Path::to_path_buf)) {
            if explicit.is_file() {
                return Ok(Self::at(explicit));
            }
            return Err(RenderError::ToolMissing { path: explicit });
        }

        let candidates = default_candidates();
        match candidates.iter().find(|path| path.is_file()) {
            Some(found) => Ok(Self::at(found.clone())),
            None => Err(RenderError::ToolMissing {
                path: candidates
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| PathBuf::from("gs")),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments printing the page count of `pdf` as a single line
    #[must_use]
    pub fn page_count_args(pdf: &Path, scratch: &Path) -> Vec<OsString> {
        let mut permit = OsString::from("--permit-file-read=");
        permit.push(scratch.as_os_str());
        permit.push(std::path::MAIN_SEPARATOR_STR);

        let mut args = safe_flags(&["-q", "-dNODISPLAY"]);
        args.push(permit);
        args.push("-c".into());
        args.push(
            format!(
                "({}) (r) file runpdfbegin pdfpagecount = quit",
                ps_string(pdf)
            )
            .into(),
        );
        args
    }

    /// Arguments rasterizing one page (1-based) of `pdf` into a PNG at `output`
    #[must_use]
    pub fn render_args(pdf: &Path, page: usize, output: &Path) -> Vec<OsString> {
        let mut args = safe_flags(&["-q"]);
        args.extend(
            [
                "-sDEVICE=png16m".to_string(),
                format!("-r{RENDER_DPI}"),
                "-dTextAlphaBits=4".to_string(),
                "-dGraphicsAlphaBits=4".to_string(),
            ]
            .map(OsString::from),
        );
        args.extend(single_page(page));
        args.push(output_file_arg(output));
        args.push(pdf.as_os_str().to_os_string());
        args
    }

    /// Arguments extracting the text of one page (1-based) of `pdf` into `output`
    #[must_use]
    pub fn text_args(pdf: &Path, page: usize, output: &Path) -> Vec<OsString> {
        let mut args = safe_flags(&["-q"]);
        args.push("-sDEVICE=txtwrite".into());
        args.extend(single_page(page));
        args.push(output_file_arg(output));
        args.push(pdf.as_os_str().to_os_string());
        args
    }

    /// Run the tool inside `scratch`, which receives the captured output files.
    ///
    /// A nonzero exit, or exceeding the timeout, is `ProcessFailed` carrying
    /// everything the tool printed.
    pub fn run(&self, args: &[OsString], scratch: &Path) -> Result<ToolOutput> {
        let stdout_path = scratch.join(STDOUT_FILE);
        let stderr_path = scratch.join(STDERR_FILE);
        let stdout = File::create(&stdout_path)
            .map_err(|e| RenderError::io("creating tool output file", e))?;
        let stderr = File::create(&stderr_path)
            .map_err(|e| RenderError::io("creating tool output file", e))?;

        debug!("Running {} {:?}", self.path.display(), args);
        let mut child = Command::new(&self.path)
            .args(args)
            .current_dir(scratch)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RenderError::ToolMissing {
                    path: self.path.clone(),
                },
                _ => RenderError::io(format!("starting {}", self.path.display()), e),
            })?;

        let status = self.wait(&mut child)?;
        let output = ToolOutput {
            stdout: read_lossy(&stdout_path),
            stderr: read_lossy(&stderr_path),
        };

        match status {
            Some(status) if status.success() => {
                if !output.stderr.trim().is_empty() {
                    warn!("{} reported: {}", self.path.display(), output.stderr.trim());
                }
                Ok(output)
            }
            Some(status) => Err(RenderError::ProcessFailed {
                status: status.to_string(),
                output: output.combined(),
            }),
            None => Err(RenderError::ProcessFailed {
                status: format!("timed out after {:?}", self.timeout.unwrap_or_default()),
                output: output.combined(),
            }),
        }
    }

    /// Wait for `child`; `None` means it was killed on timeout
    fn wait(&self, child: &mut Child) -> Result<Option<ExitStatus>> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map(Some)
                .map_err(|e| RenderError::io("waiting for renderer", e));
        };

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {
                    if start.elapsed() > timeout {
                        warn!("{} timed out after {timeout:?} - killing", self.path.display());
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(None);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(RenderError::io("waiting for renderer", e)),
            }
        }
    }
}

/// Parse the page count printed by [`Ghostscript::page_count_args`]
#[must_use]
pub fn parse_page_count(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())?
        .parse()
        .ok()
}

/// Read-only, batch, no-pause: the run can touch nothing outside the files it
/// is given and never waits for input.
fn safe_flags(leading: &[&str]) -> Vec<OsString> {
    leading
        .iter()
        .chain(&["-dSAFER", "-dBATCH", "-dNOPAUSE"])
        .map(OsString::from)
        .collect()
}

fn single_page(page: usize) -> [OsString; 2] {
    [
        format!("-dFirstPage={page}").into(),
        format!("-dLastPage={page}").into(),
    ]
}

/// `%` starts a page-number template in Ghostscript output names
fn output_file_arg(output: &Path) -> OsString {
    format!(
        "-sOutputFile={}",
        output.to_string_lossy().replace('%', "%%")
    )
    .into()
}

/// Escape a path for use inside a PostScript string literal
fn ps_string(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn read_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Default install locations, most preferred first
#[must_use]
pub fn default_candidates() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        windows_candidates(Path::new(WINDOWS_INSTALL_ROOT))
    }
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/gs"),
            PathBuf::from("/usr/local/bin/gs"),
        ]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![PathBuf::from("/usr/bin/gs"), PathBuf::from("/usr/local/bin/gs")]
    }
    #[cfg(not(any(windows, unix)))]
    {
        vec![PathBuf::from("gs")]
    }
}

/// `<root>\gs<version>\bin\gswin64c.exe` for every installed version, newest first
#[cfg_attr(not(windows), allow(dead_code))]
fn windows_candidates(root: &Path) -> Vec<PathBuf> {
    let mut versions: Vec<(Vec<u32>, PathBuf)> = fs::read_dir(root)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let version = name
                .strip_prefix("gs")?
                .split('.')
                .map(str::parse)
                .collect::<std::result::Result<Vec<u32>, _>>()
                .ok()?;
            Some((version, entry.path().join("bin").join("gswin64c.exe")))
        })
        .collect();

    versions.sort_by(|a, b| b.0.cmp(&a.0));

    if versions.is_empty() {
        return vec![root.join("bin").join("gswin64c.exe")];
    }
    versions.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;
    use crate::pdf::error::ErrorKind;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn render_args_target_one_page_at_fixed_dpi() {
        let args = strings(&Ghostscript::render_args(
            Path::new("/tmp/x/document.pdf"),
            7,
            Path::new("/tmp/x/page.png"),
        ));

        for flag in [
            "-dSAFER",
            "-dBATCH",
            "-dNOPAUSE",
            "-sDEVICE=png16m",
            "-r300",
            "-dTextAlphaBits=4",
            "-dGraphicsAlphaBits=4",
            "-dFirstPage=7",
            "-dLastPage=7",
            "-sOutputFile=/tmp/x/page.png",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag} in {args:?}");
        }
        assert_eq!(args.last().map(String::as_str), Some("/tmp/x/document.pdf"));
    }

    #[test]
    fn text_args_use_txtwrite() {
        let args = strings(&Ghostscript::text_args(
            Path::new("doc.pdf"),
            2,
            Path::new("page.txt"),
        ));
        assert!(args.contains(&"-sDEVICE=txtwrite".to_string()));
        assert!(args.contains(&"-dFirstPage=2".to_string()));
        assert!(args.contains(&"-sOutputFile=page.txt".to_string()));
    }

    #[test]
    fn page_count_args_are_sandboxed() {
        let args = strings(&Ghostscript::page_count_args(
            Path::new("/scratch/a(b).pdf"),
            Path::new("/scratch"),
        ));
        assert!(args.contains(&"-dNODISPLAY".to_string()));
        assert!(args.contains(&"-dSAFER".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--permit-file-read=/scratch")));
        assert_eq!(
            args.last().map(String::as_str),
            Some(r"(/scratch/a\(b\).pdf) (r) file runpdfbegin pdfpagecount = quit")
        );
    }

    #[test]
    fn output_names_escape_percent() {
        assert_eq!(
            output_file_arg(Path::new("/tmp/100%/page.png")),
            OsString::from("-sOutputFile=/tmp/100%%/page.png")
        );
    }

    #[test]
    fn page_count_parsing() {
        assert_eq!(parse_page_count("3\n"), Some(3));
        assert_eq!(parse_page_count("  12  \n\n"), Some(12));
        assert_eq!(
            parse_page_count("GPL Ghostscript 10.02.1\n   **** Warning\n42\n"),
            Some(42)
        );
        assert_eq!(parse_page_count(""), None);
        assert_eq!(parse_page_count("Error: /syntaxerror\n"), None);
    }

    #[test]
    fn combined_output_joins_streams() {
        let output = ToolOutput {
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");
        assert_eq!(ToolOutput::default().combined(), "");
    }

    #[test]
    fn windows_candidates_prefer_newest_version() {
        let root = TempDir::new().unwrap();
        for version in ["gs9.56.1", "gs10.02.1", "gs10.0.0", "notgs"] {
            fs::create_dir_all(root.path().join(version).join("bin")).unwrap();
        }

        let candidates = windows_candidates(root.path());
        let dirs: Vec<_> = candidates
            .iter()
            .map(|p| {
                p.parent()
                    .and_then(Path::parent)
                    .and_then(Path::file_name)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(dirs, ["gs10.02.1", "gs10.0.0", "gs9.56.1"]);
    }

    #[test]
    #[serial]
    fn configured_path_must_exist() {
        unsafe { std::env::remove_var(TOOL_ENV_VAR) };
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gs");

        let err = Ghostscript::resolve(Some(&missing)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolMissing);
        assert!(err.to_string().contains(&missing.display().to_string()));

        fs::write(&missing, b"").unwrap();
        let tool = Ghostscript::resolve(Some(&missing)).unwrap();
        assert_eq!(tool.path(), missing);
    }

    #[test]
    #[serial]
    fn environment_overrides_config() {
        let dir = TempDir::new().unwrap();
        let from_env = dir.path().join("gs-env");
        let from_config = dir.path().join("gs-config");
        fs::write(&from_env, b"").unwrap();
        fs::write(&from_config, b"").unwrap();

        unsafe { std::env::set_var(TOOL_ENV_VAR, &from_env) };
        let resolved = Ghostscript::resolve(Some(&from_config));
        unsafe { std::env::remove_var(TOOL_ENV_VAR) };

        assert_eq!(resolved.unwrap().path(), from_env);
    }

    #[test]
    fn spawning_missing_binary_is_tool_missing() {
        let dir = TempDir::new().unwrap();
        let tool = Ghostscript::at(dir.path().join("no-such-gs"));
        let err = tool.run(&[], dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolMissing);
    }
}
