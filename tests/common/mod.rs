use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use habitgrid::core::config::LayoutConfig;
use habitgrid::model::section::{Section, SectionKey, TimePeriod};
use habitgrid::reorder::drag::SectionRect;
use habitgrid::reorder::heights::HeightOracle;
use habitgrid::reorder::runtime::{ScrollHost, SectionSurface, ViewAnimator};
use habitgrid::store::position::SectionView;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_hgrid") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "hgrid.exe" } else { "hgrid" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve hgrid binary path for integration test"),
    }
}

/// Run the hgrid binary with extra environment overrides, capturing output
/// and writing a per-case log for post-mortem inspection.
pub fn run_cli_case(case_name: &str, args: &[&str], envs: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("hgrid-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).env("RUST_BACKTRACE", "1");
    for (name, value) in envs {
        command.env(name, value);
    }
    let output = command.output().expect("execute hgrid command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Environment pointing the CLI at an isolated state directory.
pub fn isolated_env(dir: &tempfile::TempDir) -> Vec<(String, String)> {
    vec![
        ("HOME".to_string(), dir.path().display().to_string()),
        (
            "HABITGRID_SQLITE_DB".to_string(),
            dir.path().join("trackers.sqlite3").display().to_string(),
        ),
        (
            "HABITGRID_JOURNAL_LOG".to_string(),
            dir.path().join("reorder.jsonl").display().to_string(),
        ),
    ]
}

/// Host double for engine-level tests. Rectangles are derived from the live
/// store view — re-measuring reflects the committed order, like a freshly
/// re-rendered list.
pub struct TestView {
    sections: SectionView,
    oracle: HeightOracle,
    pub period: TimePeriod,
    pub scroll_enabled: bool,
    pub scroll_offset: f64,
    pub visible_height: f64,
}

impl TestView {
    pub fn new(sections: SectionView, layout: LayoutConfig, visible_height: f64) -> Self {
        Self {
            sections,
            oracle: HeightOracle::new(layout),
            period: TimePeriod::Daily,
            scroll_enabled: true,
            scroll_offset: 0.0,
            visible_height,
        }
    }

    fn stacked(&self, period: TimePeriod) -> Vec<(SectionKey, SectionRect)> {
        let margin = self.oracle.layout().section_margin;
        let snapshot = self.sections.sections();
        let mut group: Vec<&Section> = snapshot.iter().filter(|s| s.period == period).collect();
        group.sort_by_key(|s| s.position);

        let mut y = -self.scroll_offset;
        let mut rects = Vec::with_capacity(group.len());
        for section in group {
            let height = self.oracle.height_of_count(section.trackers.len());
            rects.push((
                section.key(),
                SectionRect {
                    screen_y: y,
                    height,
                },
            ));
            y += height + margin;
        }
        rects
    }

    fn content_height(&self) -> f64 {
        let margin = self.oracle.layout().section_margin;
        self.sections
            .sections()
            .iter()
            .filter(|s| s.period == self.period)
            .map(|s| self.oracle.height_of_count(s.trackers.len()) + margin)
            .sum()
    }
}

impl SectionSurface for TestView {
    fn measure(&self, key: &SectionKey) -> Option<SectionRect> {
        self.stacked(key.period)
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, rect)| rect)
    }
}

impl ScrollHost for TestView {
    fn set_scroll_enabled(&mut self, enabled: bool) {
        self.scroll_enabled = enabled;
    }
    fn scroll_to(&mut self, y: f64) {
        self.scroll_offset = y;
    }
    fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }
    fn content_extent(&self) -> (f64, f64) {
        (self.visible_height, self.content_height())
    }
}

impl ViewAnimator for TestView {
    fn translate(&mut self, _key: &SectionKey, _y: f64) {}
    fn reseat(&mut self, _key: &SectionKey, _dy: f64) {}
    fn settle(&mut self, _key: &SectionKey) {}
}
