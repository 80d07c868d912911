// End-to-end tests over real files: discovery, both source strategies,
// paging, filtering and live refresh through the public API.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tailpage::config::ViewerConfig;
use tailpage::controller::{source_factory, ViewState};
use tailpage::filter::string_filter::ContainsIgnoreCase;
use tailpage::reader::{MmapSource, StreamingSource};
use tailpage::{
    CollectionEvent, IncrementalLogCollection, LineSource, LogLine, LogViewController, SourceError,
};
use tempfile::TempDir;

const SETTLE: Duration = Duration::from_secs(30);

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content)?;
    Ok(path)
}

fn numbered_content(count: usize, terminator: &str) -> String {
    (0..count)
        .map(|i| format!("{} INFO line {}{}", i, i, terminator))
        .collect()
}

fn viewer_config(dir: &Path) -> ViewerConfig {
    ViewerConfig {
        app_name: Some("Shop".into()),
        logs_dir: Some(dir.to_path_buf()),
        watch: false,
        ..ViewerConfig::default()
    }
}

fn texts(c: &LogViewController) -> Vec<String> {
    c.lines().iter().map(|l| l.text().to_string()).collect()
}

#[test]
fn e2e_pages_through_whole_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(dir.path(), "Shop_Logs_1.txt", &numbered_content(120, "\n"))?;

    let mut c = LogViewController::new(&viewer_config(dir.path()));
    c.select_file(Some(path));
    c.wait_settled(SETTLE);
    assert_eq!(c.lines().len(), 50);

    while c.load_more() {
        c.wait_settled(SETTLE);
    }
    assert_eq!(c.lines().len(), 120);
    assert_eq!(c.lines()[119].text(), "119 INFO line 119");
    assert!(!c.collection().has_more_items());
    Ok(())
}

#[test]
fn e2e_terminator_styles_agree_across_sources() -> Result<()> {
    let dir = TempDir::new()?;
    for (name, terminator) in [("lf", "\n"), ("crlf", "\r\n"), ("cr", "\r")] {
        let path = write_file(dir.path(), &format!("{}.txt", name), &numbered_content(40, terminator))?;

        let mmap = MmapSource::open(&path)?;
        let stream = StreamingSource::open(&path)?;
        assert_eq!(mmap.line_count()?, 40, "{}", name);
        assert_eq!(stream.line_count()?, 40, "{}", name);
        assert_eq!(mmap.read_line(39)?, "39 INFO line 39");
        assert_eq!(stream.read_line(39)?, "39 INFO line 39");
    }
    Ok(())
}

#[test]
fn e2e_discovers_and_opens_newest_log() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "Shop_Logs_a.txt", "only line\n")?;
    write_file(dir.path(), "Other_Logs_a.txt", "nope\n")?;
    write_file(dir.path(), "Shop_Logs_a.log", "nope\n")?;

    let mut c = LogViewController::new(&viewer_config(dir.path()));
    assert_eq!(c.load_log_files()?, 1);
    c.wait_settled(SETTLE);
    assert_eq!(texts(&c), vec!["only line"]);
    Ok(())
}

#[test]
fn e2e_debounced_filter_on_large_file() -> Result<()> {
    let dir = TempDir::new()?;
    let content: String = (0..100_000)
        .map(|i| {
            if i % 1000 == 0 {
                format!("{} ERROR checkout failed\n", i)
            } else {
                format!("{} INFO ok\n", i)
            }
        })
        .collect();
    let path = write_file(dir.path(), "Shop_Logs_big.txt", &content)?;

    let mut c = LogViewController::new(&viewer_config(dir.path()));
    c.select_file(Some(path));
    c.wait_settled(SETTLE);

    let start = Instant::now();
    c.set_search_text("check", start);
    c.set_search_text("checkout", start + Duration::from_millis(100));
    assert!(c.pump(start + Duration::from_millis(350)).is_empty());
    c.pump(start + Duration::from_millis(400));
    c.wait_settled(SETTLE);

    assert_eq!(c.collection().view_len(), 100);
    assert_eq!(c.lines().len(), 50);
    assert_eq!(c.lines()[1].text(), "1000 ERROR checkout failed");
    assert_eq!(c.state(), ViewState::Idle);
    Ok(())
}

#[test]
fn e2e_rapid_switches_show_last_file() -> Result<()> {
    let dir = TempDir::new()?;
    let files: Vec<PathBuf> = (0..5)
        .map(|i| write_file(dir.path(), &format!("Shop_Logs_{}.txt", i), &format!("file {}\n", i)))
        .collect::<Result<_>>()?;

    let mut c = LogViewController::new(&viewer_config(dir.path()));
    let mut events = Vec::new();
    for path in &files {
        c.select_file(Some(path.clone()));
    }
    events.extend(c.wait_settled(SETTLE));

    assert_eq!(texts(&c), vec!["file 4"]);
    let loading: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            CollectionEvent::LoadingChanged(on) => Some(*on),
            _ => None,
        })
        .collect();
    assert_eq!(loading, vec![true, false]);
    assert_eq!(c.collection().active_workers(), 0);
    Ok(())
}

#[test]
fn e2e_active_log_refresh_without_watcher() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(dir.path(), "Shop_Logs_live.txt", "one\ntwo\n")?;

    let mut collection: IncrementalLogCollection<LogLine> = IncrementalLogCollection::new(
        source_factory(path.clone(), Some(path.clone())),
        Arc::new(ContainsIgnoreCase),
        Arc::new(LogLine::new),
        50,
    );
    collection.load();
    collection.wait_settled(SETTLE);
    assert_eq!(collection.len(), 2);

    let mut file = fs::OpenOptions::new().append(true).open(&path)?;
    write!(file, "three\nfour\npartial")?;
    file.flush()?;

    assert!(collection.refresh());
    collection.wait_settled(SETTLE);
    let lines: Vec<&str> = collection.items().iter().map(LogLine::text).collect();
    assert_eq!(lines, vec!["one", "two", "three", "four"]);

    writeln!(file)?;
    file.flush()?;
    collection.refresh();
    collection.wait_settled(SETTLE);
    assert_eq!(collection.len(), 5);
    assert_eq!(collection.items()[4].text(), "partial");
    Ok(())
}

#[test]
fn e2e_truncated_active_log_is_cleared_and_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(dir.path(), "Shop_Logs_live.txt", &numbered_content(120, "\n"))?;

    let mut config = viewer_config(dir.path());
    config.active_log = Some(path.clone());
    let mut c = LogViewController::new(&config);
    c.select_file(Some(path.clone()));
    c.wait_settled(SETTLE);
    assert_eq!(c.lines().len(), 50);

    // Rotation truncates the file under the open source
    fs::write(&path, "0 INFO fresh\n")?;
    assert!(c.load_more());
    let events = c.wait_settled(SETTLE);
    assert!(c.lines().is_empty());
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CollectionEvent::Error(SourceError::Read { .. })))
            .count(),
        1
    );
    assert!(!c.refresh());

    c.select_file(Some(path.clone()));
    c.wait_settled(SETTLE);
    assert_eq!(texts(&c), vec!["0 INFO fresh"]);

    fs::write(&path, "")?;
    assert!(c.refresh());
    let events = c.wait_settled(SETTLE);
    assert!(c.lines().is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, CollectionEvent::Error(SourceError::Truncated { .. }))));
    Ok(())
}
