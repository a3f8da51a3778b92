//! Export lifecycle tests against a scripted in-process backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sheets_pdf::registry::{FILTER_DATA, FILTER_NAME};
use sheets_pdf::{
    default_registry, BackendFactory, ConversionBackend, ConvertConfiguration, DocumentFamily,
    ExportError, ExporterConfig, FormatRegistry, OptionValue, PdfExporter, Workbook,
    XlsxSerializer,
};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(u16),
    Convert,
    Stop,
}

#[derive(Debug, Clone, Copy, Default)]
struct Script {
    fail_start: bool,
    fail_convert: bool,
    fail_stop: bool,
    yield_in_convert: bool,
}

/// What one conversion saw.
#[derive(Debug, Clone)]
struct Seen {
    source: PathBuf,
    source_header: Vec<u8>,
    registry: FormatRegistry,
    used_default: bool,
}

#[derive(Debug, Default)]
struct Log {
    events: Vec<Event>,
    conversions: Vec<Seen>,
}

#[derive(Debug, thiserror::Error)]
#[error("fake backend: {0}")]
struct FakeError(String);

struct FakeBackend {
    port: u16,
    running: bool,
    script: Script,
    log: Arc<StdMutex<Log>>,
}

impl FakeBackend {
    fn record(&self, event: Event) {
        self.log.lock().unwrap().events.push(event);
    }
}

#[async_trait]
impl ConversionBackend for FakeBackend {
    type Error = FakeError;

    async fn start(&mut self) -> Result<(), FakeError> {
        self.record(Event::Start(self.port));
        if self.script.fail_start {
            return Err(FakeError(format!("port {} already in use", self.port)));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), FakeError> {
        self.record(Event::Stop);
        self.running = false;
        if self.script.fail_stop {
            return Err(FakeError("process did not exit".into()));
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn convert(
        &mut self,
        source: &Path,
        destination: &Path,
        registry: &FormatRegistry,
    ) -> Result<(), FakeError> {
        if !self.running {
            return Err(FakeError("not running".into()));
        }
        self.record(Event::Convert);
        let header: Vec<u8> = std::fs::read(source)
            .map(|bytes| bytes.into_iter().take(2).collect())
            .unwrap_or_default();
        self.log.lock().unwrap().conversions.push(Seen {
            source: source.to_path_buf(),
            source_header: header,
            registry: registry.clone(),
            used_default: std::ptr::eq(registry, &*default_registry()),
        });

        if self.script.yield_in_convert {
            tokio::task::yield_now().await;
        }
        if self.script.fail_convert {
            return Err(FakeError("filter rejected the options".into()));
        }
        std::fs::write(destination, b"%PDF-1.4\n% fake\n").map_err(|e| FakeError(e.to_string()))
    }
}

#[derive(Clone, Default)]
struct FakeFactory {
    script: Script,
    log: Arc<StdMutex<Log>>,
}

impl FakeFactory {
    fn scripted(script: Script) -> Self {
        Self {
            script,
            log: Arc::default(),
        }
    }

    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().events.clone()
    }

    fn conversions(&self) -> Vec<Seen> {
        self.log.lock().unwrap().conversions.clone()
    }
}

impl BackendFactory for FakeFactory {
    type Backend = FakeBackend;

    fn bind(&self, port: u16) -> FakeBackend {
        FakeBackend {
            port,
            running: false,
            script: self.script,
            log: Arc::clone(&self.log),
        }
    }
}

struct Fixture {
    temp_dir: tempfile::TempDir,
    out_dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().unwrap(),
            out_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn exporter(&self, factory: FakeFactory) -> PdfExporter<FakeFactory, XlsxSerializer> {
        let config = ExporterConfig {
            temp_dir: Some(self.temp_dir.path().to_path_buf()),
            ..ExporterConfig::default()
        };
        PdfExporter::with_config(factory, XlsxSerializer, config)
    }

    fn target(&self, name: &str) -> PathBuf {
        self.out_dir.path().join(name)
    }

    fn leftover_temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

fn one_sheet() -> Workbook {
    let mut wb = Workbook::new();
    let idx = wb.add_worksheet("Sheet1").unwrap();
    let sheet = wb.worksheet_mut(idx).unwrap();
    sheet.set_cell(0, 0, "Item").unwrap();
    sheet.set_cell(0, 1, "Amount").unwrap();
    sheet.set_cell(1, 0, "Paper").unwrap();
    sheet.set_cell(1, 1, 12.5).unwrap();
    wb
}

fn permission_options() -> ConvertConfiguration {
    ConvertConfiguration::new("PDF")
        .with_option("PermissionPassword", "pass")
        .with_option("RestrictPermissions", true)
        .with_option("Printing", 0)
        .with_option("Changes", 4)
}

#[tokio::test]
async fn export_without_options_writes_the_target() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());
    let target = fx.target("out.pdf");

    exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), &target)
        .await
        .unwrap();

    assert!(std::fs::metadata(&target).unwrap().len() > 0);
    assert_eq!(factory.events(), vec![Event::Start(8100), Event::Convert, Event::Stop]);
    assert_eq!(fx.leftover_temp_files(), 0);

    let conversions = factory.conversions();
    let seen = &conversions[0];
    assert!(seen.used_default, "default registry should be passed through");
    assert_eq!(seen.source_header, b"PK".to_vec());
    assert_eq!(seen.source.extension().and_then(|e| e.to_str()), Some("xlsx"));
    assert!(!seen.source.exists());
}

#[tokio::test]
async fn options_reach_the_backend_as_filter_data() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());
    let config = permission_options();

    exporter
        .export(&one_sheet(), &config, fx.target("protected.pdf"))
        .await
        .unwrap();

    let conversions = factory.conversions();
    let seen = &conversions[0];
    assert!(!seen.used_default);
    let props = seen
        .registry
        .store_properties("pdf", DocumentFamily::Spreadsheet)
        .unwrap();
    assert_eq!(
        props.get(FILTER_DATA),
        Some(&OptionValue::Map(config.options().clone()))
    );
    assert_eq!(
        props.get(FILTER_NAME),
        Some(&OptionValue::from("calc_pdf_Export"))
    );

    // the shared default is never modified
    let default_props = default_registry()
        .store_properties("pdf", DocumentFamily::Spreadsheet)
        .cloned()
        .unwrap();
    assert!(default_props.get(FILTER_DATA).is_none());
}

#[tokio::test]
async fn repeated_exports_without_options_share_the_default() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());

    for name in ["a.pdf", "b.pdf"] {
        exporter
            .export(&one_sheet(), &ConvertConfiguration::new("PDF"), fx.target(name))
            .await
            .unwrap();
    }
    exporter
        .export(&one_sheet(), &permission_options(), fx.target("c.pdf"))
        .await
        .unwrap();
    exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), fx.target("d.pdf"))
        .await
        .unwrap();

    let used: Vec<bool> = factory.conversions().iter().map(|s| s.used_default).collect();
    assert_eq!(used, vec![true, true, false, true]);
}

#[tokio::test]
async fn unwritable_target_fails_and_cleans_up() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());
    let target = fx.target("missing-dir").join("out.pdf");

    let err = exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), &target)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Conversion(_)), "{err}");
    assert!(!target.exists());
    assert_eq!(fx.leftover_temp_files(), 0);
    assert_eq!(factory.events(), vec![Event::Start(8100), Event::Convert, Event::Stop]);
}

#[tokio::test]
async fn start_failure_creates_no_temp_file() {
    let fx = Fixture::new();
    let factory = FakeFactory::scripted(Script {
        fail_start: true,
        ..Script::default()
    });
    let exporter = fx.exporter(factory.clone()).with_port(8123);

    let err = exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), fx.target("out.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::BackendStart(_)), "{err}");
    assert!(err.to_string().contains("port 8123 already in use"));
    assert_eq!(factory.events(), vec![Event::Start(8123)]);
    assert_eq!(fx.leftover_temp_files(), 0);
    assert!(!fx.target("out.pdf").exists());
}

#[tokio::test]
async fn serialization_failure_still_stops_the_backend() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());

    // a workbook without sheets cannot be written as xlsx
    let err = exporter
        .export(&Workbook::new(), &ConvertConfiguration::new("PDF"), fx.target("out.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Serialization(_)), "{err}");
    assert_eq!(factory.events(), vec![Event::Start(8100), Event::Stop]);
    assert_eq!(fx.leftover_temp_files(), 0);
}

#[tokio::test]
async fn stop_failure_keeps_the_conversion_failure() {
    let fx = Fixture::new();
    let factory = FakeFactory::scripted(Script {
        fail_convert: true,
        fail_stop: true,
        ..Script::default()
    });
    let exporter = fx.exporter(factory.clone());

    let err = exporter
        .export(&one_sheet(), &permission_options(), fx.target("out.pdf"))
        .await
        .unwrap_err();

    match err {
        ExportError::BackendStop { source, prior } => {
            assert_eq!(source.to_string(), "fake backend: process did not exit");
            let prior = prior.expect("conversion failure should be kept");
            assert!(matches!(*prior, ExportError::Conversion(_)));
            assert!(prior.to_string().contains("filter rejected the options"));
        }
        other => panic!("expected BackendStop, got {other:?}"),
    }
    assert_eq!(fx.leftover_temp_files(), 0);
}

#[tokio::test]
async fn stop_failure_after_success_is_reported() {
    let fx = Fixture::new();
    let factory = FakeFactory::scripted(Script {
        fail_stop: true,
        ..Script::default()
    });
    let exporter = fx.exporter(factory.clone());
    let target = fx.target("out.pdf");

    let err = exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), &target)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::BackendStop { prior: None, .. }), "{err}");
    // the written target is not rolled back
    assert!(target.exists());
}

#[tokio::test]
async fn external_backend_is_never_started_or_stopped() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let mut running = factory.bind(2002);
    running.running = true;
    let handle = Arc::new(Mutex::new(running));

    let exporter = fx.exporter(factory.clone()).with_backend(Arc::clone(&handle));
    assert!(exporter.backend().is_some());

    exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), fx.target("a.pdf"))
        .await
        .unwrap();
    exporter
        .export(&one_sheet(), &permission_options(), fx.target("b.pdf"))
        .await
        .unwrap();

    assert_eq!(factory.events(), vec![Event::Convert, Event::Convert]);
    assert!(handle.lock().await.is_running());
    assert!(fx.target("a.pdf").exists());
    assert!(fx.target("b.pdf").exists());
}

#[tokio::test]
async fn external_backend_failure_is_not_a_stop_failure() {
    let fx = Fixture::new();
    let factory = FakeFactory::scripted(Script {
        fail_convert: true,
        fail_stop: true,
        ..Script::default()
    });
    let mut running = factory.bind(2002);
    running.running = true;
    let exporter = fx
        .exporter(factory.clone())
        .with_backend(Arc::new(Mutex::new(running)));

    let err = exporter
        .export(&one_sheet(), &ConvertConfiguration::new("PDF"), fx.target("out.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Conversion(_)), "{err}");
    assert_eq!(factory.events(), vec![Event::Convert]);
}

#[tokio::test]
async fn owned_exports_run_one_at_a_time() {
    let fx = Fixture::new();
    let factory = FakeFactory::scripted(Script {
        yield_in_convert: true,
        ..Script::default()
    });
    let exporter = fx.exporter(factory.clone());
    let wb = one_sheet();
    let config = ConvertConfiguration::new("PDF");

    let (a, b) = tokio::join!(
        exporter.export(&wb, &config, fx.target("a.pdf")),
        exporter.export(&wb, &config, fx.target("b.pdf")),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        factory.events(),
        vec![
            Event::Start(8100),
            Event::Convert,
            Event::Stop,
            Event::Start(8100),
            Event::Convert,
            Event::Stop,
        ]
    );
}

#[test]
fn export_blocking_runs_without_a_runtime() {
    let fx = Fixture::new();
    let factory = FakeFactory::default();
    let exporter = fx.exporter(factory.clone());
    let target = fx.target("blocking.pdf");

    exporter
        .export_blocking(&one_sheet(), &permission_options(), &target)
        .unwrap();

    assert!(target.exists());
    assert_eq!(factory.events().len(), 3);
}

#[test]
fn accessors() {
    let exporter = PdfExporter::new(FakeFactory::default(), XlsxSerializer);
    assert_eq!(exporter.format_type(), "PDF");
    assert_eq!(exporter.extension(), ".pdf");
    assert_eq!(exporter.port(), 8100);
    assert!(exporter.backend().is_none());
    assert_eq!(exporter.with_port(9000).port(), 9000);
}
