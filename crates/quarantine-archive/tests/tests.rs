use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use quarantine_archive::{
    ContainerKind, Event, ExtractOptions, FailureKind, Limits, Orchestrator, RecordingObserver, Removal, StagingRoot,
    StrategyError, StrategyKind, remove_staging_dir,
};
use quarantine_platform::{
    Captured, Command, Error as PlatformError, ProcessRunner, Result as PlatformResult, ToolResolver,
};
use tempfile::TempDir;
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];

enum Cipher {
    None,
    Legacy(&'static str),
    Aes(&'static str),
}

fn write_zip<B: AsRef<[u8]>>(path: &Path, entries: &[(&str, B)], cipher: Cipher) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let options = match cipher {
        Cipher::None => deflated,
        Cipher::Legacy(password) => deflated.with_deprecated_encryption(password.as_bytes()),
        Cipher::Aes(password) => deflated.with_aes_encryption(AesMode::Aes256, password),
    };
    for (name, body) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_ref()).unwrap();
        }
    }
    zip.finish().unwrap();
}

struct NoTool;

impl ToolResolver for NoTool {
    fn resolve(&self, _candidates: &[&str]) -> Option<PathBuf> { None }

    fn label(&self) -> &'static str { "none" }
}

struct FakeTool;

impl ToolResolver for FakeTool {
    fn resolve(&self, _candidates: &[&str]) -> Option<PathBuf> { Some(PathBuf::from("/opt/fake/7z")) }

    fn label(&self) -> &'static str { "fake" }
}

/// Stands in for 7-Zip: lists `files` for `l` and writes them into the `-o`
/// directory for `x`.
struct FakeSevenZip {
    files: Vec<(&'static str, &'static [u8])>,
    hangs: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeSevenZip {
    fn new(files: Vec<(&'static str, &'static [u8])>) -> Self {
        Self {
            files,
            hangs: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn hanging() -> Self {
        Self {
            hangs: true,
            ..Self::new(Vec::new())
        }
    }

    fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
}

impl ProcessRunner for FakeSevenZip {
    fn run(&self, command: Command) -> PlatformResult<Captured> {
        let args = command.get_args();
        let verb = args[0].to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(verb.clone());

        if verb == "l" {
            let blocks: String = self
                .files
                .iter()
                .map(|(name, body)| format!("Path = {name}\nSize = {}\nFolder = -\n\n", body.len()))
                .collect();
            return Ok(Captured {
                code: Some(0),
                stdout: format!("----------\n{blocks}").into_bytes(),
                ..Captured::default()
            });
        }
        if self.hangs {
            return Err(PlatformError::TimedOut {
                cmd: command.get_program().to_string(),
                after: command.get_timeout(),
            });
        }

        let out = args
            .into_iter()
            .find_map(|arg: OsString| arg.to_str().and_then(|s| s.strip_prefix("-o")).map(PathBuf::from))
            .unwrap();
        for (name, body) in &self.files {
            let path = out.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        Ok(Captured {
            code: Some(0),
            ..Captured::default()
        })
    }
}

struct Harness {
    dir: TempDir,
    observer: Arc<RecordingObserver>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new() -> Self { Self::with(Limits::default(), Arc::new(NoTool), Arc::new(FakeSevenZip::new(Vec::new()))) }

    fn with(limits: Limits, resolver: Arc<dyn ToolResolver>, runner: Arc<dyn ProcessRunner>) -> Self {
        let dir = tempfile::Builder::new().prefix("quarantine-test-").tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let options = ExtractOptions::default()
            .limits(limits)
            .staging_root(StagingRoot::new(dir.path().join("staging")));
        let orchestrator = Orchestrator::builder()
            .options(options)
            .observer(observer.clone())
            .resolver(resolver)
            .runner(runner)
            .build();
        Self {
            dir,
            observer,
            orchestrator,
        }
    }

    fn input(&self, name: &str) -> PathBuf { self.dir.path().join(name) }

    fn staging_is_empty(&self) -> bool {
        fs::read_dir(self.dir.path().join("staging"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

#[test]
fn sample_zip_yields_readme() {
    let h = Harness::new();
    let archive = h.input("sample.zip");
    write_zip(&archive, &[("readme.txt", b"hello")], Cipher::None);

    let mut result = h.orchestrator.extract(&archive, None).unwrap();

    assert_eq!(result.strategy(), StrategyKind::Standard);
    assert_eq!(result.container(), ContainerKind::Zip);
    let files = result.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name(), "readme.txt");
    assert_eq!(files[0].size_bytes(), 5);
    assert_eq!(files[0].content(), b"hello");
    assert_eq!(fs::read(files[0].absolute_path()).unwrap(), b"hello");

    assert_eq!(result.cleanup(), Removal::Removed);
    assert!(h.staging_is_empty());
}

#[test]
fn office_container_returns_only_file_entries() {
    let h = Harness::new();
    let archive = h.input("report.docx");
    write_zip(
        &archive,
        &[
            ("[Content_Types].xml", &b"<Types/>"[..]),
            ("word/", &b""[..]),
            ("word/document.xml", &b"<w:document/>"[..]),
            ("docProps/app.xml", &b"<Properties/>"[..]),
        ],
        Cipher::None,
    );

    let result = h.orchestrator.extract(&archive, None).unwrap();

    let mut paths: Vec<_> = result.files().iter().map(|f| f.relative_path().to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["[Content_Types].xml", "docProps/app.xml", "word/document.xml"]);
    for file in result.files() {
        assert!(file.absolute_path().starts_with(result.staging_directory()));
    }
}

#[test]
fn aes_archive_with_correct_password_escalates_to_strong_cipher() {
    let h = Harness::new();
    let archive = h.input("secret.zip");
    let payload: &[u8] = b"\x00\x01binary payload\xff";
    write_zip(&archive, &[("payload.bin", payload)], Cipher::Aes("Secret123"));

    let result = h.orchestrator.extract(&archive, Some("Secret123")).unwrap();

    assert_eq!(result.strategy(), StrategyKind::StrongCipher);
    assert_eq!(result.files()[0].name(), "payload.bin");
    assert_eq!(result.files()[0].content(), payload);
    assert_eq!(result.attempts().len(), 1);
    assert_eq!(result.attempts()[0].strategy, StrategyKind::Standard);
    assert_eq!(result.attempts()[0].error.kind(), FailureKind::UnsupportedEncryption);
    assert_eq!(h.observer.started(), vec![StrategyKind::Standard, StrategyKind::StrongCipher]);
}

#[test]
fn aes_archive_with_wrong_password_is_password_incorrect() {
    let h = Harness::new();
    let archive = h.input("secret.zip");
    write_zip(&archive, &[("payload.bin", b"payload")], Cipher::Aes("Secret123"));

    let err = h.orchestrator.extract(&archive, Some("wrong")).unwrap_err();

    assert_eq!(err.error(), &StrategyError::PasswordIncorrect);
    assert_eq!(err.to_string(), "password incorrect, please re-enter it");
    assert!(h.staging_is_empty());
}

#[test]
fn aes_archive_without_password_requires_one() {
    let h = Harness::new();
    let archive = h.input("secret.zip");
    write_zip(&archive, &[("payload.bin", b"payload")], Cipher::Aes("Secret123"));

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::PasswordRequired);
}

#[test]
fn legacy_encryption_is_handled_by_standard_decoder() {
    let h = Harness::new();
    let archive = h.input("legacy.zip");
    write_zip(&archive, &[("notes.txt", b"legacy secret")], Cipher::Legacy("pw"));

    let result = h.orchestrator.extract(&archive, Some("pw")).unwrap();
    assert_eq!(result.strategy(), StrategyKind::Standard);
    assert_eq!(result.files()[0].content(), b"legacy secret");

    let err = h.orchestrator.extract(&archive, Some("not-it")).unwrap_err();
    assert_eq!(err.kind(), FailureKind::PasswordIncorrect);
    assert_eq!(h.observer.started().last(), Some(&StrategyKind::Standard));
}

// About one wrong key in 256 passes the ZipCrypto header check and only
// fails once the inflater sees the garbage it decrypts to.
#[test]
fn wrong_legacy_passwords_never_look_corrupt() {
    let h = Harness::new();
    let archive = h.input("legacy-deflated.zip");
    let body: Vec<u8> = (0..4096u32).flat_map(|i| format!("line {i} of the report\n").into_bytes()).collect();
    write_zip(&archive, &[("report.txt", &body)], Cipher::Legacy("right"));

    for i in 0..1500 {
        let password = format!("wrong{i}");
        let err = h.orchestrator.extract(&archive, Some(&password)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::PasswordIncorrect, "{password}: {err}");
    }
    assert!(h.staging_is_empty());

    let result = h.orchestrator.extract(&archive, Some("right")).unwrap();
    assert_eq!(result.files()[0].content(), body.as_slice());
}

#[test]
fn traversal_entry_is_rejected_and_nothing_escapes() {
    let h = Harness::new();
    let archive = h.input("evil.zip");
    write_zip(&archive, &[("ok.txt", &b"fine"[..]), ("../../escape.txt", &b"gotcha"[..])], Cipher::None);

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::CorruptArchive);
    assert!(!h.dir.path().join("escape.txt").exists());
    assert!(!h.dir.path().parent().unwrap().join("escape.txt").exists());
    assert!(h.staging_is_empty());
}

#[test]
fn truncated_archive_is_corrupt() {
    let h = Harness::new();
    let archive = h.input("truncated.zip");
    write_zip(&archive, &[("readme.txt", b"hello hello hello hello")], Cipher::None);
    let bytes = fs::read(&archive).unwrap();
    fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::CorruptArchive);
    assert!(h.staging_is_empty());
}

#[test]
fn garbage_and_empty_inputs_are_corrupt() {
    let h = Harness::new();
    let garbage = h.input("garbage.zip");
    fs::write(&garbage, b"this is not an archive at all").unwrap();
    assert_eq!(h.orchestrator.extract(&garbage, None).unwrap_err().kind(), FailureKind::CorruptArchive);

    let empty = h.input("empty.zip");
    fs::write(&empty, b"").unwrap();
    assert_eq!(h.orchestrator.extract(&empty, None).unwrap_err().kind(), FailureKind::CorruptArchive);
}

#[test]
fn declared_size_over_ceiling_aborts() {
    let h = Harness::with(
        Limits::default().max_entry_bytes(1024),
        Arc::new(NoTool),
        Arc::new(FakeSevenZip::new(Vec::new())),
    );
    let archive = h.input("bomb.zip");
    let zeros = vec![0u8; 64 * 1024];
    write_zip(&archive, &[("zeros.bin", &zeros)], Cipher::None);

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ResourceLimitExceeded);
    assert!(!err.kind().is_retryable());
    assert!(h.staging_is_empty());
}

#[test]
fn aggregate_size_and_entry_count_are_bounded() {
    let h = Harness::with(
        Limits::default().max_total_bytes(100),
        Arc::new(NoTool),
        Arc::new(FakeSevenZip::new(Vec::new())),
    );
    let archive = h.input("many.zip");
    let chunk = vec![b'a'; 60];
    write_zip(&archive, &[("a.txt", &chunk), ("b.txt", &chunk)], Cipher::None);
    assert_eq!(
        h.orchestrator.extract(&archive, None).unwrap_err().kind(),
        FailureKind::ResourceLimitExceeded
    );

    let h = Harness::with(
        Limits::default().max_entries(2),
        Arc::new(NoTool),
        Arc::new(FakeSevenZip::new(Vec::new())),
    );
    let archive = h.input("count.zip");
    write_zip(&archive, &[("1", b"1"), ("2", b"2"), ("3", b"3")], Cipher::None);
    assert_eq!(
        h.orchestrator.extract(&archive, None).unwrap_err().kind(),
        FailureKind::ResourceLimitExceeded
    );
}

#[test]
fn strong_cipher_refuses_oversized_archive_buffers() {
    let h = Harness::with(
        Limits::default().max_archive_bytes(64),
        Arc::new(NoTool),
        Arc::new(FakeSevenZip::new(Vec::new())),
    );
    let archive = h.input("secret.zip");
    write_zip(&archive, &[("payload.bin", &[7u8; 256])], Cipher::Aes("Secret123"));

    let err = h.orchestrator.extract(&archive, Some("Secret123")).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ResourceLimitExceeded);
}

#[test]
fn seven_zip_container_without_tool_is_tool_unavailable() {
    let h = Harness::new();
    let archive = h.input("payload.7z");
    fs::write(&archive, SEVEN_ZIP_MAGIC).unwrap();

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ToolUnavailable);
    assert!(err.to_string().contains("install 7-Zip"));
    let strategies: Vec<_> = err.attempts().iter().map(|a| a.strategy).collect();
    assert_eq!(
        strategies,
        vec![StrategyKind::Standard, StrategyKind::StrongCipher, StrategyKind::NativeTool]
    );
    // In-process decoders never ran against the 7z container.
    assert_eq!(h.observer.started(), vec![StrategyKind::NativeTool]);
    assert!(h.staging_is_empty());
}

#[test]
fn unsupported_compression_escalates_to_native_tool() {
    let h = Harness::new();
    let archive = h.input("exotic.zip");
    write_zip(&archive, &[("data.bin", b"exotic")], Cipher::None);
    set_compression_method(&archive, 97);

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ToolUnavailable);
    assert_eq!(
        h.observer.started(),
        vec![StrategyKind::Standard, StrategyKind::StrongCipher, StrategyKind::NativeTool]
    );
}

#[test]
fn native_tool_output_is_staged_read_only() {
    let runner = Arc::new(FakeSevenZip::new(vec![
        ("payload.bin", &b"from the tool"[..]),
        ("nested/dir/more.txt", &b"more"[..]),
    ]));
    let h = Harness::with(Limits::default(), Arc::new(FakeTool), runner.clone());
    let archive = h.input("payload.7z");
    fs::write(&archive, SEVEN_ZIP_MAGIC).unwrap();

    let result = h.orchestrator.extract(&archive, Some("pw")).unwrap();

    assert_eq!(result.strategy(), StrategyKind::NativeTool);
    assert_eq!(result.container(), ContainerKind::SevenZip);
    assert_eq!(runner.calls(), vec!["l", "x"]);
    let mut paths: Vec<_> = result.files().iter().map(|f| f.relative_path().to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["nested/dir/more.txt", "payload.bin"]);
    for file in result.files() {
        assert!(file.absolute_path().starts_with(result.staging_directory()));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(file.absolute_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o222, 0, "{} is writable", file.relative_path());
            assert!(!quarantine_fs::is_executable(file.absolute_path()));
        }
    }
    assert!(h.observer.events().contains(&Event::ToolResolved(PathBuf::from("/opt/fake/7z"))));
}

#[test]
fn native_tool_is_refused_an_archive_that_lists_too_much() {
    let runner = Arc::new(FakeSevenZip::new(vec![("payload.bin", &b"from the tool"[..])]));
    let h = Harness::with(Limits::default().max_entry_bytes(8), Arc::new(FakeTool), runner.clone());
    let archive = h.input("bomb.7z");
    fs::write(&archive, SEVEN_ZIP_MAGIC).unwrap();

    let err = h.orchestrator.extract(&archive, None).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ResourceLimitExceeded);
    assert_eq!(runner.calls(), vec!["l"]);
    assert!(h.staging_is_empty());
}

#[test]
fn native_tool_timeout_ends_the_request() {
    let runner = Arc::new(FakeSevenZip::hanging());
    let h = Harness::with(Limits::default(), Arc::new(FakeTool), runner.clone());
    let archive = h.input("slow.7z");
    fs::write(&archive, SEVEN_ZIP_MAGIC).unwrap();

    let err = h.orchestrator.extract(&archive, Some("pw")).unwrap_err();

    let last = err.attempts().last().unwrap();
    assert_eq!(last.strategy, StrategyKind::NativeTool);
    assert_eq!(last.error.kind(), FailureKind::Other);
    assert!(last.error.to_string().contains("did not finish"));
    // Extraction ran exactly once: no retry after the timeout.
    assert_eq!(runner.calls(), vec!["l", "x"]);
    assert_eq!(h.observer.started(), vec![StrategyKind::NativeTool]);
    assert!(h.staging_is_empty());
}

#[test]
fn cleanup_is_idempotent_and_tolerates_missing_directories() {
    let h = Harness::new();
    let archive = h.input("sample.zip");
    write_zip(&archive, &[("readme.txt", b"hello")], Cipher::None);

    let result = h.orchestrator.extract(&archive, None).unwrap();
    let (files, mut staging) = result.into_parts();
    let contents: Vec<Vec<u8>> = files.into_iter().map(|file| file.into_content()).collect();
    assert_eq!(contents, vec![b"hello".to_vec()]);

    assert_eq!(staging.cleanup(), Removal::Removed);
    assert_eq!(staging.cleanup(), Removal::AlreadyAbsent);
    assert_eq!(remove_staging_dir(staging.path()), Removal::AlreadyAbsent);
    assert_eq!(remove_staging_dir(&h.input("never-existed")), Removal::AlreadyAbsent);
}

#[test]
fn dropping_the_result_removes_staging() {
    let h = Harness::new();
    let archive = h.input("sample.zip");
    write_zip(&archive, &[("readme.txt", b"hello")], Cipher::None);

    let path = {
        let result = h.orchestrator.extract(&archive, None).unwrap();
        result.staging_directory().to_path_buf()
    };

    assert!(!path.exists());
}

#[test]
fn concurrent_requests_are_isolated() {
    let h = Arc::new(Harness::new());
    let archive = h.input("sample.zip");
    write_zip(&archive, &[("readme.txt", b"hello")], Cipher::None);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            let archive = archive.clone();
            std::thread::spawn(move || {
                let result = h.orchestrator.extract(&archive, None).unwrap();
                let path = result.staging_directory().to_path_buf();
                let (_, staging) = result.into_parts();
                std::mem::forget(staging);
                path
            })
        })
        .collect();

    let mut paths: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 4);
}

#[test]
fn passwords_never_reach_observers() {
    let h = Harness::new();
    let archive = h.input("secret.zip");
    write_zip(&archive, &[("payload.bin", b"payload")], Cipher::Aes("Secret123"));

    let _ = h.orchestrator.extract(&archive, Some("Secret123"));

    let recorded = format!("{:?}", h.observer.events());
    assert!(!recorded.contains("Secret123"));
    assert!(h.observer.events().contains(&Event::AttemptStarted {
        strategy: StrategyKind::Standard,
        password_supplied: true,
    }));
}

/// Rewrite the compression method of every local and central header.
fn set_compression_method(path: &Path, method: u16) {
    const LOCAL: &[u8] = b"PK\x03\x04";
    const CENTRAL: &[u8] = b"PK\x01\x02";

    let mut bytes = fs::read(path).unwrap();
    let mut patch = |signature: &[u8], offset: usize| {
        let positions: Vec<_> = bytes
            .windows(signature.len())
            .enumerate()
            .filter(|(_, w)| *w == signature)
            .map(|(i, _)| i)
            .collect();
        assert!(!positions.is_empty());
        for at in positions {
            bytes[at + offset..at + offset + 2].copy_from_slice(&method.to_le_bytes());
        }
    };
    patch(LOCAL, 8);
    patch(CENTRAL, 10);
    fs::write(path, bytes).unwrap();
}
