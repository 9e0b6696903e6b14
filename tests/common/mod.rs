//! Shared fixtures and fake collaborators for integration tests.

#![allow(dead_code)]

use kodegen_bundler_sideload::sideload::{
    Inspector, PatchStrategy, PlatformPatcher, Result, Settings, SettingsBuilder, Signer,
};
use kodegen_bundler_sideload::sideload::Error;
use plist::{Dictionary, Value};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::SimpleFileOptions;

/// Bytes of a minimal 64-bit Mach-O image.
pub const IMAGE_BYTES: [u8; 8] = [0xCF, 0xFA, 0xED, 0xFE, 0x0C, 0x00, 0x00, 0x01];

pub fn info_plist(minimum_os: &str) -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert("CFBundleName".into(), "Foo".into());
    dict.insert("CFBundleDisplayName".into(), "Foo".into());
    dict.insert("CFBundleIdentifier".into(), "com.example.foo".into());
    dict.insert("CFBundleExecutable".into(), "Foo".into());
    dict.insert("MinimumOSVersion".into(), minimum_os.into());
    let mut buffer = Vec::new();
    Value::Dictionary(dict).to_writer_xml(&mut buffer).unwrap();
    buffer
}

pub fn original_entitlements() -> Dictionary {
    let mut dict = Dictionary::new();
    dict.insert("get-task-allow".into(), Value::Boolean(true));
    dict.insert(
        "application-identifier".into(),
        "TEAM.com.example.foo".into(),
    );
    dict.insert(
        "keychain-access-groups".into(),
        Value::Array(vec!["TEAM.com.example.foo".into()]),
    );
    dict
}

/// Writes `Foo.app` (one image, a manifest and a resource) below `parent`.
pub fn write_app(parent: &Path, minimum_os: &str) -> PathBuf {
    let app = parent.join("Foo.app");
    std::fs::create_dir_all(app.join("Base.lproj")).unwrap();
    std::fs::write(app.join("Foo"), IMAGE_BYTES).unwrap();
    std::fs::write(app.join("Info.plist"), info_plist(minimum_os)).unwrap();
    std::fs::write(app.join("Base.lproj/Main.strings"), b"\"k\" = \"v\";").unwrap();
    app
}

/// Writes `Foo.app` with a second image, `Frameworks/libBar.dylib`.
pub fn write_app_with_library(parent: &Path, minimum_os: &str) -> PathBuf {
    let app = write_app(parent, minimum_os);
    std::fs::create_dir_all(app.join("Frameworks")).unwrap();
    std::fs::write(app.join("Frameworks/libBar.dylib"), IMAGE_BYTES).unwrap();
    app
}

/// Writes `Payload/Foo.app` into a zip archive at `path`.
pub fn write_ipa(path: &Path, minimum_os: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let dir = || SimpleFileOptions::default();
    let plain = || SimpleFileOptions::default().unix_permissions(0o644);

    writer.add_directory("Payload/", dir()).unwrap();
    writer.add_directory("Payload/Foo.app/", dir()).unwrap();
    writer.add_directory("Payload/Foo.app/Base.lproj/", dir()).unwrap();

    writer.start_file("Payload/Foo.app/Foo", plain()).unwrap();
    writer.write_all(&IMAGE_BYTES).unwrap();
    writer.start_file("Payload/Foo.app/Info.plist", plain()).unwrap();
    writer.write_all(&info_plist(minimum_os)).unwrap();
    writer
        .start_file("Payload/Foo.app/Base.lproj/Main.strings", plain())
        .unwrap();
    writer.write_all(b"\"k\" = \"v\";").unwrap();

    writer.finish().unwrap();
}

pub fn settings(scratch: &Path) -> Settings {
    SettingsBuilder::new().scratch_root(scratch).build().unwrap()
}

/// Number of scratch directories left below `scratch`.
pub fn leftover_scratch(scratch: &Path) -> usize {
    match std::fs::read_dir(scratch) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

/// Inspector answering from canned data.
#[derive(Default)]
pub struct FakeInspector {
    /// `None` makes signature reads fail.
    pub entitlements: Option<Dictionary>,
    /// File names of images that report `cryptid 1`.
    pub encrypted: HashSet<String>,
    pub entitlement_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
}

impl FakeInspector {
    pub fn signed() -> Self {
        Self {
            entitlements: Some(original_entitlements()),
            ..Default::default()
        }
    }

    pub fn encrypting(name: &str) -> Self {
        let mut inspector = Self::signed();
        inspector.encrypted.insert(name.to_string());
        inspector
    }
}

impl Inspector for FakeInspector {
    async fn signature_entitlements(&self, path: &Path) -> Result<Dictionary> {
        self.entitlement_calls.fetch_add(1, Ordering::SeqCst);
        self.entitlements.clone().ok_or_else(|| Error::SignatureRead {
            path: path.to_path_buf(),
            reason: "code object is not signed at all".to_string(),
        })
    }

    async fn load_commands(&self, image: &Path) -> Result<String> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cryptid = if self.encrypted.contains(&name) { 1 } else { 0 };
        Ok(format!(
            "Load command 11\n          cmd LC_ENCRYPTION_INFO_64\n      cmdsize 24\n     cryptoff 16384\n    cryptsize 32768\n      cryptid {cryptid}\n          pad 0\n"
        ))
    }
}

/// Signer recording every invocation.
#[derive(Default)]
pub struct FakeSigner {
    pub signed: Mutex<Vec<PathBuf>>,
    /// Deep re-signs with the entitlements file contents at call time.
    pub deep: Mutex<Vec<(PathBuf, PathBuf, Vec<u8>)>>,
}

impl FakeSigner {
    pub fn signed_count(&self) -> usize {
        self.signed.lock().unwrap().len()
    }

    pub fn deep_count(&self) -> usize {
        self.deep.lock().unwrap().len()
    }
}

impl Signer for FakeSigner {
    async fn sign(&self, path: &Path) -> Result<()> {
        self.signed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn sign_deep(&self, path: &Path, entitlements: &Path) -> Result<()> {
        let contents = std::fs::read(entitlements)?;
        self.deep
            .lock()
            .unwrap()
            .push((path.to_path_buf(), entitlements.to_path_buf(), contents));
        Ok(())
    }
}

/// Patcher recording every invocation and returning a fixed outcome.
pub struct FakePatcher {
    pub outcome: bool,
    pub patched: Mutex<Vec<(PathBuf, PatchStrategy)>>,
}

impl Default for FakePatcher {
    fn default() -> Self {
        Self {
            outcome: true,
            patched: Mutex::new(Vec::new()),
        }
    }
}

impl FakePatcher {
    pub fn failing() -> Self {
        Self {
            outcome: false,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.patched.lock().unwrap().len()
    }
}

impl PlatformPatcher for FakePatcher {
    async fn patch(&self, image: &Path, strategy: PatchStrategy) -> Result<bool> {
        self.patched
            .lock()
            .unwrap()
            .push((image.to_path_buf(), strategy));
        Ok(self.outcome)
    }
}
