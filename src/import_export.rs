//! Importer/Exporter (C6): packaging, symmetric-encrypted upload/download,
//! and source-folder normalization (spec.md §4.6).
//!
//! Archival is `zip` (matching the "self-contained archive" framing and the
//! `zip` crate versions present across the broader retrieved corpus).
//! Encryption is AES-256-CBC via `cbc`/`aes`, exactly as specified in §6.
//! Per spec.md §9's Open Question, this implementation resolves the
//! password-length ambiguity in favor of correctness: passwords must be
//! exactly 32 bytes (the AES-256 key length) and the generator produces
//! exactly that many random alphanumeric characters; a shorter password is
//! rejected on decrypt with a clear error rather than silently
//! truncated/padded by the crypto layer.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::catalog::{new_trace, Catalog, CatalogError};
use crate::config::Config;
use crate::lang::detect_lang;
use crate::paths::Paths;
use crate::trace::{CalltraceMode, Trace};
use crate::trace_metadata::{self, TraceMetadataError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key length in bytes; passwords must match this exactly (§9).
pub const PASSWORD_LEN: usize = 32;

#[derive(Debug)]
pub enum ImportExportError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    Metadata(TraceMetadataError),
    Catalog(CatalogError),
    PasswordTooShort(usize),
    Http(String),
    SharingDisabled,
    PathEscapesOutputFolder(String),
    InvalidCompositeKey(String),
}

impl std::fmt::Display for ImportExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportExportError::Io(e) => write!(f, "i/o error: {e}"),
            ImportExportError::Zip(e) => write!(f, "archive error: {e}"),
            ImportExportError::Metadata(e) => write!(f, "{e}"),
            ImportExportError::Catalog(e) => write!(f, "{e}"),
            ImportExportError::PasswordTooShort(len) => {
                write!(f, "password must be {PASSWORD_LEN} bytes, got {len}")
            }
            ImportExportError::Http(msg) => write!(f, "sharing request failed: {msg}"),
            ImportExportError::SharingDisabled => {
                write!(f, "trace sharing is disabled in the config file")
            }
            ImportExportError::PathEscapesOutputFolder(p) => {
                write!(f, "refusing to write outside outputFolder: {p}")
            }
            ImportExportError::InvalidCompositeKey(s) => {
                write!(f, "invalid composite remote key: {s}")
            }
        }
    }
}

impl std::error::Error for ImportExportError {}

impl From<std::io::Error> for ImportExportError {
    fn from(e: std::io::Error) -> Self {
        ImportExportError::Io(e)
    }
}
impl From<zip::result::ZipError> for ImportExportError {
    fn from(e: zip::result::ZipError) -> Self {
        ImportExportError::Zip(e)
    }
}
impl From<TraceMetadataError> for ImportExportError {
    fn from(e: TraceMetadataError) -> Self {
        ImportExportError::Metadata(e)
    }
}
impl From<CatalogError> for ImportExportError {
    fn from(e: CatalogError) -> Self {
        ImportExportError::Catalog(e)
    }
}

// ---------------------------------------------------------------------------
// Import from an already-produced db trace (spec.md §4.6, used both by
// `Recorder` after a successful tracer run and by `ct import`'s unpacked
// zip contents).
// ---------------------------------------------------------------------------

/// Imports the trace materialized under `source_dir` (which must already
/// contain `trace_metadata.json`) into the Catalog.
///
/// `target_dir`, when given, is where the trace should permanently live;
/// when `None` it defaults to `<trace_dir>/trace-<id>`. When `source_dir ==
/// target_dir` (the common Recorder case, where the tracer already wrote
/// directly into its final home) no file copying happens.
pub fn import_db_trace(
    paths: &Paths,
    catalog: &Catalog,
    source_dir: &Path,
    target_dir: Option<PathBuf>,
    trace_id: Option<i64>,
    self_contained: bool,
    test: bool,
) -> Result<Trace, ImportExportError> {
    let id = match trace_id {
        Some(id) => id,
        None => catalog.new_id(test)?,
    };
    let target = target_dir.unwrap_or_else(|| paths.trace_dir_for(test).join(format!("trace-{id}")));
    std::fs::create_dir_all(&target)?;

    if source_dir != target {
        for name in ["trace_metadata.json", "trace_paths.json", "trace.json"] {
            let src = source_dir.join(name);
            if src.is_file() {
                std::fs::copy(&src, target.join(name))?;
            }
        }
    }

    let metadata = trace_metadata::read_trace_metadata(&target)?;
    let raw_paths = trace_metadata::read_trace_paths(&target).unwrap_or_default();

    let program_path = Path::new(&metadata.program);
    let lang = detect_lang(program_path, crate::lang::Lang::Unknown);

    if self_contained {
        for path in &raw_paths {
            if let Err(e) = copy_into_files_subtree(&target, path) {
                log::warn!("could not embed source file {path}: {e}");
            }
        }
        if lang == crate::lang::Lang::Noir {
            if let Some(root) = smallest_common_parent(&raw_paths) {
                if let Err(e) = copy_top_level_files(&target, Path::new(&root)) {
                    log::warn!("could not embed noir package root {root}: {e}");
                }
            }
        }
    }

    let git_toplevel = git_toplevel_of(program_path);
    let parent_dirs: Vec<String> = raw_paths
        .iter()
        .filter_map(|p| Path::new(p).parent().map(|d| d.display().to_string()))
        .collect();
    let mut source_folders = trace_metadata::process_source_folders_list(&parent_dirs, &git_toplevel);
    if source_folders.is_empty() {
        if let Some(dir) = program_path.parent() {
            source_folders.push(dir.display().to_string());
        }
    }

    let mut trace = new_trace(id);
    trace.program = metadata.program;
    trace.args = metadata.args;
    trace.workdir = metadata.workdir;
    trace.lang = lang;
    trace.output_folder = target.display().to_string();
    trace.source_folders = source_folders;
    trace.imported = self_contained;
    trace.calltrace_mode = CalltraceMode::FullRecord;
    trace.date = crate::config::now_human_readable();

    catalog.record_trace(&trace, test)?;
    Ok(trace)
}

/// Copies `abs_path` into `target/files/<abs_path without leading '/'>`,
/// preserving invariant 5/testable-property 8: never writes outside
/// `target` even for a maliciously-crafted `trace_paths.json`.
fn copy_into_files_subtree(target: &Path, abs_path: &str) -> Result<(), ImportExportError> {
    let relative = sanitized_relative(abs_path)?;
    let dest = target.join("files").join(&relative);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if Path::new(abs_path).is_file() {
        std::fs::copy(abs_path, dest)?;
    }
    Ok(())
}

fn copy_top_level_files(target: &Path, dir: &Path) -> Result<(), ImportExportError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            let _ = copy_into_files_subtree(target, &path.display().to_string());
        }
    }
    Ok(())
}

/// Strips the leading `/` and rejects any `..` component, so the resulting
/// path can never climb above `target/files/`.
fn sanitized_relative(abs_path: &str) -> Result<PathBuf, ImportExportError> {
    let trimmed = abs_path.trim_start_matches('/');
    let candidate = PathBuf::from(trimmed);
    if candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(ImportExportError::PathEscapesOutputFolder(abs_path.to_string()));
    }
    Ok(candidate)
}

fn smallest_common_parent(paths: &[String]) -> Option<String> {
    let dirs: Vec<&Path> = paths.iter().map(|p| Path::new(p)).filter_map(|p| p.parent()).collect();
    let first = dirs.first()?;
    let mut common = first.to_path_buf();
    for dir in &dirs[1..] {
        while !dir.starts_with(&common) {
            if !common.pop() {
                return None;
            }
        }
    }
    Some(common.display().to_string())
}

fn git_toplevel_of(program: &Path) -> String {
    let dir = if program.is_dir() { program } else { program.parent().unwrap_or(Path::new("/")) };
    std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Import from a local self-contained zip archive.
// ---------------------------------------------------------------------------

pub fn import_zip(
    paths: &Paths,
    catalog: &Catalog,
    zip_path: &Path,
    output_dir: Option<PathBuf>,
    test: bool,
) -> Result<Trace, ImportExportError> {
    let id = catalog.new_id(test)?;
    let target = output_dir.unwrap_or_else(|| paths.trace_dir_for(test).join(format!("trace-{id}")));
    std::fs::create_dir_all(&target)?;

    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(entry_path) = entry.enclosed_name() else { continue };
        let dest = target.join(entry_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    let metadata = trace_metadata::read_trace_metadata(&target)?;
    let lang = detect_lang(Path::new(&metadata.program), crate::lang::Lang::Unknown);

    let mut trace = new_trace(id);
    trace.program = metadata.program;
    trace.args = metadata.args;
    trace.workdir = metadata.workdir;
    trace.lang = lang;
    trace.output_folder = target.display().to_string();
    trace.imported = true;
    trace.date = crate::config::now_human_readable();

    catalog.record_trace(&trace, test)?;
    Ok(trace)
}

// ---------------------------------------------------------------------------
// Export (upload) / download / remote delete.
// ---------------------------------------------------------------------------

/// Generates a fresh `PASSWORD_LEN`-byte ASCII alphanumeric password.
pub fn generate_password() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(PASSWORD_LEN).map(char::from).collect()
}

/// Zips `dir`'s contents (relative paths, no encryption) — used both by
/// `upload` and by `ct record -e`'s plain local export.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, ImportExportError> {
    zip_dir(dir)
}

fn zip_dir(dir: &Path) -> Result<Vec<u8>, ImportExportError> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    add_dir_to_zip(&mut writer, dir, dir, &options)?;
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

fn add_dir_to_zip(
    writer: &mut zip::ZipWriter<std::io::Cursor<Vec<u8>>>,
    root: &Path,
    dir: &Path,
    options: &zip::write::SimpleFileOptions,
) -> Result<(), ImportExportError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap().display().to_string();
        if path.is_dir() {
            writer.add_directory(format!("{relative}/"), *options)?;
            add_dir_to_zip(writer, root, &path, options)?;
        } else {
            writer.start_file(relative, *options)?;
            let mut contents = Vec::new();
            File::open(&path)?.read_to_end(&mut contents)?;
            writer.write_all(&contents)?;
        }
    }
    Ok(())
}

/// Encrypts `data` with AES-256-CBC: key = `password` (must be exactly 32
/// bytes), IV = the password's first 16 bytes, PKCS#7 padding.
pub fn encrypt(data: &[u8], password: &[u8]) -> Result<Vec<u8>, ImportExportError> {
    if password.len() < 16 {
        return Err(ImportExportError::PasswordTooShort(password.len()));
    }
    let iv = &password[..16];
    let encryptor = Aes256CbcEnc::new_from_slices(password, iv)
        .map_err(|_| ImportExportError::PasswordTooShort(password.len()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(data))
}

/// Decrypts data produced by [`encrypt`] with the same password.
pub fn decrypt(data: &[u8], password: &[u8]) -> Result<Vec<u8>, ImportExportError> {
    if password.len() < 16 {
        return Err(ImportExportError::PasswordTooShort(password.len()));
    }
    let iv = &password[..16];
    let decryptor = Aes256CbcDec::new_from_slices(password, iv)
        .map_err(|_| ImportExportError::PasswordTooShort(password.len()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| ImportExportError::PasswordTooShort(password.len()))
}

/// Builds the composite remote key `<program-name>//<downloadId>//<password>`
/// (spec.md §6/§9: validated as exactly three `//`-separated parts).
pub fn composite_key(program_name: &str, download_id: &str, password: &str) -> String {
    format!("{program_name}//{download_id}//{password}")
}

pub fn parse_composite_key(key: &str) -> Result<(String, String, String), ImportExportError> {
    let parts: Vec<&str> = key.split("//").collect();
    if parts.len() != 3 {
        return Err(ImportExportError::InvalidCompositeKey(key.to_string()));
    }
    Ok((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()))
}

/// Uploads `trace.outputFolder` as an encrypted archive (spec.md §4.6
/// "Export (upload)"). Returns the generated password so the caller can
/// present/store the composite key.
pub fn upload(config: &Config, trace: &Trace) -> Result<String, ImportExportError> {
    if !config.trace_sharing_enabled {
        return Err(ImportExportError::SharingDisabled);
    }
    let password = generate_password();
    let zipped = zip_dir(Path::new(&trace.output_folder))?;
    let encrypted = encrypt(&zipped, password.as_bytes())?;

    std::fs::write(Path::new(&trace.output_folder).join("archived.zip"), &encrypted)?;

    let client = reqwest::blocking::Client::new();
    let form = reqwest::blocking::multipart::Form::new().part(
        "file",
        reqwest::blocking::multipart::Part::bytes(encrypted).file_name("archived.zip"),
    );
    let url = format!("{}/upload", config.web_api_root.trim_end_matches('/'));
    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .map_err(|e| ImportExportError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ImportExportError::Http(format!("upload failed with status {}", response.status())));
    }
    Ok(password)
}

/// Downloads, decrypts, unpacks, and imports a remote trace (spec.md §4.6
/// "Decrypt+unpack (download)"). `download_id`/`password` normally come
/// from a parsed [`parse_composite_key`] result.
pub fn download(
    paths: &Paths,
    catalog: &Catalog,
    config: &Config,
    download_id: &str,
    password: &str,
    test: bool,
) -> Result<Trace, ImportExportError> {
    if !config.trace_sharing_enabled {
        return Err(ImportExportError::SharingDisabled);
    }
    let url = format!(
        "{}{}?DownloadId={}",
        config.base_url.trim_end_matches('/'),
        config.download_api,
        download_id
    );
    let client = reqwest::blocking::Client::new();
    let response = client.get(&url).send().map_err(|e| ImportExportError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ImportExportError::Http(format!("download failed with status {}", response.status())));
    }
    let encrypted = response.bytes().map_err(|e| ImportExportError::Http(e.to_string()))?;
    let zipped = decrypt(&encrypted, password.as_bytes())?;

    let id = catalog.new_id(test)?;
    let target = paths.trace_dir_for(test).join(format!("trace-{id}"));
    std::fs::create_dir_all(&target)?;
    let tmp_zip = target.join("archived.zip");
    std::fs::write(&tmp_zip, &zipped)?;

    let file = File::open(&tmp_zip)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(entry_path) = entry.enclosed_name() else { continue };
        let dest = target.join(entry_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }
    std::fs::remove_file(&tmp_zip).ok();

    import_db_trace(paths, catalog, &target, Some(target.clone()), Some(id), true, test)
}

/// Clears remote-sharing fields after a successful remote delete (spec.md
/// §4.6 "Remote delete").
pub fn remote_delete(config: &Config, catalog: &Catalog, trace: &Trace, test: bool) -> Result<(), ImportExportError> {
    if !config.trace_sharing_enabled {
        return Err(ImportExportError::SharingDisabled);
    }
    let url = format!(
        "{}{}?ControlId={}",
        config.base_url.trim_end_matches('/'),
        config.delete_api,
        trace.control_id
    );
    let client = reqwest::blocking::Client::new();
    let response = client.get(&url).send().map_err(|e| ImportExportError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ImportExportError::Http(format!("delete failed with status {}", response.status())));
    }
    catalog.clear_remote_sharing(trace.id, test)?;
    Ok(())
}
