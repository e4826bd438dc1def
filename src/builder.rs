use crate::config::OutputConfig;
use crate::error::{Error, Result};
use crate::fetch::{self, MetadataFetcher};
use crate::model::{DesktopEntry, EntryKind};
use crate::probe::{self, VersionProber};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// User supplied values that win over anything inferred from the target.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub icon: Option<PathBuf>,
    pub exec: Option<String>,
    pub comment: Option<String>,
    pub generic_name: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub mime_type: Vec<String>,
    pub startup_wm_class: Option<String>,
    pub terminal: Option<bool>,
    pub no_display: Option<bool>,
}

impl Overrides {
    pub fn apply(&self, entry: &mut DesktopEntry) {
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(icon) = &self.icon {
            entry.icon = Some(icon.clone());
        }
        if let Some(exec) = &self.exec {
            entry.exec = Some(exec.clone());
        }
        if let Some(comment) = &self.comment {
            entry.comment = Some(comment.clone());
        }
        if let Some(generic_name) = &self.generic_name {
            entry.generic_name = Some(generic_name.clone());
        }
        if !self.categories.is_empty() {
            entry.categories = self.categories.clone();
        }
        if !self.keywords.is_empty() {
            entry.keywords = self.keywords.clone();
        }
        if !self.mime_type.is_empty() {
            entry.mime_type = self.mime_type.clone();
        }
        if let Some(class) = &self.startup_wm_class {
            entry.startup_wm_class = Some(class.clone());
        }
        if self.terminal.is_some() {
            entry.terminal = self.terminal;
        }
        if self.no_display.is_some() {
            entry.no_display = self.no_display;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub overrides: Overrides,
    /// Output file, or a directory to place `<Name>.desktop` in.
    pub output: Option<PathBuf>,
    pub output_config: OutputConfig,
}

pub fn classify(input: &str) -> EntryKind {
    if input.contains("://") {
        EntryKind::Link
    } else if Path::new(input).is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Application
    }
}

/// Inferred fields for an executable; the version is filled in later.
pub fn application_entry(input: &str) -> DesktopEntry {
    let path = Path::new(input);
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());

    let mut entry = DesktopEntry::new(name);
    entry.kind = Some(EntryKind::Application);
    entry.path = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && *p != Path::new("."))
        .map(Path::to_path_buf);
    entry.exec = Some(input.to_string());
    entry
}

pub fn directory_entry(input: &str) -> DesktopEntry {
    let path = Path::new(input);
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .or_else(|| {
            fs::canonicalize(path)
                .ok()
                .and_then(|p| p.file_name().map(|s| s.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| input.to_string());

    let mut entry = DesktopEntry::new(name);
    entry.kind = Some(EntryKind::Directory);
    entry.path = Some(path.to_path_buf());
    entry
}

/// Builds link fields from already fetched page metadata.
pub fn link_entry(input: &str, meta: fetch::PageMetadata, name_max_chars: usize) -> DesktopEntry {
    let name = match &meta.title {
        Some(title) => title.chars().take(name_max_chars).collect::<String>(),
        None => fetch::domain(input).unwrap_or(input).to_string(),
    };

    let mut entry = DesktopEntry::new(name);
    entry.kind = Some(EntryKind::Link);
    entry.url = Some(input.to_string());
    entry.comment = meta.title;
    entry.icon = meta.icon;
    entry
}

pub struct EntryBuilder<'a> {
    prober: &'a VersionProber,
    fetcher: &'a MetadataFetcher,
    options: &'a BuildOptions,
}

impl<'a> EntryBuilder<'a> {
    pub fn new(prober: &'a VersionProber, fetcher: &'a MetadataFetcher, options: &'a BuildOptions) -> Self {
        Self { prober, fetcher, options }
    }

    /// Builds the entry for `input` and writes it, returning the entry and the file written.
    pub async fn build_and_save(&self, input: &str) -> Result<(DesktopEntry, PathBuf)> {
        match classify(input) {
            EntryKind::Link => {
                let meta = self.fetcher.fetch_metadata(input).await?;
                let mut entry = link_entry(input, meta, self.options.output_config.name_max_chars);
                self.finish(&mut entry);
                let path = self.save(&entry)?;
                Ok((entry, path))
            }
            EntryKind::Directory => {
                warn!("{}: use `ln -s` instead of a .desktop file for directories", input);
                let mut entry = directory_entry(input);
                self.finish(&mut entry);
                let path = self.save(&entry)?;
                Ok((entry, path))
            }
            EntryKind::Application => {
                let mut entry = application_entry(input);
                self.finish(&mut entry);
                self.save(&entry)?;

                entry.version = match self.prober.probe_version(input).await {
                    Some(version) => Some(version),
                    None => probe::regex_version(input),
                };
                let path = self.save(&entry)?;
                Ok((entry, path))
            }
        }
    }

    fn finish(&self, entry: &mut DesktopEntry) {
        self.options.overrides.apply(entry);
        let section = &self.options.output_config.section;
        if !section.is_empty() {
            entry.section = Some(section.clone());
        }
    }

    pub fn output_path(&self, entry: &DesktopEntry) -> PathBuf {
        match &self.options.output {
            Some(out) if out.is_dir() => out.join(entry.file_name()),
            Some(out) => out.clone(),
            None => match &entry.path {
                Some(dir) => dir.join(entry.file_name()),
                None => PathBuf::from(entry.file_name()),
            },
        }
    }

    /// Writes the serialized entry, replacing any existing file.
    pub fn save(&self, entry: &DesktopEntry) -> Result<PathBuf> {
        let to = self.output_path(entry);
        fs::write(&to, entry.serialize(self.options.output_config.keep_empty))
            .map_err(|e| Error::io(&to, e))?;
        info!("Wrote {:?}", to);
        Ok(to)
    }
}
