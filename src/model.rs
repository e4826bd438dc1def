use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SECTION: &str = "Entry";

/// Value of the `Type` key. Decides which of `Exec`, `URL` and `Path` carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    /// `Path` is the working directory and `Exec` the command line.
    Application,
    /// `URL` is the target.
    Link,
    /// `Path` is the directory itself.
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Application => "Application",
            EntryKind::Link => "Link",
            EntryKind::Directory => "Directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `[Desktop Entry]` group. Field order is the order keys are written in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DesktopEntry {
    /// Group name after `Desktop `; `None` means `Entry`.
    #[serde(skip)]
    pub section: Option<String>,
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: Option<EntryKind>,
    pub version: Option<String>,
    pub generic_name: Option<String>,
    pub no_display: Option<bool>,
    pub comment: Option<String>,
    pub icon: Option<PathBuf>,
    pub hidden: Option<bool>,
    pub only_show_in: Vec<String>,
    pub not_show_in: Vec<String>,
    #[serde(rename = "DBusActivatable")]
    pub dbus_activatable: Option<bool>,
    pub try_exec: Option<String>,
    pub exec: Option<String>,
    pub path: Option<PathBuf>,
    pub terminal: Option<bool>,
    pub actions: Vec<String>,
    pub mime_type: Vec<String>,
    pub categories: Vec<String>,
    pub implements: Vec<String>,
    pub keywords: Vec<String>,
    pub startup_notify: Option<bool>,
    #[serde(rename = "StartupWMClass")]
    pub startup_wm_class: Option<String>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    #[serde(rename = "PrefersNonDefaultGPU")]
    pub prefers_non_default_gpu: Option<bool>,
    pub single_main_window: Option<bool>,
}

impl DesktopEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn section_name(&self) -> &str {
        self.section.as_deref().unwrap_or(DEFAULT_SECTION)
    }

    /// Keys paired with their rendered values, `None` when the field is absent.
    fn fields(&self) -> [(&'static str, Option<String>); 25] {
        [
            ("Name", text(Some(&self.name))),
            ("Type", self.kind.map(|k| k.as_str().to_string())),
            ("Version", text(self.version.as_ref())),
            ("GenericName", text(self.generic_name.as_ref())),
            ("NoDisplay", boolean(self.no_display)),
            ("Comment", text(self.comment.as_ref())),
            ("Icon", path(self.icon.as_ref())),
            ("Hidden", boolean(self.hidden)),
            ("OnlyShowIn", list(&self.only_show_in)),
            ("NotShowIn", list(&self.not_show_in)),
            ("DBusActivatable", boolean(self.dbus_activatable)),
            ("TryExec", text(self.try_exec.as_ref())),
            ("Exec", text(self.exec.as_ref())),
            ("Path", path(self.path.as_ref())),
            ("Terminal", boolean(self.terminal)),
            ("Actions", list(&self.actions)),
            ("MimeType", list(&self.mime_type)),
            ("Categories", list(&self.categories)),
            ("Implements", list(&self.implements)),
            ("Keywords", list(&self.keywords)),
            ("StartupNotify", boolean(self.startup_notify)),
            ("StartupWMClass", text(self.startup_wm_class.as_ref())),
            ("URL", text(self.url.as_ref())),
            ("PrefersNonDefaultGPU", boolean(self.prefers_non_default_gpu)),
            ("SingleMainWindow", boolean(self.single_main_window)),
        ]
    }

    /// Renders the group. With `keep_empty` absent fields are written as `Key=`.
    pub fn serialize(&self, keep_empty: bool) -> String {
        let mut out = format!("[Desktop {}]\n", self.section_name());
        for (key, value) in self.fields() {
            match value {
                Some(value) => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&value);
                    out.push('\n');
                }
                None if keep_empty => {
                    out.push_str(key);
                    out.push_str("=\n");
                }
                None => {}
            }
        }
        out
    }

    /// File name the entry is saved under when no explicit output is given.
    pub fn file_name(&self) -> String {
        format!("{}.desktop", self.name.replace('/', "-"))
    }
}

impl fmt::Display for DesktopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize(false))
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn text(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(|v| escape(v))
}

fn path(value: Option<&PathBuf>) -> Option<String> {
    value
        .map(|p| p.to_string_lossy())
        .filter(|p| !p.is_empty())
        .map(|p| escape(&p))
}

fn boolean(value: Option<bool>) -> Option<String> {
    value.map(|b| if b { "true" } else { "false" }.to_string())
}

fn list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let mut out = String::new();
    for v in values {
        out.push_str(&escape(v));
        out.push(';');
    }
    Some(out)
}
