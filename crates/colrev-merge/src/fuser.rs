//! Field fusers
//!
//! When two records disagree on a field, a [`FieldFuser`] decides which
//! value survives. Fusers are pure: they inspect both records and return a
//! [`Fusion`]; the merger applies it with provenance.

use colrev_record::prep::percent_upper_chars;
use colrev_record::{fields, Record};
use std::fmt::Debug;

/// Outcome of fusing one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fusion {
    /// Keep the main record's value
    KeepMain,
    /// Take the merging record's value
    TakeIncoming,
    /// Store a combined value
    Combined(String),
}

/// Chooses the surviving value of a field present in both records
///
/// # Contract
/// `fuse` is only called when both records carry the field. It must be
/// deterministic and must not depend on anything but the two records.
pub trait FieldFuser: Send + Sync + Debug {
    /// Fuser name (for logs and the registry listing)
    fn name(&self) -> &'static str;

    /// Fields this fuser handles
    fn fields(&self) -> &'static [&'static str];

    /// Decide between `main` and `incoming` for `key`
    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion;
}

fn active_defects(record: &Record, key: &str) -> usize {
    record
        .md_prov()
        .get(key)
        .or_else(|| record.d_prov().get(key))
        .map_or(0, |p| p.notes.active().count())
}

/// Fewer active author defects wins; ties keep main
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorFuser;

impl FieldFuser for AuthorFuser {
    fn name(&self) -> &'static str {
        "author"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::AUTHOR]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        if active_defects(incoming, key) < active_defects(main, key) {
            Fusion::TakeIncoming
        } else {
            Fusion::KeepMain
        }
    }
}

/// Prefers the title with fewer upper-case letters
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleFuser;

impl FieldFuser for TitleFuser {
    fn name(&self) -> &'static str {
        "title"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::TITLE]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        let default = main.get_or(key, "");
        let candidate = incoming.get_or(key, "");
        if default.replace(" - ", ": ") == candidate.replace(" - ", ": ") {
            return Fusion::KeepMain;
        }
        // trailing markers are footnote artefacts
        if candidate.ends_with(['*', '1', '2']) {
            return Fusion::KeepMain;
        }
        if percent_upper_chars(default) > percent_upper_chars(candidate) {
            Fusion::TakeIncoming
        } else {
            Fusion::KeepMain
        }
    }
}

/// Prefers page ranges in `from--to` form
#[derive(Debug, Clone, Copy, Default)]
pub struct PagesFuser;

impl FieldFuser for PagesFuser {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::PAGES]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        if incoming.get_or(key, "").contains("--") && !main.get_or(key, "").contains("--") {
            Fusion::TakeIncoming
        } else {
            Fusion::KeepMain
        }
    }
}

/// Avoids abbreviated and all-caps container titles
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerTitleFuser;

impl FieldFuser for ContainerTitleFuser {
    fn name(&self) -> &'static str {
        "container_title"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::JOURNAL, fields::BOOKTITLE]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        let default = main.get_or(key, "");
        let candidate = incoming.get_or(key, "");
        let abbreviated = default.contains('.') && !candidate.contains('.');
        if abbreviated || percent_upper_chars(default) > percent_upper_chars(candidate) {
            Fusion::TakeIncoming
        } else {
            Fusion::KeepMain
        }
    }
}

/// Accumulates file paths separated by `;`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFuser;

impl FieldFuser for FileFuser {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::FILE]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        let current = main.get_or(key, "");
        let other = incoming.get_or(key, "");
        if current.split(';').any(|f| f == other) {
            return Fusion::KeepMain;
        }
        Fusion::Combined(format!("{current};{other}"))
    }
}

/// Prefers https when both urls point to the same location
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlFuser;

fn strip_scheme(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

impl FieldFuser for UrlFuser {
    fn name(&self) -> &'static str {
        "url"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::URL]
    }

    fn fuse(&self, main: &Record, incoming: &Record, key: &str) -> Fusion {
        let current = main.get_or(key, "");
        let other = incoming.get_or(key, "");
        if !current.starts_with("https")
            && other.starts_with("https")
            && strip_scheme(current) == strip_scheme(other)
        {
            Fusion::TakeIncoming
        } else {
            Fusion::KeepMain
        }
    }
}
