//! Field names, field sets, sentinel values and defect codes

/// Field names
pub mod fields {
    #![allow(missing_docs)]

    pub const ID: &str = "ID";
    pub const ENTRYTYPE: &str = "ENTRYTYPE";
    pub const DOI: &str = "doi";
    pub const URL: &str = "url";
    pub const ISSN: &str = "issn";
    pub const ISBN: &str = "isbn";
    pub const ABSTRACT: &str = "abstract";
    pub const KEYWORDS: &str = "keywords";
    pub const CITED_BY: &str = "cited_by";
    pub const FILE: &str = "file";
    pub const INSTITUTION: &str = "institution";
    pub const MONTH: &str = "month";
    pub const SERIES: &str = "series";
    pub const SCHOOL: &str = "school";
    pub const LANGUAGE: &str = "language";

    pub const MD_PROV: &str = "colrev_masterdata_provenance";
    pub const D_PROV: &str = "colrev_data_provenance";
    pub const ORIGIN: &str = "colrev_origin";
    pub const STATUS: &str = "colrev_status";
    pub const PDF_ID: &str = "colrev_pdf_id";
    pub const COLREV_ID: &str = "colrev_id";

    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const YEAR: &str = "year";
    pub const JOURNAL: &str = "journal";
    pub const BOOKTITLE: &str = "booktitle";
    pub const CHAPTER: &str = "chapter";
    pub const PUBLISHER: &str = "publisher";
    pub const VOLUME: &str = "volume";
    pub const NUMBER: &str = "number";
    pub const PAGES: &str = "pages";
    pub const EDITOR: &str = "editor";
    pub const EDITION: &str = "edition";
    pub const ADDRESS: &str = "address";

    pub const SCREENING_CRITERIA: &str = "screening_criteria";
    pub const PRESCREEN_EXCLUSION: &str = "prescreen_exclusion";
    pub const RETRACTED: &str = "retracted";
    pub const CROSSMARK: &str = "crossmark";
    pub const CROSSREF_CROSSMARK: &str = "colrev.crossref.crossmark";
    pub const WARNING: &str = "warning";
    pub const MOVED_DUPE_ID: &str = "MOVED_DUPE_ID";
}

/// Sentinel field values
pub mod values {
    /// Value was looked for but is not available
    pub const UNKNOWN: &str = "UNKNOWN";
    /// Accepted but not yet assigned to an issue
    pub const FORTHCOMING: &str = "forthcoming";
    /// Retraction marker and prescreen exclusion reason
    pub const RETRACTED: &str = "retracted";
    /// Masterdata provenance key marking a curated record
    pub const CURATED: &str = "CURATED";
}

/// Defect codes written to provenance notes
pub mod defects {
    #![allow(missing_docs)]

    pub const IGNORE_PREFIX: &str = "IGNORE:";

    pub const MISSING: &str = "missing";
    pub const NOT_MISSING: &str = "not-missing";
    pub const RECORD_NOT_IN_TOC: &str = "record-not-in-toc";
    pub const INCONSISTENT_WITH_ENTRYTYPE: &str = "inconsistent-with-entrytype";
    pub const CONTAINER_TITLE_ABBREVIATED: &str = "container-title-abbreviated";
    pub const DOI_NOT_MATCHING_PATTERN: &str = "doi-not-matching-pattern";
    pub const ERRONEOUS_SYMBOL_IN_FIELD: &str = "erroneous-symbol-in-field";
    pub const ERRONEOUS_TERM_IN_FIELD: &str = "erroneous-term-in-field";
    pub const ERRONEOUS_TITLE_FIELD: &str = "erroneous-title-field";
    pub const HTML_TAGS: &str = "html-tags";
    pub const IDENTICAL_VALUES_BETWEEN_TITLE_AND_CONTAINER: &str =
        "identical-values-between-title-and-container";
    pub const INCOMPLETE_FIELD: &str = "incomplete-field";
    pub const INCONSISTENT_CONTENT: &str = "inconsistent-content";
    pub const INCONSISTENT_WITH_DOI_METADATA: &str = "inconsistent-with-doi-metadata";
    pub const INCONSISTENT_WITH_URL_METADATA: &str = "inconsistent-with-url-metadata";
    pub const ISBN_NOT_MATCHING_PATTERN: &str = "isbn-not-matching-pattern";
    pub const LANGUAGE_FORMAT_ERROR: &str = "language-format-error";
    pub const LANGUAGE_UNKNOWN: &str = "language-unknown";
    pub const MOSTLY_ALL_CAPS: &str = "mostly-all-caps";
    pub const NAME_ABBREVIATED: &str = "name-abbreviated";
    pub const NAME_FORMAT_SEPARATORS: &str = "name-format-separators";
    pub const NAME_FORMAT_TITLES: &str = "name-format-titles";
    pub const NAME_PARTICLES: &str = "name-particles";
    pub const PAGE_RANGE: &str = "page-range";
    pub const PUBMED_ID_NOT_MATCHING_PATTERN: &str = "pubmedid-not-matching-pattern";
    pub const THESIS_WITH_MULTIPLE_AUTHORS: &str = "thesis-with-multiple-authors";
    pub const YEAR_FORMAT: &str = "year-format";
    pub const PDF_INCOMPLETE: &str = "pdf-incomplete";

    /// Every known defect code
    pub const ALL: &[&str] = &[
        MISSING,
        NOT_MISSING,
        RECORD_NOT_IN_TOC,
        INCONSISTENT_WITH_ENTRYTYPE,
        CONTAINER_TITLE_ABBREVIATED,
        DOI_NOT_MATCHING_PATTERN,
        ERRONEOUS_SYMBOL_IN_FIELD,
        ERRONEOUS_TERM_IN_FIELD,
        ERRONEOUS_TITLE_FIELD,
        HTML_TAGS,
        IDENTICAL_VALUES_BETWEEN_TITLE_AND_CONTAINER,
        INCOMPLETE_FIELD,
        INCONSISTENT_CONTENT,
        INCONSISTENT_WITH_DOI_METADATA,
        INCONSISTENT_WITH_URL_METADATA,
        ISBN_NOT_MATCHING_PATTERN,
        LANGUAGE_FORMAT_ERROR,
        LANGUAGE_UNKNOWN,
        MOSTLY_ALL_CAPS,
        NAME_ABBREVIATED,
        NAME_FORMAT_SEPARATORS,
        NAME_FORMAT_TITLES,
        NAME_PARTICLES,
        PAGE_RANGE,
        PUBMED_ID_NOT_MATCHING_PATTERN,
        THESIS_WITH_MULTIPLE_AUTHORS,
        YEAR_FORMAT,
        PDF_INCOMPLETE,
    ];

    /// `IGNORE:<code>`
    #[must_use]
    pub fn ignore(code: &str) -> String {
        format!("{IGNORE_PREFIX}{code}")
    }

    /// Whether `code` is a known defect code
    #[must_use]
    pub fn is_known(code: &str) -> bool {
        ALL.contains(&code)
    }
}

/// Identifying (masterdata) fields, in canonical order
pub const IDENTIFYING_FIELDS: [&str; 12] = [
    fields::TITLE,
    fields::AUTHOR,
    fields::YEAR,
    fields::JOURNAL,
    fields::BOOKTITLE,
    fields::CHAPTER,
    fields::PUBLISHER,
    fields::VOLUME,
    fields::NUMBER,
    fields::PAGES,
    fields::EDITOR,
    fields::INSTITUTION,
];

/// Fields that carry provenance themselves and never get a provenance entry
pub const PROVENANCE_KEYS: [&str; 5] = [
    fields::MD_PROV,
    fields::D_PROV,
    fields::ORIGIN,
    fields::STATUS,
    fields::PDF_ID,
];

/// Default time-variant fields (only propagated when a feed refreshes)
pub const DEFAULT_TIME_VARIANT_FIELDS: &[&str] = &[fields::CITED_BY];

/// Whether `key` is an identifying field
#[inline]
#[must_use]
pub fn is_identifying(key: &str) -> bool {
    IDENTIFYING_FIELDS.contains(&key)
}

/// Whether `key` never receives a provenance entry
#[inline]
#[must_use]
pub fn has_no_provenance(key: &str) -> bool {
    key == fields::ID || key == fields::ENTRYTYPE || PROVENANCE_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn institution_is_identifying() {
        assert!(is_identifying(fields::INSTITUTION));
        assert!(!is_identifying(fields::DOI));
    }

    #[test]
    fn provenance_keys_have_no_provenance() {
        assert!(has_no_provenance(fields::PDF_ID));
        assert!(has_no_provenance(fields::ID));
        assert!(!has_no_provenance(fields::TITLE));
    }

    #[test]
    fn ignore_code_format() {
        assert_eq!(defects::ignore(defects::MISSING), "IGNORE:missing");
        assert!(defects::is_known("page-range"));
        assert!(!defects::is_known("IGNORE:missing"));
    }
}
