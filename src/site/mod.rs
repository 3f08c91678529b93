//! Site table for the TESSA collection on OpenLearn Create
//!
//! Every language edition shares the same Moodle skin but differs in entry
//! page, the keyword used for "Section" pseudo-pages, and channel metadata.
//! Handlers look these up here instead of branching on the language.

use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course page that lists every language edition together
pub const TESSA_HOME_URL: &str = "http://www.tessafrica.net/home";

/// Base URL of the Moodle course view used by all language entry pages
const COURSE_VIEW_URL: &str = "http://www.open.edu/openlearncreate/course/view.php";

/// URLs never worth fetching, whatever the language
pub const DEFAULT_IGNORE_URLS: &[&str] = &[
    "http://www.open.edu/openlearn/",
    "http://www.open.edu/openlearncreate",
    "http://www.open.edu/openlearncreate/",
    "http://www.open.edu/openlearncreate/my/",
    "http://www.open.edu/openlearncreate/local/ocwactivityreports/",
    "http://www.open.edu/openlearncreate/local/ocwcollections/collections.php",
    "http://www.open.edu/openlearncreate/course/index.php",
    "http://www.open.edu/openlearncreate/course/index.php?categoryid=25",
    "http://www.open.edu/openlearncreate/course/index.php?categoryid=47",
    "http://www.open.edu/openlearnworks/mod/url/view.php?id=83245",
    "http://www.open.edu/openlearncreate/local/ocwfaqs/faq.php",
];

/// Patterns for login pages, course-creation tools, olink cross references and tooltips
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r".*openlearncreate/login\.php.*",
    r".*local/ocwcreatecourse/.*",
    r".*local/ocwfreecourses/.*",
    r".*mod/oucontent/olink\.php.*",
    r".*oucontent/hidetip\.php.*",
];

/// Hosts the crawler is allowed to follow links into
pub const DEFAULT_SOURCE_DOMAINS: &[&str] = &["www.open.edu", "*.tessafrica.net"];

pub const AUTHOR: &str = "TESSA";
pub const LICENSE: &str = "CC BY-SA";

/// Language editions of the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Ar,
    Sw,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Fr, Language::Ar, Language::Sw];

    /// Two-letter code used in file names and on the command line
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
            Self::Ar => "ar",
            Self::Sw => "sw",
        }
    }

    /// The per-language profile consulted by handlers and restructuring
    pub fn profile(&self) -> &'static LanguageProfile {
        match self {
            Self::En => &EN,
            Self::Fr => &FR,
            Self::Ar => &AR,
            Self::Sw => &SW,
        }
    }

    /// Default course page for this language edition
    pub fn default_entry_url(&self) -> String {
        format!("{}?id={}", COURSE_VIEW_URL, self.profile().course_id)
    }

    /// Keywords that mark a "Section N" pseudo-page title in this language
    ///
    /// Swahili pages sometimes carry untranslated English labels, so Swahili
    /// also matches the English keyword.
    pub fn section_keywords(&self) -> Vec<&'static str> {
        let mut keywords = vec![self.profile().section_keyword];
        if *self == Self::Sw {
            keywords.push(EN.section_keyword);
        }
        keywords
    }

    /// Returns true if `title` starts with one of this language's section keywords
    pub fn is_section_title(&self, title: &str) -> bool {
        let title = title.trim_start();
        self.section_keywords()
            .iter()
            .any(|keyword| title.starts_with(keyword))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            "ar" => Ok(Self::Ar),
            "sw" => Ok(Self::Sw),
            other => Err(HarvestError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Table entry describing how one language edition is laid out
#[derive(Debug)]
pub struct LanguageProfile {
    /// Moodle course id of the language's main page
    pub course_id: u32,

    /// Word that starts the title of "Section N" pages
    pub section_keyword: &'static str,

    /// Region holding the links on the language main page
    pub root_regions: &'static [&'static str],

    /// Region holding the links on a subpage, tried in order
    pub subpage_regions: &'static [&'static str],

    /// Region holding the file link on a resource interstitial, tried in order
    pub resource_regions: &'static [&'static str],

    /// Channel title shown downstream
    pub channel_title: &'static str,

    /// Channel source id shown downstream
    pub channel_source_id: &'static str,
}

const ROOT_REGIONS: &[&str] = &[".course-content"];
const SUBPAGE_REGIONS: &[&str] = &[".pagecontent-content", ".course-content"];
const RESOURCE_REGIONS: &[&str] = &[".resourceworkaround", ".resourcecontent", "[role=main]"];

static EN: LanguageProfile = LanguageProfile {
    course_id: 2042,
    section_keyword: "Section",
    root_regions: ROOT_REGIONS,
    subpage_regions: SUBPAGE_REGIONS,
    resource_regions: RESOURCE_REGIONS,
    channel_title: "TESSA (EN)",
    channel_source_id: "tessa_africa_en",
};

static FR: LanguageProfile = LanguageProfile {
    course_id: 2046,
    section_keyword: "Section",
    root_regions: ROOT_REGIONS,
    subpage_regions: SUBPAGE_REGIONS,
    resource_regions: RESOURCE_REGIONS,
    channel_title: "TESSA (FR)",
    channel_source_id: "tessa_africa_fr",
};

static AR: LanguageProfile = LanguageProfile {
    course_id: 2198,
    section_keyword: "القسم",
    root_regions: ROOT_REGIONS,
    subpage_regions: SUBPAGE_REGIONS,
    resource_regions: RESOURCE_REGIONS,
    channel_title: "TESSA (AR)",
    channel_source_id: "tessa_africa_ar",
};

static SW: LanguageProfile = LanguageProfile {
    course_id: 2199,
    section_keyword: "Sehemu",
    root_regions: ROOT_REGIONS,
    subpage_regions: SUBPAGE_REGIONS,
    resource_regions: RESOURCE_REGIONS,
    channel_title: "TESSA (SW)",
    channel_source_id: "tessa_africa_sw",
};
