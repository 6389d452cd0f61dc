use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt::Display, str::FromStr};

use super::{lenient_opt_string, lenient_string, lenient_year};

/// Prefix marking identifiers that were synthesized rather than resolved
pub const PLACEHOLDER_PREFIX: &str = "ai:";

/// Catalog type of a title
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    Movie,
    Series,
}

impl TitleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::Movie => "movie",
            TitleType::Series => "series",
        }
    }

    /// The other catalog type, used when probing a meta id under both types
    pub fn other(&self) -> Self {
        match self {
            TitleType::Movie => TitleType::Series,
            TitleType::Series => TitleType::Movie,
        }
    }

    /// Path segment TMDB uses for this type
    pub fn tmdb_segment(&self) -> &'static str {
        match self {
            TitleType::Movie => "movie",
            TitleType::Series => "tv",
        }
    }
}

impl Display for TitleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(TitleType::Movie),
            "series" => Ok(TitleType::Series),
            other => Err(format!("Unsupported title type: {}", other)),
        }
    }
}

/// Canonical metadata for a catalog title
///
/// Fields the service does not interpret are kept in `extra` so that a meta
/// passed through the add-on keeps everything the catalog returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseTitle {
    pub id: String,
    #[serde(rename = "type")]
    pub title_type: TitleType,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub director: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BaseTitle {
    /// Creates a bare title with only identity fields set
    pub fn new(id: impl Into<String>, title_type: TitleType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title_type,
            name: name.into(),
            year: None,
            genres: Vec::new(),
            description: None,
            director: Vec::new(),
            cast: Vec::new(),
            poster: None,
            background: None,
            extra: Map::new(),
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }
}

/// A similarity suggestion returned by the language model
///
/// Nothing about the shape is trusted: a missing title becomes an empty
/// string and a year given as text or garbage becomes `None`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub reason: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, year: Option<i32>, reason: Option<&str>) -> Self {
        Self {
            title: title.into(),
            year,
            reason: reason.map(str::to_string),
        }
    }

    /// Free-text query used against search services: `"{title} {year}"`
    pub fn query(&self) -> String {
        match self.year {
            Some(year) => format!("{} {}", self.title.trim(), year).trim().to_string(),
            None => self.title.trim().to_string(),
        }
    }
}

/// A candidate after catalog resolution, either a real match or a placeholder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTitle {
    #[serde(flatten)]
    pub meta: BaseTitle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResolvedTitle {
    /// Builds the output entry for a catalog match
    ///
    /// The year is backfilled from the candidate when the match has none and
    /// the type is forced to the requested catalog type.
    pub fn from_match(mut meta: BaseTitle, candidate: &Candidate, target_type: TitleType) -> Self {
        if meta.year.is_none() {
            meta.year = candidate.year;
        }
        meta.title_type = target_type;
        Self {
            meta,
            reason: candidate.reason.clone(),
        }
    }

    /// Synthesizes an entry for a candidate nothing could be matched against
    pub fn placeholder(candidate: &Candidate, target_type: TitleType) -> Self {
        let id = format!("{}{}", PLACEHOLDER_PREFIX, candidate.query());
        let meta = BaseTitle::new(id, target_type, candidate.title.clone()).with_year(candidate.year);
        Self {
            meta,
            reason: candidate.reason.clone(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.meta.id.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Catalog-preview form: reason appended to the description
    pub fn into_preview(mut self) -> Self {
        let mut description = self
            .meta
            .description
            .take()
            .map(|d| format!("{}\n", d))
            .unwrap_or_default();
        if let Some(reason) = &self.reason {
            description.push_str(&format!("Reason: {}", reason));
        }
        self.meta.description = if description.is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }
}
