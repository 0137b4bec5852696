//! Lookup-target disambiguation and the search attribute allow-list.

use crate::error::FetchError;

/// One lookup input shape, disambiguated before any request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    /// Numeric storefront identifier, e.g. `1480844511`.
    Id(i64),
    /// Reverse-DNS bundle identifier, e.g. `com.example.fishid`.
    BundleId(String),
    /// Storefront product URL; the id is extracted from its `/idNNN` segment.
    Url(String),
}

impl LookupTarget {
    /// Classify a raw user input into a lookup target.
    ///
    /// Bare digits are an id; anything with a scheme is a URL; remaining
    /// dotted inputs are treated as bundle identifiers. Inputs matching none
    /// of the shapes return `None` so callers can report them verbatim.
    #[must_use]
    pub fn detect(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Ok(id) = input.parse::<i64>() {
            return Some(Self::Id(id));
        }
        if input.starts_with("https://") || input.starts_with("http://") {
            return Some(Self::Url(input.to_owned()));
        }
        if input.contains('.') && !input.contains(char::is_whitespace) {
            return Some(Self::BundleId(input.to_owned()));
        }
        None
    }

    /// Resolve the target to the numeric id when one is embedded in it.
    ///
    /// URL targets yield the trailing digits of their `idNNN` path segment;
    /// bundle targets have no embedded id.
    #[must_use]
    pub fn embedded_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Url(url) => extract_id_from_url(url),
            Self::BundleId(_) => None,
        }
    }
}

/// Find the `idNNN` path segment of a storefront URL and parse its digits.
fn extract_id_from_url(url: &str) -> Option<i64> {
    url.split(['/', '?'])
        .find_map(|segment| segment.strip_prefix("id"))
        .and_then(|digits| {
            let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok()
        })
}

/// Attribute names accepted by the search endpoint for software entities.
///
/// Any other attribute yields an upstream HTTP 400, so unknown names are
/// rejected client-side before a request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttribute {
    SoftwareDeveloper,
    DescriptionTerm,
    KeywordsTerm,
    GenreIndex,
    RatingIndex,
}

impl SearchAttribute {
    /// Wire name sent as the `attribute` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftwareDeveloper => "softwareDeveloper",
            Self::DescriptionTerm => "descriptionTerm",
            Self::KeywordsTerm => "keywordsTerm",
            Self::GenreIndex => "genreIndex",
            Self::RatingIndex => "ratingIndex",
        }
    }

    /// Parse a wire name, rejecting anything outside the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidAttribute`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, FetchError> {
        match name {
            "softwareDeveloper" => Ok(Self::SoftwareDeveloper),
            "descriptionTerm" => Ok(Self::DescriptionTerm),
            "keywordsTerm" => Ok(Self::KeywordsTerm),
            "genreIndex" => Ok(Self::GenreIndex),
            "ratingIndex" => Ok(Self::RatingIndex),
            other => Err(FetchError::InvalidAttribute(other.to_owned())),
        }
    }
}
