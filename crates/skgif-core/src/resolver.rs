//! Identifier scheme resolution.
//!
//! [`IdentifierResolver::resolve`] turns a `(scheme, value)` pair into a
//! [`ResolvedIdentifier`]. Known schemes get a fixed URI template applied to
//! the value after a syntactic shape check; nothing is looked up over the
//! network. Unknown schemes and values that fail their shape check fall
//! back to a local URI under the configured base, so a bad identifier never
//! fails the surrounding transformation.
//!
//! Resolution is a pure function of its inputs.

use url::form_urlencoded;

use crate::models::ResolvedIdentifier;

/// Identifier schemes accepted by SKG-IF.
pub const ALLOWED_SCHEMES: &[&str] = &[
    "arxiv", "bibcode", "crossref", "doi", "eissn", "handle", "isbn", "issn", "ivoid", "lissn",
    "omid", "openalex", "opendoar", "orcid", "pmcid", "pmid", "ror", "spase", "url", "urn", "viaf",
    "w3id",
];

/// Schemes with a resolution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Orcid,
    Ror,
    Doi,
    Handle,
    Arxiv,
    Pmid,
    Pmcid,
    Viaf,
    OpenAlex,
    W3id,
    Urn,
    Url,
}

impl Rule {
    fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "orcid" => Some(Rule::Orcid),
            "ror" => Some(Rule::Ror),
            "doi" => Some(Rule::Doi),
            "handle" | "hdl" => Some(Rule::Handle),
            "arxiv" => Some(Rule::Arxiv),
            "pmid" => Some(Rule::Pmid),
            "pmcid" => Some(Rule::Pmcid),
            "viaf" => Some(Rule::Viaf),
            "openalex" => Some(Rule::OpenAlex),
            "w3id" => Some(Rule::W3id),
            "urn" => Some(Rule::Urn),
            "url" => Some(Rule::Url),
            _ => None,
        }
    }

    /// Resolver-host prefixes that may precede the bare value in source data.
    fn known_prefixes(self) -> &'static [&'static str] {
        match self {
            Rule::Orcid => &["https://orcid.org/", "http://orcid.org/", "orcid.org/"],
            Rule::Ror => &["https://ror.org/", "http://ror.org/", "ror.org/"],
            Rule::Doi => &[
                "https://doi.org/",
                "http://doi.org/",
                "https://dx.doi.org/",
                "http://dx.doi.org/",
                "doi:",
            ],
            Rule::Handle => &["https://hdl.handle.net/", "http://hdl.handle.net/", "hdl:"],
            Rule::Arxiv => &["https://arxiv.org/abs/", "arxiv:"],
            Rule::Viaf => &["https://viaf.org/viaf/", "http://viaf.org/viaf/"],
            Rule::OpenAlex => &["https://openalex.org/"],
            Rule::W3id => &["https://w3id.org/"],
            Rule::Pmid | Rule::Pmcid | Rule::Urn | Rule::Url => &[],
        }
    }

    fn normalize(self, value: &str) -> String {
        let mut bare = value;
        for prefix in self.known_prefixes() {
            if bare
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            {
                bare = &bare[prefix.len()..];
                break;
            }
        }
        match self {
            Rule::Orcid => bare.to_ascii_uppercase(),
            Rule::Ror => bare.to_ascii_lowercase(),
            Rule::Pmcid => bare.to_ascii_uppercase(),
            _ => bare.to_string(),
        }
    }

    fn is_valid(self, bare: &str) -> bool {
        match self {
            Rule::Orcid => is_valid_orcid(bare),
            Rule::Ror => is_valid_ror(bare),
            Rule::Doi => is_valid_doi(bare),
            Rule::Handle => {
                matches!(bare.split_once('/'), Some((p, s)) if !p.is_empty() && !s.is_empty())
                    && !bare.contains(char::is_whitespace)
            }
            Rule::Arxiv | Rule::W3id => !bare.is_empty() && !bare.contains(char::is_whitespace),
            Rule::Pmid | Rule::Viaf => !bare.is_empty() && bare.bytes().all(|b| b.is_ascii_digit()),
            Rule::Pmcid => bare
                .strip_prefix("PMC")
                .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit())),
            Rule::OpenAlex => {
                let mut chars = bare.chars();
                matches!(chars.next(), Some('W' | 'A' | 'S' | 'I' | 'C' | 'P' | 'F' | 'T'))
                    && chars.clone().next().is_some()
                    && chars.all(|c| c.is_ascii_digit())
            }
            Rule::Urn => bare.to_ascii_lowercase().starts_with("urn:nbn:"),
            Rule::Url => url::Url::parse(bare)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
                .unwrap_or(false),
        }
    }

    fn uri(self, bare: &str) -> String {
        match self {
            Rule::Orcid => format!("https://orcid.org/{}", bare),
            Rule::Ror => format!("https://ror.org/{}", bare),
            Rule::Doi => format!("https://doi.org/{}", bare),
            Rule::Handle => format!("https://hdl.handle.net/{}", bare),
            Rule::Arxiv => format!("https://arxiv.org/abs/{}", bare),
            Rule::Pmid => format!("https://pubmed.ncbi.nlm.nih.gov/{}", bare),
            Rule::Pmcid => format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}", bare),
            Rule::Viaf => format!("https://viaf.org/viaf/{}", bare),
            Rule::OpenAlex => format!("https://openalex.org/{}", bare),
            Rule::W3id => format!("https://w3id.org/{}", bare),
            Rule::Urn => format!("https://nbn-resolving.org/{}", bare),
            Rule::Url => bare.to_string(),
        }
    }
}

/// ISO 7064 MOD 11-2 check over `XXXX-XXXX-XXXX-XXXX`.
fn is_valid_orcid(value: &str) -> bool {
    if !value.is_ascii() {
        return false;
    }
    let groups: Vec<&str> = value.split('-').collect();
    if groups.len() != 4 || groups.iter().any(|g| g.len() != 4) {
        return false;
    }
    let chars: Vec<char> = groups.concat().chars().collect();
    let (body, check) = chars.split_at(15);
    let mut total: u32 = 0;
    for c in body {
        match c.to_digit(10) {
            Some(d) => total = (total + d) * 2,
            None => return false,
        }
    }
    let result = (12 - total % 11) % 11;
    let expected = if result == 10 {
        'X'
    } else {
        char::from_digit(result, 10).unwrap_or('?')
    };
    check[0] == expected
}

/// `0` + six Crockford base32 characters + two check digits.
fn is_valid_ror(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 9
        && bytes[0] == b'0'
        && bytes[1..7]
            .iter()
            .all(|&b| matches!(b, b'0'..=b'9' | b'a'..=b'h' | b'j' | b'k' | b'm' | b'n' | b'p'..=b't' | b'v'..=b'z'))
        && bytes[7..].iter().all(u8::is_ascii_digit)
}

/// `10.<registrant>/<suffix>` with a numeric registrant code.
fn is_valid_doi(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("10.") else {
        return false;
    };
    match rest.split_once('/') {
        Some((registrant, suffix)) => {
            !registrant.is_empty()
                && registrant.bytes().all(|b| b.is_ascii_digit() || b == b'.')
                && !suffix.is_empty()
                && !suffix.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Resolves identifier values to canonical URIs.
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    local_base: String,
}

impl IdentifierResolver {
    /// `local_base` prefixes every local fallback URI; a trailing `/` is added if missing.
    pub fn new(local_base: impl Into<String>) -> Self {
        let mut local_base = local_base.into();
        if !local_base.ends_with('/') {
            local_base.push('/');
        }
        Self { local_base }
    }

    /// Whether `scheme` is an SKG-IF identifier scheme (case-insensitive).
    pub fn is_allowed_scheme(scheme: &str) -> bool {
        let scheme = scheme.trim().to_ascii_lowercase();
        ALLOWED_SCHEMES.contains(&scheme.as_str())
    }

    pub fn resolve(&self, scheme: &str, value: &str) -> ResolvedIdentifier {
        let raw_scheme = scheme.trim();
        let key = raw_scheme.to_ascii_lowercase();
        let value = value.trim();

        let known = Rule::for_scheme(&key).is_some() || ALLOWED_SCHEMES.contains(&key.as_str());
        let scheme = if known { key.clone() } else { raw_scheme.to_string() };

        let (value, uri) = match Rule::for_scheme(&key) {
            Some(rule) => {
                let bare = rule.normalize(value);
                if rule.is_valid(&bare) {
                    let uri = rule.uri(&bare);
                    (bare, Some(uri))
                } else {
                    (value.to_string(), None)
                }
            }
            None => (value.to_string(), None),
        };

        let local_uri = match uri {
            Some(_) => None,
            None => Some(format!(
                "{}identifier/{}/{}",
                self.local_base,
                encode(&scheme),
                encode(&value)
            )),
        };

        ResolvedIdentifier {
            scheme,
            value,
            uri,
            local_uri,
        }
    }

    /// An identifier whose value is already a dereferenceable URI (e.g. a
    /// thesaurus concept), recorded under a project-specific scheme name.
    pub fn external(&self, scheme: &str, uri: &str) -> ResolvedIdentifier {
        ResolvedIdentifier {
            scheme: scheme.to_string(),
            value: uri.to_string(),
            uri: Some(uri.to_string()),
            local_uri: None,
        }
    }
}
