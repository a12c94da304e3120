//! Domain-parking detection: provider hostnames and page-content signatures.

use crate::types::LinkStatus;
use crate::validate::matches_domain_list;

/// Registrars, marketplaces and parking services. Matched as substrings.
pub const PARKING_PROVIDERS: &[&str] = &[
    "hugedomains.com",
    "godaddy.com",
    "namecheap.com",
    "namesilo.com",
    "porkbun.com",
    "dynadot.com",
    "epik.com",
    "sedo.com",
    "dan.com",
    "afternic.com",
    "domainmarket.com",
    "uniregistry.com",
    "squadhelp.com",
    "brandbucket.com",
    "undeveloped.com",
    "atom.com",
    "bodis.com",
    "parkingcrew.net",
    "parkingcrew.com",
    "above.com",
    "sedoparking.com",
];

/// Hosting platforms never classified as parked.
pub const PARKING_EXEMPTIONS: &[&str] = &[
    "github.io",
    "github.com",
    "githubusercontent.com",
    "gitlab.io",
    "gitlab.com",
    "pages.dev",
    "netlify.app",
    "vercel.app",
    "herokuapp.com",
];

/// Any single match marks the page parked.
pub const STRONG_INDICATORS: &[&str] = &[
    "sedo domain parking",
    "this domain is parked",
    "domain is parked",
    "parked by",
    "parked domain",
    "parkingcrew",
    "bodis.com",
    "hugedomains.com/domain",
    "afternic.com/forsale",
    "this domain name is for sale",
    "the domain name is for sale",
    "buy this domain name",
    "domain has expired",
    "this domain has been registered",
];

/// Only counted on small pages; several must match.
pub const WEAK_INDICATORS: &[&str] = &[
    "domain for sale",
    "buy this domain",
    "domain is for sale",
    "this domain may be for sale",
    "make an offer",
    "make offer",
    "expired domain",
    "register this domain",
    "purchase this domain",
    "acquire this domain",
    "coming soon",
    "under construction",
    "inquire about this domain",
    "interested in this domain",
    "domain may be for sale",
];

pub fn is_parking_exempt(host: &str) -> bool {
    matches_domain_list(host, PARKING_EXEMPTIONS)
}

/// Host belongs to a parking provider and is not an exempt platform.
pub fn is_parking_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    !is_parking_exempt(&host) && PARKING_PROVIDERS.iter().any(|p| host.contains(p))
}

#[derive(Debug, Clone, Copy)]
pub struct ContentThresholds {
    pub substantial_bytes: usize,
    pub weak_matches: usize,
}

/// Classifies a successfully fetched page body.
pub fn classify_content(body: &str, thresholds: ContentThresholds) -> LinkStatus {
    let lower = body.to_lowercase();

    if STRONG_INDICATORS.iter().any(|i| lower.contains(i)) {
        return LinkStatus::Parked;
    }
    if body.len() > thresholds.substantial_bytes {
        return LinkStatus::Live;
    }

    let weak = WEAK_INDICATORS.iter().filter(|i| lower.contains(*i)).count();
    if weak >= thresholds.weak_matches {
        LinkStatus::Parked
    } else {
        LinkStatus::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: ContentThresholds = ContentThresholds {
        substantial_bytes: 30_000,
        weak_matches: 3,
    };

    #[test]
    fn test_provider_hosts() {
        assert!(is_parking_host("sedo.com"));
        assert!(is_parking_host("www.SEDO.com"));
        assert!(is_parking_host("mysite.sedoparking.com"));
        assert!(!is_parking_host("example.com"));
        // exempt platforms win over substring hits
        assert!(!is_parking_host("dan.com.github.io"));
        assert!(is_parking_exempt("someone.netlify.app"));
    }

    #[test]
    fn test_strong_indicator_wins_even_on_large_pages() {
        let mut page = "x".repeat(50_000);
        page.push_str("This Domain Is Parked free of charge");
        assert_eq!(classify_content(&page, DEFAULTS), LinkStatus::Parked);
    }

    #[test]
    fn test_large_pages_skip_weak_indicators() {
        let mut page = "Coming soon. Make an offer. Under construction. ".to_string();
        page.push_str(&"<p>real content</p>".repeat(2_000));
        assert_eq!(classify_content(&page, DEFAULTS), LinkStatus::Live);
    }

    #[test]
    fn test_weak_indicator_threshold() {
        let two = "<h1>Coming soon</h1><p>Under construction</p>";
        assert_eq!(classify_content(two, DEFAULTS), LinkStatus::Live);

        let three = "<h1>Coming soon</h1><p>Under construction</p><a>Make an offer</a>";
        assert_eq!(classify_content(three, DEFAULTS), LinkStatus::Parked);

        let stricter = ContentThresholds {
            weak_matches: 4,
            ..DEFAULTS
        };
        assert_eq!(classify_content(three, stricter), LinkStatus::Live);
    }
}
