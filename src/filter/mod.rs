//! Bot & abuse filter.
//!
//! Classifies a raw client descriptor (User-Agent) as automated traffic by
//! case-insensitive substring matching against a fixed signature table.
//! Pure and deterministic, no I/O. Sophisticated bots that forge a browser
//! descriptor pass through; this is a heuristic gate, not a security
//! boundary. Callers must still answer bots with a success response so the
//! filtering behaviour is not observable from outside.

/// Automation signatures, all lowercase.
///
/// Three families: generic crawler tokens, HTTP client libraries, and
/// headless-fetch tooling. Extend the table here rather than adding string
/// checks at call sites.
const BOT_SIGNATURES: &[&str] = &[
    // generic crawlers
    "bot",
    "spider",
    "crawler",
    "slurp",
    "facebookexternalhit",
    "embedly",
    "pingdom",
    "uptimerobot",
    // HTTP client libraries
    "curl",
    "wget",
    "python-requests",
    "python-urllib",
    "go-http-client",
    "okhttp",
    "java/",
    "libwww-perl",
    "httpclient",
    "axios",
    "node-fetch",
    "scrapy",
    // headless browsers / fetch tooling
    "headlesschrome",
    "phantomjs",
    "puppeteer",
    "playwright",
    "selenium",
];

/// Returns `true` when the descriptor matches a known automation signature.
///
/// An absent or empty descriptor is not classified as a bot: plenty of
/// privacy tooling strips the header, and a false positive here silently
/// drops a real visitor's event.
pub fn classify(client_descriptor: &str) -> bool {
    if client_descriptor.is_empty() {
        return false;
    }

    let lowered = client_descriptor.to_lowercase();
    BOT_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}
