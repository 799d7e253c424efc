//! Fuzz testing for the header and configuration parsers.
//!
//! Every parser here reads client- or operator-supplied text, so it must:
//!
//! - Never panic on any input
//! - Keep Accept entries sorted by quality
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the negotiation fuzz target
//! cargo +nightly fuzz run fuzz_negotiation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_negotiation -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `AcceptList::parse`: Accept header parsing and ranking
//! - `MediaTypePattern::parse`: Renderer pattern validation
//! - `RendererRegistry::negotiate`: Matching arbitrary headers against the defaults
//! - `IpRanges::new` / `parse_address`: IP range entries and client addresses

#![no_main]

use libfuzzer_sys::fuzz_target;
use webguard::middleware::{DEFAULT_BINDINGS, IpRanges, parse_address};
use webguard::renderer::RendererRegistry;
use webguard::{AcceptList, MediaTypePattern};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Ranked order must hold for whatever was readable
    let accept = AcceptList::parse([s]);
    for pair in accept.entries().windows(2) {
        assert!(pair[0].quality >= pair[1].quality);
    }

    if let Ok(pattern) = MediaTypePattern::parse(s) {
        let _ = pattern.to_string();
        let _ = pattern.specificity();
    }

    let registry = DEFAULT_BINDINGS
        .iter()
        .fold(RendererRegistry::new(), |registry, (pattern, key)| {
            registry.register(pattern, *key).expect("default bindings are valid")
        });
    let _ = registry.negotiate(&accept);

    let entries: Vec<&str> = s.split(',').collect();
    if let Ok(ranges) = IpRanges::new(&entries) {
        if let Some(ip) = parse_address(s) {
            let _ = ranges.contains(ip);
        }
    }
});
