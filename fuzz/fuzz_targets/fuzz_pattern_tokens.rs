#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lexkey::index::{IndexOptions, Key, ScanKey, Strategy};
use lexkey::query::{Recheck, like_to_regex};
use lexkey::utils::{like_tokens, regex_tokens};

#[derive(Debug, Arbitrary)]
struct Input {
    pattern: String,
    value: String,
    regex: bool,
}

fuzz_target!(|input: Input| {
    let recheck = Recheck::new(&Default::default(), &IndexOptions::default());
    let value = Key::new(&input.value);

    // Whenever the value matches, every extracted token must occur in it
    let (tokens, strategy) = if input.regex {
        (regex_tokens(&input.pattern), Strategy::Regex)
    } else {
        let _ = like_to_regex(&input.pattern);
        (like_tokens(&input.pattern), Strategy::Like)
    };
    let key = ScanKey::new(strategy, input.pattern.as_str());
    if let Ok(true) = recheck.matches(Some(&value), &key) {
        let hits = tokens.iter().filter(|t| input.value.contains(t.as_str())).count();
        match strategy {
            Strategy::Like => assert_eq!(hits, tokens.len(), "{:?}", input),
            _ => assert!(tokens.is_empty() || hits > 0, "{:?}", input),
        }
    }
});
