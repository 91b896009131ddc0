use jobsh::{TokenKind, parse_command, tokenize, validate};
use proptest::prelude::*;

fn piece() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "ls", "-l", "wc", "a.txt", "|", "&", "&&", "<", ">", ">>", ";", " ", "\t",
    ])
}

fn line() -> impl Strategy<Value = String> {
    prop::collection::vec(piece(), 0..12).prop_map(|pieces| pieces.join(" "))
}

proptest! {
    #[test]
    fn separator_is_never_accepted(prefix in line(), suffix in line()) {
        let input = format!("{prefix};{suffix}");
        prop_assert!(!validate(&tokenize(&input)));
    }

    #[test]
    fn token_stream_ends_once_at_input_length(input in line()) {
        let tokens = tokenize(&input);
        let ends: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::End).collect();
        prop_assert_eq!(ends.len(), 1);
        prop_assert_eq!(tokens.last().map(|t| t.offset), Some(input.len()));
        prop_assert!(tokens.windows(2).all(|pair| pair[0].offset < pair[1].offset));
    }

    #[test]
    fn accepted_commands_start_with_a_name(input in line()) {
        if let Ok(parsed) = parse_command(&input) {
            prop_assert!(validate(&tokenize(&input)));
            let first = parsed.words().first().cloned().unwrap_or_default();
            prop_assert!(!matches!(first.as_str(), "|" | "&" | "&&" | "<" | ">" | ">>"));
            prop_assert!(parsed.words().iter().all(|word| !word.is_empty()));
        }
    }
}
