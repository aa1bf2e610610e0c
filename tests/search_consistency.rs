//! Ternary and skip search agree with a full scan of the file.

use std::fs;

use postline::search::{LineFile, line_key, skip_search, ternary_search};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn scan(path: &std::path::Path, key: &str) -> Option<u64> {
    let text = fs::read_to_string(path).unwrap();
    let mut offset = 0u64;
    for line in text.split_inclusive('\n') {
        if line.trim_end().split(';').next() == Some(key) {
            return Some(offset);
        }
        offset += line.len() as u64;
    }
    None
}

#[test]
fn test_token_lookups_match_full_scan() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lexicon.txt");
    let mut rng = StdRng::seed_from_u64(7);

    let mut tokens: Vec<String> = (0..600)
        .map(|_| {
            let len = rng.random_range(1..12);
            (0..len)
                .map(|_| (b'a' + rng.random_range(0..26)) as char)
                .collect()
        })
        .collect();
    tokens.sort();
    tokens.dedup();
    let text: String = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| format!("{token};{};{}\n", i % 9 + 1, i * 17))
        .collect();
    fs::write(&path, text).unwrap();

    let mut file = LineFile::open(&path).unwrap();
    for token in &tokens {
        let expected = scan(&path, token);
        let key = token.clone();
        let len = file.len();
        let ternary = ternary_search(&mut file, &key, ';', 0, len).unwrap();
        assert_eq!(ternary.map(|hit| hit.start), expected, "ternary {token}");
        for step in [1, 64, 10_000] {
            let skip = skip_search(&mut file, &key, ';', step).unwrap();
            assert_eq!(skip.map(|hit| hit.start), expected, "skip({step}) {token}");
        }
    }

    // Keys in gaps and outside the key range.
    for missing in ["", "0", "zzzzzzzzzzzzz", "aaaaaaaaaaaaaaaaaaaa"] {
        if tokens.iter().any(|token| token == missing) {
            continue;
        }
        let key = missing.to_string();
        let len = file.len();
        assert!(ternary_search(&mut file, &key, ';', 0, len).unwrap().is_none());
        assert!(skip_search(&mut file, &key, ';', 100).unwrap().is_none());
    }
}

#[test]
fn test_doc_id_lookups_use_numeric_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("stats.txt");
    let mut rng = StdRng::seed_from_u64(11);

    let mut doc_id = 0u64;
    let mut ids = Vec::new();
    let mut text = String::new();
    for _ in 0..1500 {
        doc_id += rng.random_range(1..4);
        ids.push(doc_id);
        text.push_str(&format!("{doc_id},EXT-{doc_id},{}\n", doc_id % 13));
    }
    fs::write(&path, text).unwrap();

    let mut file = LineFile::open(&path).unwrap();
    let len = file.len();
    for &id in ids.iter().step_by(7).chain(ids.last()) {
        let hit = ternary_search(&mut file, &id, ',', 0, len).unwrap().unwrap();
        assert_eq!(line_key::<u64>(&hit.line, ',').unwrap(), id);
        let hit = skip_search(&mut file, &id, ',', 500).unwrap().unwrap();
        assert_eq!(line_key::<u64>(&hit.line, ',').unwrap(), id);
    }

    let absent: Vec<u64> = (1..doc_id).filter(|id| ids.binary_search(id).is_err()).take(50).collect();
    for id in absent.into_iter().chain([doc_id + 1, u64::MAX]) {
        assert!(ternary_search(&mut file, &id, ',', 0, len).unwrap().is_none(), "{id}");
        assert!(skip_search(&mut file, &id, ',', 500).unwrap().is_none(), "{id}");
    }
}

#[test]
fn test_next_line_at_or_after_never_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lines.txt");
    fs::write(&path, "alpha\nbeta\ngamma\n").unwrap();

    let mut file = LineFile::open(&path).unwrap();
    let first = file.next_line_at_or_after(0).unwrap().unwrap();
    assert_eq!((first.start, first.line.as_str()), (0, "alpha"));
    let snapped = file.next_line_at_or_after(2).unwrap().unwrap();
    assert_eq!((snapped.start, snapped.line.as_str()), (6, "beta"));
    for position in [14, 17, 1000] {
        let last = file.next_line_at_or_after(position).unwrap().unwrap();
        assert_eq!(last.line, "gamma");
    }
}
