//! Coarse-to-fine skip search over a sorted file.

use std::cmp::Ordering;
use std::io::{Read, Seek};

use log::trace;

use crate::error::Result;
use crate::search::line_file::LineFile;
use crate::search::{LineKey, LineMatch, compare_line};

/// Locate the line whose key equals `key`, skipping forward `step` bytes at a
/// time.
///
/// Each round walks from the last line known to sort below `key` until a line
/// sorts above it, then the step is divided by 10. When the step reaches zero
/// the remaining interval is scanned line by line.
pub fn skip_search<K, R>(
    file: &mut LineFile<R>,
    key: &K,
    delimiter: char,
    step: u64,
) -> Result<Option<LineMatch>>
where
    K: LineKey,
    R: Read + Seek,
{
    let Some(mut lo) = file.line_at(0)? else {
        return Ok(None);
    };
    match compare_line(&lo.line, delimiter, key)? {
        Ordering::Equal => return Ok(Some(lo)),
        Ordering::Greater => return Ok(None),
        Ordering::Less => {}
    }

    let Some(mut hi) = file.last_line()? else {
        return Ok(None);
    };
    match compare_line(&hi.line, delimiter, key)? {
        Ordering::Equal => return Ok(Some(hi)),
        Ordering::Less => return Ok(None),
        Ordering::Greater => {}
    }

    let mut step = step.max(1);
    while step >= 1 {
        trace!("skip round with step {step} between {} and {}", lo.start, hi.start);
        loop {
            let target = lo.start + step;
            if target >= hi.start {
                break;
            }
            let Some(probe) = file.next_line_at_or_after(target)? else {
                break;
            };
            if probe.start >= hi.start {
                break;
            }
            match compare_line(&probe.line, delimiter, key)? {
                Ordering::Equal => return Ok(Some(probe)),
                Ordering::Less => lo = probe,
                Ordering::Greater => {
                    hi = probe;
                    break;
                }
            }
        }
        step /= 10;
    }

    let mut position = lo.end;
    while position < hi.start {
        let Some(line) = file.line_at(position)? else {
            break;
        };
        match compare_line(&line.line, delimiter, key)? {
            Ordering::Equal => return Ok(Some(line)),
            Ordering::Greater => return Ok(None),
            Ordering::Less => position = line.end,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn stats_file(count: u64) -> LineFile<Cursor<Vec<u8>>> {
        let text: String = (1..=count).map(|d| format!("{d},D{d},{}\n", d * 3)).collect();
        LineFile::new(Cursor::new(text.into_bytes())).unwrap()
    }

    #[test]
    fn test_finds_every_doc_id_with_various_steps() {
        let mut file = stats_file(500);
        for step in [1, 7, 64, 10_000] {
            for doc_id in 1..=500u64 {
                let hit = skip_search(&mut file, &doc_id, ',', step).unwrap().unwrap();
                assert_eq!(hit.line, format!("{doc_id},D{doc_id},{}", doc_id * 3));
            }
        }
    }

    #[test]
    fn test_keys_outside_the_range() {
        let mut file = stats_file(50);
        assert!(skip_search(&mut file, &0u64, ',', 100).unwrap().is_none());
        assert!(skip_search(&mut file, &51u64, ',', 100).unwrap().is_none());
    }

    #[test]
    fn test_keys_in_gaps() {
        let text = "ant;1;0\ncat;1;5\ndog;2;9\nemu;1;20\n";
        let mut file = LineFile::new(Cursor::new(text.as_bytes().to_vec())).unwrap();
        for token in ["bee", "cow", "eel"] {
            assert!(skip_search(&mut file, &token.to_string(), ';', 3).unwrap().is_none());
        }
        let hit = skip_search(&mut file, &"dog".to_string(), ';', 3).unwrap().unwrap();
        assert_eq!((hit.start, hit.end), (16, 24));
    }

    #[test]
    fn test_zero_step_is_treated_as_one() {
        let mut file = stats_file(20);
        let hit = skip_search(&mut file, &13u64, ',', 0).unwrap().unwrap();
        assert!(hit.line.starts_with("13,"));
    }
}
