use crate::data::{ChunkTask, Headers};
use crate::error::{FetchError, Result};

/// Returns `true` for 2xx status codes.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Returns `true` if the headers advertise byte-range support.
///
/// # Examples
///
/// ```
/// use hauler_fetch::Headers;
/// use hauler_fetch::core::accepts_ranges;
///
/// let headers: Headers = [("Accept-Ranges", "bytes")].into_iter().collect();
/// assert!(accepts_ranges(&headers));
/// assert!(!accepts_ranges(&Headers::new()));
/// ```
pub fn accepts_ranges(headers: &Headers) -> bool {
    headers.get("accept-ranges").is_some_and(|value| {
        value
            .split(',')
            .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"))
    })
}

/// Check the status of a response to a ranged request for `task`.
///
/// `206 Partial Content` is always accepted. `200 OK` means the server
/// ignored the range and sent the whole resource, which is only usable when
/// the task covers all `size` bytes.
pub fn check_ranged_status(status: u16, task: &ChunkTask, size: u64) -> Result<()> {
    match status {
        206 => Ok(()),
        200 if task.start == 0 && task.end + 1 == size => Ok(()),
        actual => Err(FetchError::UnexpectedStatus {
            expected: 206,
            actual,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> Headers {
        [("accept-ranges", value)].into_iter().collect()
    }

    #[test]
    fn test_is_success() {
        assert!(is_success(200));
        assert!(is_success(206));
        assert!(is_success(299));
        assert!(!is_success(199));
        assert!(!is_success(304));
        assert!(!is_success(404));
        assert!(!is_success(500));
    }

    #[test]
    fn test_accepts_ranges_variants() {
        assert!(accepts_ranges(&headers("bytes")));
        assert!(accepts_ranges(&headers("Bytes")));
        assert!(accepts_ranges(&headers(" bytes ")));
        assert!(accepts_ranges(&headers("none, bytes")));
        assert!(!accepts_ranges(&headers("none")));
        assert!(!accepts_ranges(&headers("")));
    }

    #[test]
    fn test_ranged_status_partial_content() {
        let task = ChunkTask::new(10, 19);
        assert!(check_ranged_status(206, &task, 100).is_ok());
    }

    #[test]
    fn test_ranged_status_full_body_only_for_whole_range() {
        assert!(check_ranged_status(200, &ChunkTask::new(0, 99), 100).is_ok());

        let err = check_ranged_status(200, &ChunkTask::new(0, 49), 100).unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnexpectedStatus {
                expected: 206,
                actual: 200
            }
        ));
    }

    #[test]
    fn test_ranged_status_errors() {
        let task = ChunkTask::new(0, 9);
        assert!(check_ranged_status(416, &task, 100).is_err());
        assert!(check_ranged_status(503, &task, 100).is_err());
    }
}
