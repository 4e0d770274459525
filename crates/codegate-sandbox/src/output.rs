//! Bounded output capture

use tokio::io::{AsyncRead, AsyncReadExt};

/// Marker appended when captured output was cut
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// Bytes read from one stream, up to a cap
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Captured {
    pub(crate) bytes: Vec<u8>,
    pub(crate) truncated: bool,
}

/// Drain `reader` to EOF, keeping at most `cap` bytes
///
/// Bytes past the cap are read and discarded so the child never blocks on a
/// full pipe.
pub(crate) async fn read_capped<R>(reader: Option<R>, cap: usize) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let room = cap.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
    captured
}

/// Render stdout then stderr as one diagnostic string of at most `cap`
/// bytes plus the truncation marker
pub(crate) fn render_diagnostics(stdout: &Captured, stderr: &Captured, cap: usize) -> String {
    let out = String::from_utf8_lossy(&stdout.bytes);
    let err = String::from_utf8_lossy(&stderr.bytes);

    let mut text = match (out.trim_end().is_empty(), err.trim_end().is_empty()) {
        (true, true) => String::new(),
        (false, true) => out.into_owned(),
        (true, false) => err.into_owned(),
        (false, false) => {
            let mut joined = out.into_owned();
            if !joined.ends_with('\n') {
                joined.push('\n');
            }
            joined.push_str(&err);
            joined
        }
    };

    let mut truncated = stdout.truncated || stderr.truncated;
    if text.len() > cap {
        let mut end = cap;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        truncated = true;
    }
    if truncated {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn captured(text: &str) -> Captured {
        Captured {
            bytes: text.as_bytes().to_vec(),
            truncated: false,
        }
    }

    #[tokio::test]
    async fn reader_keeps_prefix_and_flags_overflow() {
        let data: &[u8] = b"abcdefghij";
        let got = read_capped(Some(data), 4).await;
        assert_eq!(got.bytes, b"abcd");
        assert!(got.truncated);

        let got = read_capped(Some(data), 64).await;
        assert_eq!(got.bytes, data);
        assert!(!got.truncated);
    }

    #[tokio::test]
    async fn missing_stream_is_empty() {
        let got = read_capped::<&[u8]>(None, 16).await;
        assert_eq!(got, Captured::default());
    }

    #[test]
    fn stdout_precedes_stderr() {
        let text = render_diagnostics(&captured("out"), &captured("err\n"), 1024);
        assert_eq!(text, "out\nerr\n");
    }

    #[test]
    fn single_stream_passes_through() {
        assert_eq!(render_diagnostics(&captured(""), &captured("boom"), 1024), "boom");
        assert_eq!(render_diagnostics(&captured("hi\n"), &captured(""), 1024), "hi\n");
    }

    #[test]
    fn cut_respects_char_boundaries() {
        let text = render_diagnostics(&captured("ééé"), &captured(""), 3);
        assert_eq!(text, format!("é\n{TRUNCATION_MARKER}"));
    }

    #[test]
    fn upstream_truncation_is_marked() {
        let stderr = Captured {
            bytes: b"partial".to_vec(),
            truncated: true,
        };
        let text = render_diagnostics(&captured(""), &stderr, 1024);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert!(text.starts_with("partial"));
    }
}
