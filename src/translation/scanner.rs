/// Lexical region a span of SQL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Region {
    Code,
    Quoted,
    Comment,
}

/// Splits SQL text into contiguous `(start, end, region)` spans.
///
/// Only `Region::Code` spans may contain placeholders. Nested block comments and
/// Postgres dollar-quoted bodies (`$tag$ ... $tag$`) are recognised.
pub(super) struct Scanner<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.sql.as_bytes()
    }

    fn starts_with(&self, at: usize, pat: &[u8]) -> bool {
        self.bytes()[at..].starts_with(pat)
    }

    /// Start of the next non-code construct at or after `from`, if any.
    fn next_boundary(&self, from: usize) -> Option<usize> {
        let bytes = self.bytes();
        (from..bytes.len()).find(|&at| match bytes[at] {
            b'\'' | b'"' => true,
            b'-' => self.starts_with(at, b"--"),
            b'/' => self.starts_with(at, b"/*"),
            b'$' => dollar_tag(bytes, at).is_some(),
            _ => false,
        })
    }

    /// End (exclusive) of the quoted/comment construct starting at `at`.
    fn construct_end(&self, at: usize) -> (usize, Region) {
        let bytes = self.bytes();
        match bytes[at] {
            quote @ (b'\'' | b'"') => {
                let mut idx = at + 1;
                while idx < bytes.len() {
                    if bytes[idx] == quote {
                        // doubled quote is an escaped quote
                        if bytes.get(idx + 1) == Some(&quote) {
                            idx += 2;
                            continue;
                        }
                        return (idx + 1, Region::Quoted);
                    }
                    idx += 1;
                }
                (bytes.len(), Region::Quoted)
            }
            b'-' => {
                let end = bytes[at..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |off| at + off + 1);
                (end, Region::Comment)
            }
            b'/' => {
                let mut depth = 0_u32;
                let mut idx = at;
                while idx < bytes.len() {
                    if self.starts_with(idx, b"/*") {
                        depth += 1;
                        idx += 2;
                    } else if self.starts_with(idx, b"*/") {
                        depth -= 1;
                        idx += 2;
                        if depth == 0 {
                            return (idx, Region::Comment);
                        }
                    } else {
                        idx += 1;
                    }
                }
                (bytes.len(), Region::Comment)
            }
            _ => {
                let tag_len = dollar_tag(bytes, at).unwrap_or(1);
                let tag = &bytes[at..at + tag_len];
                let body_start = at + tag_len;
                let end = bytes[body_start..]
                    .windows(tag.len())
                    .position(|w| w == tag)
                    .map_or(bytes.len(), |off| body_start + off + tag.len());
                (end, Region::Quoted)
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = (usize, usize, Region);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.bytes().len();
        if self.pos >= len {
            return None;
        }
        let start = self.pos;
        let boundary = self.next_boundary(start);
        if boundary == Some(start) {
            let (end, region) = self.construct_end(start);
            self.pos = end;
            return Some((start, end, region));
        }
        let end = boundary.unwrap_or(len);
        self.pos = end;
        Some((start, end, Region::Code))
    }
}

/// Length of a dollar-quote opening tag (`$$` or `$name$`) starting at `at`.
fn dollar_tag(bytes: &[u8], at: usize) -> Option<usize> {
    let mut idx = at + 1;
    // `$1` is a placeholder, never a tag: tags cannot start with a digit
    if bytes.get(idx).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while idx < bytes.len() {
        match bytes[idx] {
            b'$' => return Some(idx + 1 - at),
            b if b.is_ascii_alphanumeric() || b == b'_' => idx += 1,
            _ => return None,
        }
    }
    None
}
