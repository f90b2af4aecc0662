pub(super) fn starts_with_at(bytes: &[u8], idx: usize, token: &[u8]) -> bool {
    !token.is_empty() && bytes.get(idx..).is_some_and(|rest| rest.starts_with(token))
}

pub(super) fn is_quote(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'`')
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'#')
        || (bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-'))
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}
