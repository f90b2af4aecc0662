/// Lexical position of the normalizer while walking SQL text.
#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    Template,
    LineComment,
    BlockComment(u32),
}

/// Length of the quoted run starting at `start` (which holds the opening quote), including
/// both quotes. Backslash escapes and doubled quotes stay inside the run.
pub(super) fn scan_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' if quote != b'`' => idx += 2,
            b if b == quote => {
                if bytes.get(idx + 1) == Some(&quote) {
                    idx += 2;
                } else {
                    return idx + 1 - start;
                }
            }
            _ => idx += 1,
        }
    }
    bytes.len() - start
}
