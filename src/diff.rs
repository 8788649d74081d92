//! Word-level comparison between machine output and the post-edited text.

/// One token of a word diff, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Delete(String),
    Insert(String),
}

/// Align the whitespace-separated words of `original` and `edited`.
///
/// Uses a longest-common-subsequence table; inside a changed run the deleted
/// words come before the inserted ones.
pub fn word_diff(original: &str, edited: &str) -> Vec<DiffOp> {
    let a: Vec<&str> = original.split_whitespace().collect();
    let b: Vec<&str> = edited.split_whitespace().collect();

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        if i < a.len() && j < b.len() && a[i] == b[j] {
            ops.push(DiffOp::Equal(a[i].to_string()));
            i += 1;
            j += 1;
        } else if i < a.len() && (j == b.len() || lcs[i + 1][j] >= lcs[i][j + 1]) {
            ops.push(DiffOp::Delete(a[i].to_string()));
            i += 1;
        } else {
            ops.push(DiffOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    ops
}

/// `(insertions, deletions)` counted in words.
pub fn count_edits(original: &str, edited: &str) -> (usize, usize) {
    word_diff(original, edited)
        .iter()
        .fold((0, 0), |(ins, del), op| match op {
            DiffOp::Insert(_) => (ins + 1, del),
            DiffOp::Delete(_) => (ins, del + 1),
            DiffOp::Equal(_) => (ins, del),
        })
}
