//! Line-oriented unified diff used to report golden mismatches.

const CONTEXT: usize = 3;

/// A non-empty difference between two texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff {
    /// 1-based line of the first difference.
    pub first_line: usize,
    /// Unified diff body (`--- want`, `+++ got`, `@@` hunks).
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

/// Compares `want` and `got` line by line, byte-exact including line endings.
///
/// Returns `None` when the texts are identical.
pub fn unified_diff(want: &str, got: &str) -> Option<LineDiff> {
    if want == got {
        return None;
    }
    let a: Vec<&str> = want.split_inclusive('\n').collect();
    let b: Vec<&str> = got.split_inclusive('\n').collect();
    let ops = line_ops(&a, &b);

    // Position in `a` and `b` before each op.
    let mut positions = Vec::with_capacity(ops.len() + 1);
    let (mut ai, mut bi) = (0usize, 0usize);
    for op in &ops {
        positions.push((ai, bi));
        match op {
            Op::Equal(_) => {
                ai += 1;
                bi += 1;
            }
            Op::Delete(_) => ai += 1,
            Op::Insert(_) => bi += 1,
        }
    }
    positions.push((ai, bi));

    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, Op::Equal(_)))
        .map(|(k, _)| k)
        .collect();
    let first = *changes.first()?;
    let first_line = match ops[first] {
        Op::Insert(_) => positions[first].1 + 1,
        _ => positions[first].0 + 1,
    };

    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for &k in &changes {
        let start = k.saturating_sub(CONTEXT);
        let end = (k + 1 + CONTEXT).min(ops.len());
        match hunks.last_mut() {
            Some((_, e)) if start <= *e => *e = end,
            _ => hunks.push((start, end)),
        }
    }

    let mut text = String::from("--- want\n+++ got\n");
    for (start, end) in hunks {
        let (a0, b0) = positions[start];
        let (a1, b1) = positions[end];
        text.push_str(&format!(
            "@@ -{} +{} @@\n",
            range(a0, a1 - a0),
            range(b0, b1 - b0)
        ));
        for op in &ops[start..end] {
            let (marker, line) = match *op {
                Op::Equal(i) => (' ', a[i]),
                Op::Delete(i) => ('-', a[i]),
                Op::Insert(j) => ('+', b[j]),
            };
            text.push(marker);
            text.push_str(line.strip_suffix('\n').unwrap_or(line));
            text.push('\n');
            if !line.ends_with('\n') {
                text.push_str("\\ No newline at end of file\n");
            }
        }
    }

    Some(LineDiff { first_line, text })
}

fn range(start: usize, len: usize) -> String {
    if len == 1 {
        format!("{}", start + 1)
    } else if len == 0 {
        format!("{start},0")
    } else {
        format!("{},{}", start + 1, len)
    }
}

/// Largest LCS table (cells) built for the changed middle section. Beyond
/// this the middle is reported as a block delete followed by a block insert.
const MAX_LCS_CELLS: usize = 4_000_000;

fn line_ops(a: &[&str], b: &[&str]) -> Vec<Op> {
    let (n, m) = (a.len(), b.len());
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = Vec::with_capacity(n.max(m));
    ops.extend((0..prefix).map(Op::Equal));
    middle_ops(&a[prefix..n - suffix], &b[prefix..m - suffix], prefix, &mut ops);
    ops.extend((n - suffix..n).map(Op::Equal));
    ops
}

/// Appends ops for `a` against `b`; indices are shifted by `offset`.
fn middle_ops(a: &[&str], b: &[&str], offset: usize, ops: &mut Vec<Op>) {
    let (n, m) = (a.len(), b.len());
    if (n + 1).saturating_mul(m + 1) > MAX_LCS_CELLS {
        ops.extend((0..n).map(|i| Op::Delete(offset + i)));
        ops.extend((0..m).map(|j| Op::Insert(offset + j)));
        return;
    }

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Equal(offset + i));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Delete(offset + i));
            i += 1;
        } else {
            ops.push(Op::Insert(offset + j));
            j += 1;
        }
    }
    ops.extend((i..n).map(|i| Op::Delete(offset + i)));
    ops.extend((j..m).map(|j| Op::Insert(offset + j)));
}
