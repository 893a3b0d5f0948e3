/// A zero-based (row, column) cell position.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RowCol(pub usize, pub usize);

impl RowCol {
    pub fn new(row: usize, col: usize) -> Self {
        Self(row, col)
    }

    /// The same row, `n` columns to the right.
    pub fn offset_col(&self, n: usize) -> Self {
        Self(self.0, self.1 + n)
    }

    /// The cell in A1 notation, e.g. `(4, 6)` is `G5`.
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.1), self.0 + 1)
    }
}

/// Converts a zero-based column index into spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
