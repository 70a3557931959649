//! A1 notation helpers

/// Column letters for a 0-based column index (0 → `A`, 26 → `AA`)
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 reference for a 0-based column and 1-based row
pub fn cell_ref(column: usize, row: u32) -> String {
    format!("{}{}", column_letters(column), row)
}

/// Parse a single A1 cell (e.g. `F1`) into a 0-based column and 1-based row
pub fn parse_cell(cell: &str) -> Option<(usize, u32)> {
    let cell = cell.trim();
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut column = 0usize;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        column = column.checked_mul(26)?.checked_add(digit)?;
    }

    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((column - 1, row))
}

/// Quote a sheet title for use in a range (`'My sheet'!A1`)
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
