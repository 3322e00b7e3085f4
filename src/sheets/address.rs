//! A1-style cell addressing.

use std::fmt;

/// Sheet row of record index 0: row 1 holds the headers.
pub const DATA_ROW_OFFSET: usize = 2;

/// A spreadsheet column, stored as a zero-based index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column(u16);

impl Column {
    /// Column from a zero-based index (`0` is `A`).
    #[must_use]
    pub const fn from_index(index: u16) -> Self {
        Self(index)
    }

    /// Zero-based index, which is also the position in a row read from column `A`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Column letters.
    #[must_use]
    pub fn letters(self) -> String {
        let mut n = u32::from(self.0) + 1;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
            n = (n - 1) / 26;
        }
        out.iter().rev().collect()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

/// Address of a single cell, e.g. `Responses!G5`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Sheet (tab) name.
    pub sheet: String,
    /// Column.
    pub column: Column,
    /// 1-based row number.
    pub row: usize,
}

impl CellAddress {
    /// Create an address from explicit parts.
    #[must_use]
    pub fn new(sheet: impl Into<String>, column: Column, row: usize) -> Self {
        Self {
            sheet: sheet.into(),
            column,
            row,
        }
    }

    /// Address of `column` for the record at zero-based `record_index`.
    #[must_use]
    pub fn for_record(sheet: impl Into<String>, column: Column, record_index: usize) -> Self {
        Self::new(sheet, column, record_index + DATA_ROW_OFFSET)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}{}", self.sheet, self.column, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(Column::from_index(0).letters(), "A");
        assert_eq!(Column::from_index(14).letters(), "O");
        assert_eq!(Column::from_index(25).letters(), "Z");
        assert_eq!(Column::from_index(26).letters(), "AA");
        assert_eq!(Column::from_index(27).letters(), "AB");
    }

    #[test]
    fn test_record_address_offset() {
        let address = CellAddress::for_record("Responses", Column::from_index(8), 0);
        assert_eq!(address.to_string(), "Responses!I2");

        let address = CellAddress::for_record("Responses", Column::from_index(6), 41);
        assert_eq!(address.row, 43);
        assert_eq!(address.to_string(), "Responses!G43");
    }
}
