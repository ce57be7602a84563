/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    collections::HashMap,
    fmt::{Display, Write},
};

/// A 2-d table of right-aligned, comma separated columns.
///
/// Cells that were never filled render as blanks.
pub struct Table {
    // The number of columns is implicitly described by the number of entries in `header`.
    header: Box<[Box<dyn Display>]>,
    body: HashMap<(usize, usize), Box<dyn Display>>,
    nrows: usize,
}

impl Table {
    pub fn new<I>(header: I, nrows: usize) -> Self
    where
        I: IntoIterator,
        I::Item: Display + 'static,
    {
        fn as_dyn_display<T: Display + 'static>(x: T) -> Box<dyn Display> {
            Box::new(x)
        }

        let header: Box<[_]> = header.into_iter().map(as_dyn_display).collect();
        Self {
            header,
            body: HashMap::new(),
            nrows,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.header.len()
    }

    /// Insert `item` at `(row, col)`, returning `true` if a previous value was replaced.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    pub fn insert<T>(&mut self, item: T, row: usize, col: usize) -> bool
    where
        T: Display + 'static,
    {
        self.check_bounds(row, col);
        self.body.insert((row, col), Box::new(item)).is_some()
    }

    pub fn row(&mut self, row: usize) -> Row<'_> {
        self.check_bounds(row, 0);
        Row { table: self, row }
    }

    fn check_bounds(&self, row: usize, col: usize) {
        if row >= self.nrows() {
            panic!("row {} is out of bounds (max {})", row, self.nrows());
        }
        if col >= self.ncols() {
            panic!("col {} is out of bounds (max {})", col, self.ncols());
        }
    }
}

/// A cursor over a single row of a [`Table`].
pub struct Row<'a> {
    table: &'a mut Table,
    row: usize,
}

impl Row<'_> {
    /// Insert a value into the specified column of this row.
    pub fn insert<T>(&mut self, item: T, col: usize) -> bool
    where
        T: Display + 'static,
    {
        self.table.insert(item, self.row, col)
    }
}

// Measure how wide a value renders without allocating.
fn formatted_width<T>(x: &T) -> usize
where
    T: Display + ?Sized,
{
    struct Count(usize);

    impl Write for Count {
        fn write_str(&mut self, s: &str) -> std::fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    let mut buf = Count(0);
    match write!(&mut buf, "{}", x) {
        Ok(()) => buf.0,
        Err(_) => 0,
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const SEP: &str = ",   ";

        if self.ncols() == 0 {
            return Ok(());
        }

        let mut widths: Vec<usize> = self.header.iter().map(|h| formatted_width(h)).collect();
        for row in 0..self.nrows() {
            for (col, width) in widths.iter_mut().enumerate() {
                if let Some(v) = self.body.get(&(row, col)) {
                    *width = (*width).max(formatted_width(v))
                }
            }
        }

        let total_width: usize = widths.iter().sum::<usize>() + (widths.len() - 1) * SEP.len();

        // Cells are rendered into a buffer first so that width specifiers apply to the whole
        // cell rather than being interpreted by the cell's own `Display` implementation.
        let mut buf = String::new();
        let mut cell = |f: &mut std::fmt::Formatter<'_>,
                        value: Option<&dyn Display>,
                        width: usize,
                        last: bool|
         -> std::fmt::Result {
            buf.clear();
            if let Some(value) = value {
                write!(buf, "{}", value)?;
            }
            write!(f, "{:>width$}", buf)?;
            if last {
                writeln!(f)
            } else {
                write!(f, "{}", SEP)
            }
        };

        let last = self.ncols() - 1;
        for (col, (width, head)) in std::iter::zip(widths.iter(), self.header.iter()).enumerate() {
            cell(f, Some(&**head), *width, col == last)?;
        }

        writeln!(f, "{:=>total_width$}", "")?;

        for row in 0..self.nrows() {
            for (col, width) in widths.iter().enumerate() {
                let value = self.body.get(&(row, col)).map(|v| &**v);
                cell(f, value, *width, col == last)?;
            }
        }
        Ok(())
    }
}

////////////
// Banner //
////////////

/// A boxed one-line heading used to separate the phases of a run in console output.
pub struct Banner<'a>(&'a str);

impl<'a> Banner<'a> {
    pub fn new(message: &'a str) -> Self {
        Self(message)
    }
}

impl Display for Banner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = format!("# {} #", self.0);
        let len = st.len();
        writeln!(f, "{:#>len$}", "")?;
        writeln!(f, "{}", st)?;
        writeln!(f, "{:#>len$}", "")?;
        Ok(())
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner() {
        let s = Banner::new("Insert").to_string();
        let expected = "##########\n\
                        # Insert #\n\
                        ##########\n";
        assert_eq!(s, expected);

        let s = Banner::new("").to_string();
        let expected = "####\n\
                        #  #\n\
                        ####\n";
        assert_eq!(s, expected);
    }

    #[test]
    fn test_format() {
        // One column
        {
            let mut table = Table::new(["ef"], 3);
            table.insert(10, 0, 0);
            table.insert(200, 1, 0);
            table.insert("n/a", 2, 0);

            let s = table.to_string();
            let expected = r#"
 ef
===
 10
200
n/a
"#;
            assert_eq!(s, expected.strip_prefix('\n').unwrap());
        }

        // Two columns
        {
            let mut table = Table::new(["ef", "Recall"], 2);
            table.insert(10, 0, 0);
            table.insert(format!("{:.3}", 0.75), 0, 1);
            table.insert(800, 1, 0);
            table.insert(format!("{:.3}", 1.0), 1, 1);

            let s = table.to_string();
            let expected = r#"
 ef,   Recall
=============
 10,    0.750
800,    1.000
"#;
            assert_eq!(s, expected.strip_prefix('\n').unwrap());
        }
    }

    #[test]
    fn test_row_api() {
        let mut table = Table::new(["a", "b", "c"], 2);
        let mut row = table.row(0);
        row.insert(1, 0);
        row.insert("long", 1);
        row.insert("s", 2);

        let mut row = table.row(1);
        row.insert("string", 0);
        row.insert(2, 1);
        assert!(!row.insert(3, 2));
        assert!(row.insert(4, 2), "second insert replaces the first");

        let s = table.to_string();

        let expected = r#"
     a,      b,   c
===================
     1,   long,   s
string,      2,   4
"#;
        assert_eq!(s, expected.strip_prefix('\n').unwrap());
    }

    #[test]
    fn missing_values() {
        let mut table = Table::new(["a", "loong", "c"], 1);
        let mut row = table.row(0);
        row.insert("string", 0);
        row.insert("string", 2);

        let s = table.to_string();
        let expected = r#"
     a,   loong,        c
=========================
string,        ,   string
"#;
        assert_eq!(s, expected.strip_prefix('\n').unwrap());
    }

    #[test]
    #[should_panic(expected = "row 3 is out of bounds (max 2)")]
    fn test_panic_row() {
        let mut table = Table::new([1, 2, 3], 2);
        let _ = table.row(3);
    }

    #[test]
    #[should_panic(expected = "col 3 is out of bounds (max 2)")]
    fn test_panic_col() {
        let mut table = Table::new([1, 2], 1);
        let mut row = table.row(0);
        row.insert(1, 3);
    }
}
