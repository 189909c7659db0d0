use std::fmt::{self, Write};

/// Horizontal placement of a column's cells
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub(crate) enum Align {
    #[default]
    Left,
    Right,
}

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    fn is_awk_safe(&self) -> bool {
        for cell in &self.cells {
            if cell.contains(|c: char| c.is_whitespace()) {
                return false;
            }
        }

        true
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

pub(crate) trait IntoRow: Into<Row> + Sized {
    fn into_row(self) -> Row {
        self.into()
    }
}

impl<T> IntoRow for T where T: Into<Row> + Sized {}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        let value: Vec<String> = value.into_iter().map(|s| s.to_owned()).collect();

        value.into()
    }
}

pub(crate) struct Table {
    body: Vec<Row>,
    header: Option<Row>,
    num_columns: Option<usize>,
    alignments: Vec<(usize, Align)>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new() -> Table {
        Table {
            body: Vec::new(),
            header: None,
            num_columns: None,
            alignments: Vec::new(),
            print_header: true,
        }
    }

    fn expect_num_columns(&mut self, num_columns: usize) {
        if let Some(prev_num_columns) = &self.num_columns {
            if *prev_num_columns == num_columns {
                return;
            }
            panic!(
                "table has {} columns but a row with {} columns was inserted",
                prev_num_columns, num_columns
            );
        } else {
            let _ = self.num_columns.insert(num_columns);
        }
    }

    /// Aligns the cells of column `column`. Headers are aligned as well.
    pub(crate) fn align_column(&mut self, column: usize, align: Align) {
        self.alignments.retain(|&(c, _)| c != column);
        self.alignments.push((column, align));
    }

    fn alignment(&self, column: usize) -> Align {
        self.alignments
            .iter()
            .find(|&&(c, _)| c == column)
            .map(|&(_, a)| a)
            .unwrap_or_default()
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    pub(crate) fn add_row<S: IntoRow>(&mut self, row: S) {
        let row = row.into_row();

        self.expect_num_columns(row.columns());

        self.body.push(row);
    }

    pub(crate) fn set_header<S: IntoRow>(&mut self, header: S) {
        let header = header.into_row();

        self.expect_num_columns(header.columns());

        if !header.is_awk_safe() {
            panic!("table header is not awk safe, contains whitespace")
        }

        self.header.replace(header);
    }

    /// The rows which are printed.
    fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        let header = match self.print_header {
            true => self.header.as_ref(),
            false => None,
        };

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let n_cols = match self.num_columns {
            Some(n_cols) => n_cols,
            None => return Vec::new(),
        };

        let mut widths = vec![0usize; n_cols];

        for row in self.iter_rows() {
            for (i, cell) in row.cells.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.column_widths();

        let mut print_row = |row: &Row| -> std::fmt::Result {
            let last = row.cells.len().saturating_sub(1);

            for (i, cell) in row.cells.iter().enumerate() {
                match self.alignment(i) {
                    // No trailing padding on the last column
                    Align::Left if i == last => f.write_str(cell)?,
                    Align::Left => write!(f, "{:<width$}", cell, width = widths[i])?,
                    Align::Right => write!(f, "{:>width$}", cell, width = widths[i])?,
                }

                if i != last {
                    f.write_str("  ")?;
                }
            }

            f.write_char('\n')?;

            Ok(())
        };

        for row in self.iter_rows() {
            print_row(row)?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}
