// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, marker::PhantomData};

use colored::{Color, Colorize};
use unicode_width::UnicodeWidthStr;

pub struct Table<'a, T, C: Column<T>> {
    pub columns: &'a [C],
    pub separator: &'a str,
    pub padding: bool,
    pub data: &'a [T],
}

impl<'a, T, C: Column<T>> Table<'a, T, C> {
    pub fn new(columns: &'a [C], data: &'a [T]) -> Self {
        Self {
            columns,
            separator: "  ",
            padding: true,
            data,
        }
    }

    pub fn write_to(&self, w: &mut impl io::Write) -> io::Result<()> {
        let header: Vec<String> = self.columns.iter().map(|c| c.name().to_string()).collect();
        let rows: Vec<Vec<String>> = self
            .data
            .iter()
            .map(|row| self.columns.iter().map(|col| col.format(row)).collect())
            .collect();

        let widths = self.padding.then(|| {
            get_column_max_width(std::iter::once(&header).chain(&rows), self.columns.len())
        });
        let columns = self.compute_columns(widths.as_deref());

        for (j, (col, cell)) in columns.iter().zip(header).enumerate() {
            write!(w, "{}", col.pad(cell).bold())?;
            self.write_separator(w, j)?;
        }

        for (cells, row) in rows.into_iter().zip(self.data) {
            for (j, (col, cell)) in columns.iter().zip(cells).enumerate() {
                write!(w, "{}", col.stylize_cell(row, cell))?;
                self.write_separator(w, j)?;
            }
        }

        Ok(())
    }

    fn write_separator(&self, w: &mut impl io::Write, j: usize) -> io::Result<()> {
        if j + 1 < self.columns.len() {
            write!(w, "{}", self.separator)
        } else {
            writeln!(w)
        }
    }

    fn compute_columns(&self, widths: Option<&[usize]>) -> Vec<ColumnStylizer<'a, T, C>> {
        let last = self.columns.len().saturating_sub(1);
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let direction = col.padding_direction();
                // last column does not need padding if it's left-aligned
                let padding = match widths {
                    Some(_) if i == last && direction == PaddingDirection::Left => None,
                    Some(widths) => Some((widths[i], direction)),
                    None => None,
                };
                ColumnStylizer {
                    config: col,
                    padding,
                    _marker: PhantomData,
                }
            })
            .collect()
    }
}

pub trait Column<T> {
    fn name(&self) -> &str;
    fn format(&self, data: &T) -> String;
    fn padding_direction(&self) -> PaddingDirection;
    fn get_color(&self, data: &T) -> Option<Color>;
}

#[derive(Debug, Clone)]
struct ColumnStylizer<'a, T, C: Column<T>> {
    config: &'a C,
    /// padding width and direction
    padding: Option<(usize, PaddingDirection)>,
    _marker: PhantomData<T>,
}

impl<T, C: Column<T>> ColumnStylizer<'_, T, C> {
    fn pad(&self, cell: String) -> String {
        // width is measured in display columns, not chars
        match self.padding {
            Some((width, PaddingDirection::Left)) => {
                let fill = width.saturating_sub(cell.width());
                format!("{cell}{}", " ".repeat(fill))
            }
            Some((width, PaddingDirection::Right)) => {
                let fill = width.saturating_sub(cell.width());
                format!("{}{cell}", " ".repeat(fill))
            }
            None => cell,
        }
    }

    fn stylize_cell(&self, data: &T, cell: String) -> String {
        let cell = self.pad(cell);
        match self.config.get_color(data) {
            Some(color) => cell.color(color).to_string(),
            None => cell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingDirection {
    Left,
    Right,
}

fn get_column_max_width<'r>(rows: impl Iterator<Item = &'r Vec<String>>, n: usize) -> Vec<usize> {
    let mut max_width = vec![0; n];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            max_width[i] = max_width[i].max(cell.width());
        }
    }
    max_width
}
