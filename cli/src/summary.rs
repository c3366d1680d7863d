// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::io;

use colored::Color;
use saber_core::{Bucket, RunResults};

use crate::table::{Column, PaddingDirection, Table};

/// Job counts of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub instance: String,
    pub endpoint: String,
    pub counts: [(Bucket, usize); 6],
}

impl SummaryRow {
    pub fn collect(results: &RunResults) -> Vec<Self> {
        results
            .iter()
            .flat_map(|(instance, endpoints)| {
                endpoints.iter().map(move |(endpoint, jobs)| SummaryRow {
                    instance: instance.clone(),
                    endpoint: endpoint.clone(),
                    counts: jobs.counts(),
                })
            })
            .collect()
    }

    fn count(&self, bucket: Bucket) -> usize {
        self.counts
            .iter()
            .find(|(b, _)| *b == bucket)
            .map_or(0, |(_, n)| *n)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SummaryColumn {
    Instance,
    Endpoint,
    Count(Bucket),
}

impl SummaryColumn {
    pub fn all() -> Vec<Self> {
        let mut columns = vec![Self::Instance, Self::Endpoint];
        columns.extend(Bucket::ALL.into_iter().map(Self::Count));
        columns
    }
}

impl Column<SummaryRow> for SummaryColumn {
    fn name(&self) -> &str {
        match self {
            Self::Instance => "Instance",
            Self::Endpoint => "Endpoint",
            Self::Count(Bucket::Successful) => "Successful",
            Self::Count(Bucket::Running) => "Running",
            Self::Count(Bucket::Queued) => "Queued",
            Self::Count(Bucket::New) => "New",
            Self::Count(Bucket::Waiting) => "Waiting",
            Self::Count(Bucket::Failed) => "Failed",
        }
    }

    fn format(&self, data: &SummaryRow) -> String {
        match self {
            Self::Instance => data.instance.clone(),
            Self::Endpoint => data.endpoint.clone(),
            Self::Count(bucket) => data.count(*bucket).to_string(),
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            Self::Instance | Self::Endpoint => PaddingDirection::Left,
            Self::Count(_) => PaddingDirection::Right,
        }
    }

    fn get_color(&self, data: &SummaryRow) -> Option<Color> {
        let Self::Count(bucket) = self else {
            return None;
        };
        if data.count(*bucket) == 0 {
            return None;
        }
        match bucket {
            Bucket::Successful => Some(Color::Green),
            Bucket::Failed => Some(Color::Red),
            _ => Some(Color::Yellow),
        }
    }
}

/// Writes one line per endpoint with its job counts.
pub fn write_summary(w: &mut impl io::Write, results: &RunResults) -> io::Result<()> {
    let rows = SummaryRow::collect(results);
    if rows.is_empty() {
        return writeln!(w, "No results");
    }
    let columns = SummaryColumn::all();
    Table::new(&columns, &rows).write_to(w)
}
