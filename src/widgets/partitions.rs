use std::time::SystemTime;

use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Stylize},
    symbols::border,
    text::{Line, Text},
    widgets::{Block, Row, Table, Widget},
};

use crate::slurm::{Cluster, Partition};

use super::misc::{mb_to_string, right_align_text, COLUMN_SPACING};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Partition,
    FreeCPUs,
    TotalCPUs,
    WaitingResources,
    Waiting,
    Running,
    Nodes,
    TimeLimit,
    MinNodes,
    MaxNodes,
    CoresPerNode,
    MemoryPerCore,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::Partition,
        Column::FreeCPUs,
        Column::TotalCPUs,
        Column::WaitingResources,
        Column::Waiting,
        Column::Running,
        Column::Nodes,
        Column::TimeLimit,
        Column::MinNodes,
        Column::MaxNodes,
        Column::CoresPerNode,
        Column::MemoryPerCore,
    ];

    /// Returns the value of this column for a given partition
    pub fn value(self, partition: &Partition) -> String {
        match self {
            Column::Partition => partition.name.clone(),
            Column::FreeCPUs => partition.cpus.idle.to_string(),
            Column::TotalCPUs => partition.cpus.total.to_string(),
            Column::WaitingResources => partition.jobs.waiting_resources.to_string(),
            Column::Waiting => partition.jobs.waiting.to_string(),
            Column::Running => partition.jobs.running.to_string(),
            Column::Nodes => partition.nodes.to_string(),
            Column::TimeLimit => partition.time_limit.clone(),
            Column::MinNodes => partition.job_size.min.to_string(),
            Column::MaxNodes => partition.job_size.max.to_string(),
            Column::CoresPerNode => partition.cores_per_node.to_string(),
            Column::MemoryPerCore => mb_to_string(partition.memory_per_core_label()),
        }
    }

    fn text<'a>(self, partition: &Partition) -> Text<'a> {
        let value = self.value(partition);
        match self {
            Column::Partition if partition.state != "up" => Text::from(value).fg(Color::Red),
            Column::Partition => Text::from(value),
            _ => right_align_text(value),
        }
    }
}

/// Header labels span two lines
const HEADER_HEIGHT: u16 = 2;

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Column::Partition => "Partition",
            Column::FreeCPUs => "CPUs\n(Free)",
            Column::TotalCPUs => "CPUs\n(Total)",
            Column::WaitingResources => "Wait. Jobs\n(Resource)",
            Column::Waiting => "Wait. Jobs\n(Total)",
            Column::Running => "Running\nJobs",
            Column::Nodes => "Nodes\n(Total)",
            Column::TimeLimit => "Max Job Time\nDD-HH:MM:SS",
            Column::MinNodes => "Min. Nodes\nper Job",
            Column::MaxNodes => "Max. Nodes\nper Job",
            Column::CoresPerNode => "Cores\nper Node",
            Column::MemoryPerCore => "RAM\nper Core",
        };

        f.write_str(label)
    }
}

/// Table of partitions, sorted by name, with the age of the queue snapshot
#[derive(Debug)]
pub struct PartitionTable<'a> {
    partitions: Vec<&'a Partition>,
    updated: SystemTime,
}

impl<'a> PartitionTable<'a> {
    pub fn new(cluster: &'a Cluster) -> Self {
        Self {
            partitions: cluster.sorted(),
            updated: cluster.updated,
        }
    }

    fn title(&self) -> String {
        format!(" Partitions ({}) ", self.partitions.len())
    }

    fn footer(&self) -> String {
        let updated: DateTime<Local> = self.updated.into();
        format!(" Last update: {} ", updated.format("%Y-%m-%d %H:%M:%S"))
    }

    fn column_widths(&self) -> Vec<u16> {
        Column::ALL
            .iter()
            .map(|&column| {
                self.partitions
                    .iter()
                    .map(|p| column.value(p).chars().count())
                    .chain(column.to_string().lines().map(|l| l.chars().count()))
                    .max()
                    .unwrap_or_default() as u16
            })
            .collect()
    }

    /// Width needed to draw the table without truncation
    pub fn width(&self) -> u16 {
        let widths = self.column_widths();
        let spacing = widths.len().saturating_sub(1) as u16 * COLUMN_SPACING;
        let table = widths.iter().sum::<u16>() + spacing;
        let titles = self.title().chars().count().max(self.footer().chars().count()) as u16;

        // +2 for the borders
        table.max(titles) + 2
    }

    /// Height of the table, including header and borders
    pub fn height(&self) -> u16 {
        self.partitions.len() as u16 + HEADER_HEIGHT + 2
    }

    /// Number of leading columns that fit within `width` without truncating a value
    fn visible_columns(&self, width: u16) -> usize {
        // -2 for the borders
        let available = width.saturating_sub(2);

        let mut used = 0u16;
        let mut count = 0;
        for (index, column_width) in self.column_widths().into_iter().enumerate() {
            used += if index == 0 {
                column_width
            } else {
                COLUMN_SPACING + column_width
            };

            if used > available {
                break;
            }
            count += 1;
        }

        count
    }
}

impl Widget for &PartitionTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Right aligned cells lose their leading characters when squeezed,
        // so columns that do not fit are left out entirely
        let visible = self.visible_columns(area.width);
        let columns = || Column::ALL.iter().take(visible);

        let rows = self
            .partitions
            .iter()
            .map(|partition| Row::new(columns().map(|c| c.text(partition))));

        let header = Row::new(columns().map(|c| {
            if matches!(c, Column::Partition) {
                Text::from(c.to_string())
            } else {
                right_align_text(c)
            }
        }))
        .height(HEADER_HEIGHT)
        .bold();

        let block = Block::bordered()
            .border_set(border::PLAIN)
            .title(Line::from(self.title()).bold())
            .title_bottom(Line::from(self.footer()).right_aligned());

        Table::new(
            rows,
            self.column_widths()
                .into_iter()
                .take(visible)
                .map(Constraint::Length),
        )
        .column_spacing(COLUMN_SPACING)
        .header(header)
        .block(block)
        .render(area, buf);
    }
}
