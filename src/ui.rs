use std::io::{self, IsTerminal, Write};

use color_eyre::Result;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    buffer::Buffer,
    layout::{Position, Rect, Size},
    widgets::Widget,
    Terminal, TerminalOptions, Viewport,
};
use tracing::debug;

use crate::slurm::Cluster;
use crate::widgets::PartitionTable;

/// Prints the partition table to stdout; colors are only used when writing to a terminal
pub fn print(cluster: &Cluster) -> Result<()> {
    let table = PartitionTable::new(cluster);

    let mut stdout = io::stdout();
    if stdout.is_terminal() {
        let backend = CrosstermBackend::new(io::stdout());
        let size = backend.size()?;
        if fits(&table, size) {
            return draw_inline(backend, &table);
        }

        debug!(
            "table needs {}x{}, terminal is {}x{}; printing plain text",
            table.width(),
            table.height(),
            size.width,
            size.height
        );
    }

    writeln!(stdout, "{}", render_plain(&table))?;
    Ok(())
}

/// Whether the inline viewport can hold the whole table
fn fits(table: &PartitionTable, size: Size) -> bool {
    table.width() <= size.width && table.height() <= size.height
}

/// Draws the table below the cursor without taking over the screen
fn draw_inline(backend: CrosstermBackend<io::Stdout>, table: &PartitionTable) -> Result<()> {
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(table.height()),
        },
    )?;

    let mut area = Rect::default();
    terminal.draw(|frame| {
        area = frame.area();
        frame.render_widget(table, area);
    })?;

    // Leave the cursor on the line following the table
    terminal.set_cursor_position(Position::new(0, area.bottom().saturating_sub(1)))?;
    terminal.show_cursor()?;
    drop(terminal);
    println!();

    Ok(())
}

/// Renders the table into an off-screen buffer and returns it as text
pub fn render_plain(table: &PartitionTable) -> String {
    render_text(table, table.width(), table.height())
}

/// Renders the table into a `width` x `height` buffer
pub(crate) fn render_text(table: &PartitionTable, width: u16, height: u16) -> String {
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    table.render(area, &mut buf);

    (0..area.height)
        .map(|y| {
            let line = (0..area.width)
                .map(|x| buf[(x, y)].symbol())
                .collect::<String>();
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::slurm::{hide_partitions, merge_jobs, Partition};

    fn cluster(lines: &[&str]) -> Cluster {
        let mut output = vec![
            "PARTITION|AVAIL|NODES|MAX_CPUS_PER_NODE|CPUS|CPUS(A/I/O/T)|JOB_SIZE|S:C:T|TIMELIMIT|MEMORY",
        ];
        output.extend_from_slice(lines);

        Cluster {
            partitions: Partition::parse(&output.join("\n")).unwrap(),
            updated: SystemTime::now(),
        }
    }

    #[test]
    fn test_fits() {
        let cluster = cluster(&[
            "short|up|2|UNLIMITED|28|4/52/0/56|1-2|2:14:1|1-00:00:00|192000",
            "long|up|2|UNLIMITED|28|4/52/0/56|1-2|2:14:1|7-00:00:00|192000",
        ]);
        let table = PartitionTable::new(&cluster);
        let (width, height) = (table.width(), table.height());

        assert!(fits(&table, Size::new(width, height)));
        assert!(fits(&table, Size::new(200, 50)));
        // Too narrow would clip values, too short would drop rows
        assert!(!fits(&table, Size::new(width - 1, 50)));
        assert!(!fits(&table, Size::new(200, height - 1)));
    }

    #[test]
    fn test_many_partitions_do_not_fit_small_terminal() {
        let lines = (0..30)
            .map(|i| format!("p{:02}|up|1|4|4|0/4/0/4|1-1|1:4:1|1:00:00|4000", i))
            .collect::<Vec<_>>();
        let cluster = cluster(&lines.iter().map(String::as_str).collect::<Vec<_>>());
        let table = PartitionTable::new(&cluster);

        assert!(!fits(&table, Size::new(120, 24)));

        // The plain rendering keeps every row
        let text = render_plain(&table);
        assert_eq!(text.lines().count(), 34);
        assert!(text.contains("p00") && text.contains("p29"));
    }

    #[test]
    fn test_render_plain() {
        let mut partitions = Partition::parse(
            "PARTITION|AVAIL|NODES|MAX_CPUS_PER_NODE|CPUS|CPUS(A/I/O/T)|JOB_SIZE|S:C:T|TIMELIMIT|MEMORY\n\
             short|up|2|UNLIMITED|28|4/52/0/56|1-2|2:14:1|1-00:00:00|192000\n\
             debug|up|1|UNLIMITED|28|0/28/0/28|1-1|2:14:1|15:00|192000",
        )
        .unwrap();
        merge_jobs(&mut partitions, &["short|RUNNING|None", "debug|RUNNING|None"]).unwrap();
        hide_partitions(&mut partitions, &["debug"]);

        let cluster = Cluster {
            partitions,
            updated: SystemTime::now(),
        };
        let text = render_plain(&PartitionTable::new(&cluster));
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 5);
        assert!(!text.contains("debug"));

        let row = lines[3].split_whitespace().collect::<Vec<_>>();
        assert_eq!(
            row,
            [
                "│",
                "short",
                "52",
                "56",
                "0",
                "0",
                "1",
                "2",
                "1-00:00:00",
                "1",
                "2",
                "28",
                "6857",
                "MB",
                "│"
            ]
        );
    }
}
