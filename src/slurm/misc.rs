/// A column requested from `sinfo`/`squeue`: the `%` specifier and the header it produces
pub type Field = (&'static str, &'static str);

/// Converts a list of fields to a ``--format`` argument
pub fn format_string(fields: &[Field]) -> String {
    let specifiers = fields.iter().map(|(spec, _)| *spec).collect::<Vec<_>>();

    // Fields are joined by a character that does not appear in values
    format!("--format={}", specifiers.join("|"))
}

/// Returns the header line produced by a ``--format`` argument built from `fields`
pub fn header_string(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|(_, header)| *header)
        .collect::<Vec<_>>()
        .join("|")
}
