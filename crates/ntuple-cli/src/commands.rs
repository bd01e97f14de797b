//! Subcommand implementations
//!
//! Each command writes its output to the given writers so it can be driven
//! from tests as well as from `main`.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, bail};
use ntuple::{NtupleConfig, Reader, Writer};
use tracing::{info, warn};

/// Outcome of a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpSummary {
    pub printed: usize,
    pub failed: usize,
}

pub fn count(path: &Path, out: &mut impl Write) -> anyhow::Result<i64> {
    let reader = Reader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let count = reader.event_count();
    if count < 0 {
        bail!("failed to count events in {}", path.display());
    }
    writeln!(out, "{count}")?;
    Ok(count)
}

/// Print events as JSON lines, reporting unreadable entries on `err`
pub fn dump(
    path: &Path,
    first: u64,
    limit: Option<usize>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<DumpSummary> {
    let mut reader = Reader::open(path).with_context(|| format!("opening {}", path.display()))?;
    reader.seek(first);

    let mut summary = DumpSummary::default();
    let limit = limit.unwrap_or(usize::MAX);
    let mut index = first;
    for event in reader.by_ref().take(limit) {
        match event {
            Ok(event) => {
                serde_json::to_writer(&mut *out, &event)?;
                writeln!(out)?;
                summary.printed += 1;
            }
            Err(e) => {
                writeln!(err, "entry {index}: {e}")?;
                summary.failed += 1;
            }
        }
        index += 1;
    }
    reader.close();
    Ok(summary)
}

pub fn inspect(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let reader = Reader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let generation = reader.generation();

    writeln!(out, "file:       {}", path.display())?;
    writeln!(out, "layout:     {generation:?}")?;
    writeln!(out, "table:      {}", generation.table_name())?;
    writeln!(out, "title:      {}", reader.title())?;
    match reader.created_at() {
        Some(created) => writeln!(out, "created:    {}", created.to_rfc3339())?,
        None => writeln!(out, "created:    unknown")?,
    }
    writeln!(out, "events:     {}", reader.event_count())?;
    writeln!(out, "columns:")?;
    for spec in reader.bound_columns().columns() {
        let desc = spec.desc();
        writeln!(out, "  {:<12} {:<12} {}", desc.name, desc.label, desc.leaf_spec())?;
    }
    reader.close();
    Ok(())
}

/// Copy every event of `input` into a new current-layout file
pub fn convert(
    input: &Path,
    output: &Path,
    title: Option<&str>,
    basket_entries: usize,
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let reader = Reader::open(input).with_context(|| format!("opening {}", input.display()))?;
    let title = title.map_or_else(|| reader.title().to_string(), str::to_string);
    let from = reader.generation();

    let config = NtupleConfig::default().with_basket_entries(basket_entries);
    let mut writer = Writer::create_with(output, &title, &config)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut converted = 0;
    for (index, event) in reader.enumerate() {
        let event = event.with_context(|| format!("reading entry {index} of {}", input.display()))?;
        if let Err(e) = writer.write(&event) {
            warn!(index, error = %e, "Conversion aborted");
            return Err(e).with_context(|| format!("writing entry {index} to {}", output.display()));
        }
        converted += 1;
    }
    writer.close();

    info!(?from, converted, output = %output.display(), "Converted");
    writeln!(out, "converted {converted} events")?;
    Ok(converted)
}

/// Write every event of `input` as HepMC2 text to `output`
#[cfg(feature = "hepmc2")]
pub fn convert_to_hepmc(input: &Path, output: &Path, out: &mut impl Write) -> anyhow::Result<usize> {
    use std::fs::File;
    use std::io::BufWriter;

    let reader = Reader::open(input).with_context(|| format!("opening {}", input.display()))?;
    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = hepmc2::Writer::try_from(BufWriter::new(file))?;

    let mut converted = 0;
    for (index, event) in reader.enumerate() {
        let event = event.with_context(|| format!("reading entry {index} of {}", input.display()))?;
        writer
            .write(&hepmc2::Event::from(&event))
            .with_context(|| format!("writing entry {index} to {}", output.display()))?;
        converted += 1;
    }
    writer.finish()?;

    info!(converted, output = %output.display(), "Converted to HepMC2");
    writeln!(out, "converted {converted} events")?;
    Ok(converted)
}
