use crate::types::{Color, RegionStats};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    id: &'a str,
    name: &'a str,
    total: u64,
    selected: u64,
    percentage: String,
    fill: String,
    buckets: String,
}

/// Writes one CSV row per region: id, name, total, selected, percentage, fill, buckets.
pub fn write_report<W: Write>(writer: W, stats: &[RegionStats], no_data: Color) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for stat in stats {
        wtr.serialize(ReportRow {
            id: &stat.id,
            name: &stat.name,
            total: stat.total,
            selected: stat.selected,
            percentage: stat.percentage_text(),
            fill: stat.shade.color_or(no_data).to_string(),
            buckets: stat.buckets.join(";"),
        })
        .with_context(|| format!("Failed to write report row for {}", stat.id))?;
    }
    wtr.flush().context("Failed to flush report")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shade;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_header_and_rows() {
        let stats = vec![
            RegionStats {
                id: "01001".into(),
                name: "Autauga, AL".into(),
                total: 400,
                selected: 36,
                ratio: Some(0.09),
                shade: Shade::Fill(Color::rgb(0xBD, 0x00, 0x26)),
                buckets: vec!["20-24".into(), "25-29".into()],
            },
            RegionStats {
                id: "01003".into(),
                name: "Baldwin".into(),
                total: 0,
                selected: 0,
                ratio: None,
                shade: Shade::NoData,
                buckets: vec!["20-24".into(), "25-29".into()],
            },
        ];

        let mut out = Vec::new();
        write_report(&mut out, &stats, Color::rgb(0xCC, 0xCC, 0xCC)).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,name,total,selected,percentage,fill,buckets\n\
             01001,\"Autauga, AL\",400,36,9.0,#BD0026,20-24;25-29\n\
             01003,Baldwin,0,0,n/a,#CCCCCC,20-24;25-29\n"
        );
    }
}
