//! Result output formatting and writing.

use crate::orchestrator::ExperimentResults;
use crate::OutputFormat;
use anyhow::Result;
use lib_eclib_ffi::FieldValue;
use std::io::Write;
use std::path::Path;

/// Write experiment results to the output directory.
pub fn write_results(
    results: &ExperimentResults,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_points_csv(results, output_dir)?,
        OutputFormat::Json => write_points_json(results, output_dir)?,
    }

    if !results.messages.is_empty() {
        let messages_path = output_dir.join("messages.txt");
        let mut f = std::fs::File::create(&messages_path)?;
        for message in &results.messages {
            writeln!(f, "{}", message.trim_end())?;
        }
        tracing::info!("Wrote firmware messages to {:?}", messages_path);
    }

    write_summary(results, output_dir)?;
    Ok(())
}

fn write_points_csv(results: &ExperimentResults, output_dir: &Path) -> Result<()> {
    let points_path = output_dir.join("points.csv");
    let mut f = std::fs::File::create(&points_path)?;

    write!(f, "time_s")?;
    for field in &results.fields {
        write!(f, ",{field}")?;
    }
    writeln!(f)?;

    for point in &results.points {
        if let Some(t) = point.time {
            write!(f, "{t}")?;
        }
        for value in &point.values {
            match value {
                FieldValue::Single(v) => write!(f, ",{v}")?,
                FieldValue::Int(v) => write!(f, ",{v}")?,
            }
        }
        writeln!(f)?;
    }

    tracing::info!(
        "Wrote {} points to {:?}",
        results.points.len(),
        points_path
    );
    Ok(())
}

fn write_points_json(results: &ExperimentResults, output_dir: &Path) -> Result<()> {
    let points_path = output_dir.join("points.json");
    let mut f = std::fs::File::create(&points_path)?;

    let points: Vec<serde_json::Value> = results
        .points
        .iter()
        .map(|point| {
            let mut row = serde_json::Map::new();
            if let Some(t) = point.time {
                row.insert("time_s".to_owned(), t.into());
            }
            for (field, value) in results.fields.iter().zip(&point.values) {
                let value = match value {
                    FieldValue::Single(v) => serde_json::json!(v),
                    FieldValue::Int(v) => serde_json::json!(v),
                };
                row.insert(field.clone(), value);
            }
            serde_json::Value::Object(row)
        })
        .collect();

    let doc = serde_json::json!({
        "technique": results.technique.to_string(),
        "points": points,
    });
    writeln!(f, "{}", serde_json::to_string_pretty(&doc)?)?;

    tracing::info!(
        "Wrote {} points to {:?}",
        results.points.len(),
        points_path
    );
    Ok(())
}

fn write_summary(results: &ExperimentResults, output_dir: &Path) -> Result<()> {
    let summary_path = output_dir.join("summary.txt");
    let mut f = std::fs::File::create(&summary_path)?;

    writeln!(f, "EC-Kernel Experiment Summary")?;
    writeln!(f, "============================")?;
    writeln!(f)?;
    writeln!(f, "Technique:  {}", results.technique)?;
    writeln!(f, "Points:     {}", results.points.len())?;
    writeln!(f, "Messages:   {}", results.messages.len())?;
    writeln!(f, "Duration:   {:.1} s", results.duration_s)?;
    writeln!(f)?;
    if results.completed {
        writeln!(f, "Status: COMPLETE - channel reported stop")?;
    } else {
        writeln!(f, "Status: TRUNCATED - duration cap reached")?;
    }

    tracing::info!("Wrote summary to {:?}", summary_path);
    Ok(())
}

/// Print a short result digest to stdout.
pub fn print_results(results: &ExperimentResults) {
    println!("\n=== Experiment Results ===\n");
    println!("Technique:  {}", results.technique);
    println!("Points:     {}", results.points.len());
    println!("Messages:   {}", results.messages.len());
    println!("Duration:   {:.1} s", results.duration_s);
    if !results.fields.is_empty() {
        println!("Columns:    time_s, {}", results.fields.join(", "));
    }
    println!(
        "\nStatus: {}",
        if results.completed {
            "COMPLETE"
        } else {
            "TRUNCATED"
        }
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_eclib_ffi::DataPoint;
    use lib_types::TechniqueId;

    fn sample_results() -> ExperimentResults {
        ExperimentResults {
            technique: TechniqueId::Ocv,
            fields: vec!["Ewe".to_owned(), "Ece".to_owned()],
            points: vec![
                DataPoint {
                    time: Some(0.5),
                    values: vec![FieldValue::Single(3.25), FieldValue::Single(0.125)],
                },
                DataPoint {
                    time: Some(1.0),
                    values: vec![FieldValue::Single(3.5), FieldValue::Single(0.125)],
                },
            ],
            messages: vec!["channel 0 started".to_owned()],
            duration_s: 12.0,
            completed: true,
        }
    }

    #[test]
    fn csv_output_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_results(&sample_results(), dir.path(), OutputFormat::Csv).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("points.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("time_s,Ewe,Ece"));
        assert_eq!(lines.next(), Some("0.5,3.25,0.125"));
        assert_eq!(lines.clone().count(), 1);

        assert!(dir.path().join("summary.txt").exists());
        assert!(dir.path().join("messages.txt").exists());
    }

    #[test]
    fn json_output_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        write_results(&sample_results(), dir.path(), OutputFormat::Json).unwrap();

        let json = std::fs::read_to_string(dir.path().join("points.json")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["points"].as_array().unwrap().len(), 2);
        assert_eq!(doc["points"][0]["time_s"], 0.5);
        assert_eq!(doc["points"][1]["Ewe"], 3.5);
    }

    #[test]
    fn summary_reports_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = sample_results();
        results.completed = false;
        write_results(&results, dir.path(), OutputFormat::Csv).unwrap();

        let summary = std::fs::read_to_string(dir.path().join("summary.txt")).unwrap();
        assert!(summary.contains("TRUNCATED"));
    }
}
