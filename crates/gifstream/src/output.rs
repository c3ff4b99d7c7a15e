use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gifstream::session::{SessionId, StreamSummary};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Canvas pixels as little-endian ARGB words, frames back to back.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One delivered frame, as printed by `play`.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub event: &'static str,
    pub session: SessionId,
    /// 1-based frame number within the session's current attempt stream.
    pub frame: u64,
    pub width: u16,
    pub height: u16,
    pub opaque_pixels: usize,
    pub checksum: String,
    pub timestamp: String,
}

impl FrameReport {
    pub fn new(session: SessionId, frame: u64, canvas: &[u32], width: u16, height: u16) -> Self {
        Self {
            event: "frame",
            session,
            frame,
            width,
            height,
            opaque_pixels: canvas.iter().filter(|px| *px >> 24 != 0).count(),
            checksum: format!("{:016x}", canvas_checksum(canvas)),
            timestamp: now_unix_seconds(),
        }
    }
}

/// One finished attempt, as printed by `play`.
#[derive(Debug, Serialize)]
pub struct SessionEndReport<'a> {
    pub event: &'static str,
    pub session: SessionId,
    pub attempt: u64,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a StreamSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `inspect`.
#[derive(Debug, Serialize)]
pub struct InspectReport<'a> {
    pub source: &'a str,
    pub ok: bool,
    pub frames_delivered: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a StreamSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

pub fn print_frame(report: &FrameReport, canvas: &[u32], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = styled_table();
            table
                .set_header(vec!["SESSION", "FRAME", "SIZE", "OPAQUE", "CHECKSUM"])
                .add_row(vec![
                    report.session.to_string(),
                    report.frame.to_string(),
                    format!("{}x{}", report.width, report.height),
                    report.opaque_pixels.to_string(),
                    report.checksum.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} frame={} size={}x{} opaque={} checksum={}",
                report.session,
                report.frame,
                report.width,
                report.height,
                report.opaque_pixels,
                report.checksum
            );
        }
        OutputFormat::Raw => {
            let bytes: Vec<u8> = canvas.iter().flat_map(|px| px.to_le_bytes()).collect();
            print_raw(&bytes);
        }
    }
}

pub fn print_session_end(report: &SessionEndReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table | OutputFormat::Pretty => {
            let detail = match (&report.summary, &report.error) {
                (Some(summary), _) => format!("completed frames={}", summary.frames),
                (None, Some(err)) => format!("failed: {err}"),
                (None, None) => "ended".to_string(),
            };
            println!("{} attempt={} {}", report.session, report.attempt, detail);
        }
        // Stdout carries pixels only.
        OutputFormat::Raw => {}
    }
}

pub fn print_inspect(report: &InspectReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = styled_table();
            table.set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in inspect_rows(report) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (field, value) in inspect_rows(report) {
                println!("{field}: {value}");
            }
        }
    }
}

fn inspect_rows(report: &InspectReport<'_>) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("source", report.source.to_string()),
        ("ok", report.ok.to_string()),
        ("frames_delivered", report.frames_delivered.to_string()),
    ];
    if let Some(summary) = report.summary {
        rows.push(("version", summary.version.clone()));
        rows.push(("screen", format!("{}x{}", summary.width, summary.height)));
        rows.push(("frames", summary.frames.to_string()));
        rows.push((
            "loop_count",
            summary
                .loop_count
                .map_or_else(|| "none".to_string(), |n| n.to_string()),
        ));
        rows.push(("extensions_skipped", summary.extensions_skipped.to_string()));
        rows.push(("empty_images", summary.empty_images.to_string()));
    }
    if let Some(kind) = report.error_kind {
        rows.push(("error_kind", kind.to_string()));
    }
    if let Some(err) = report.error {
        rows.push(("error", err.to_string()));
    }
    rows
}

/// FNV-1a over the canvas words; stable across runs for identical frames.
pub fn canvas_checksum(canvas: &[u32]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    canvas
        .iter()
        .flat_map(|px| px.to_le_bytes())
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_distinguishes_frames() {
        assert_eq!(canvas_checksum(&[]), 0xcbf2_9ce4_8422_2325);
        assert_ne!(
            canvas_checksum(&[0xFF00_0000, 0]),
            canvas_checksum(&[0, 0xFF00_0000])
        );
    }

    #[test]
    fn frame_report_counts_opaque_pixels() {
        let report = FrameReport::new(SessionId::new(2), 1, &[0xFFFF_0000, 0, 0x8000_00FF], 3, 1);
        assert_eq!(report.opaque_pixels, 2);
        assert_eq!(report.checksum.len(), 16);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["event"], "frame");
        assert_eq!(json["session"], 2);
    }

    #[test]
    fn inspect_rows_include_failure_details() {
        let report = InspectReport {
            source: "broken.gif",
            ok: false,
            frames_delivered: 0,
            summary: None,
            error_kind: Some("unknown_block_tag"),
            error: Some("unknown block tag 0x42"),
        };
        let rows = inspect_rows(&report);
        assert!(rows.contains(&("error_kind", "unknown_block_tag".to_string())));
        assert!(!rows.iter().any(|(field, _)| *field == "frames"));
    }
}
