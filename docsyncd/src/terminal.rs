use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use docsync_core::DocumentId;
use time::macros::format_description;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::sink::{NotifyLevel, PresentationSink};
use crate::view::{DocumentRow, OcrPayload, OcrStatus};

/// Line source shared by the command loop and delete confirmations.
pub type InputLines = Arc<tokio::sync::Mutex<Lines<Box<dyn AsyncBufRead + Send + Unpin>>>>;

pub fn stdin_lines() -> InputLines {
    let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(BufReader::new(tokio::io::stdin()));
    Arc::new(tokio::sync::Mutex::new(reader.lines()))
}

/// Plain-text sink for an interactive terminal session.
///
/// Everything coming from the service is stripped of control characters
/// before it is written, so document text cannot drive the terminal.
pub struct TerminalSink {
    out: Mutex<Box<dyn Write + Send>>,
    input: InputLines,
    download_dir: PathBuf,
    assume_yes: bool,
    // Last table written; periodic passes that change nothing stay silent.
    shown: Mutex<Option<Vec<DocumentRow>>>,
}

impl TerminalSink {
    pub fn new(
        out: Box<dyn Write + Send>,
        input: InputLines,
        download_dir: PathBuf,
        assume_yes: bool,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            input,
            download_dir,
            assume_yes,
            shown: Mutex::new(None),
        }
    }

    pub fn stdout(input: InputLines, download_dir: PathBuf, assume_yes: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), input, download_dir, assume_yes)
    }

    /// Makes the next render print even if the rows are unchanged.
    pub fn forget_rendered(&self) {
        *self.shown.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn print(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

#[async_trait]
impl PresentationSink for TerminalSink {
    fn render(&self, rows: &[DocumentRow]) {
        {
            let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
            if shown.as_deref() == Some(rows) {
                return;
            }
            *shown = Some(rows.to_vec());
        }
        self.print(&format_table(rows));
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        let tag = match level {
            NotifyLevel::Success => "ok",
            NotifyLevel::Error => "error",
            NotifyLevel::Info => "info",
        };
        self.print(&format!("[{tag}] {}", sanitize_inline(message)));
    }

    fn show_ocr_text(&self, id: &DocumentId, payload: &OcrPayload) {
        match payload.decode() {
            Ok(text) if text.trim().is_empty() => {
                self.notify("No OCR text available", NotifyLevel::Info);
            }
            Ok(text) => {
                self.print(&format!(
                    "--- OCR text of {} ---\n{}\n---",
                    sanitize_inline(id.as_str()),
                    sanitize_text(&text)
                ));
            }
            Err(err) => {
                tracing::warn!(id = %id, "cannot decode OCR payload: {err}");
                self.notify("Error displaying OCR text", NotifyLevel::Error);
            }
        }
    }

    fn save_download(&self, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.download_dir)?;
        let target = self.download_dir.join(safe_filename(filename));
        std::fs::write(&target, bytes)?;
        Ok(target)
    }

    fn set_busy(&self, busy: bool) {
        tracing::trace!(busy, "busy indicator");
    }

    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        {
            let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = write!(out, "{} [y/N] ", sanitize_inline(prompt));
            let _ = out.flush();
        }
        let mut input = self.input.lock().await;
        match input.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!("cannot read confirmation: {err}");
                false
            }
        }
    }
}

fn format_table(rows: &[DocumentRow]) -> String {
    if rows.is_empty() {
        return "(no documents)".to_string();
    }
    let date_format = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    let header = [
        "ID".to_string(),
        "NAME".to_string(),
        "SIZE".to_string(),
        "TYPE".to_string(),
        "UPLOADED".to_string(),
        "OCR".to_string(),
    ];
    let lines: Vec<[String; 6]> = rows
        .iter()
        .map(|row| {
            [
                sanitize_inline(row.id.as_str()),
                sanitize_inline(&row.filename),
                row.size.clone(),
                sanitize_inline(&row.filetype),
                row.uploaded
                    .format(&date_format)
                    .unwrap_or_else(|_| row.uploaded.to_string()),
                match row.status {
                    OcrStatus::Complete if row.ocr.is_some() => "done (text)".to_string(),
                    OcrStatus::Complete => "done".to_string(),
                    OcrStatus::Pending => "pending".to_string(),
                },
            ]
        })
        .collect();

    let mut widths = header.each_ref().map(|cell| cell.chars().count());
    for line in &lines {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    std::iter::once(&header)
        .chain(&lines)
        .map(|line| {
            line.iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops control characters except newlines and tabs.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// Single-line variant of [`sanitize_text`].
pub fn sanitize_inline(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '\n' | '\t') { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = sanitize_inline(base);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::Document;
    use std::path::Path;
    use tempfile::tempdir;
    use time::macros::datetime;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn input(text: &'static str) -> InputLines {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(BufReader::new(text.as_bytes()));
        Arc::new(tokio::sync::Mutex::new(reader.lines()))
    }

    fn sink(text: &'static str, dir: &Path) -> (TerminalSink, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let sink = TerminalSink::new(
            Box::new(buffer.clone()),
            input(text),
            dir.to_path_buf(),
            false,
        );
        (sink, buffer)
    }

    fn row(filename: &str, done: bool) -> DocumentRow {
        DocumentRow::from_document(&Document {
            id: DocumentId::from("a1"),
            filename: filename.into(),
            filesize: 2048,
            filetype: "application/pdf".into(),
            upload_date: datetime!(2024-05-01 10:15 UTC),
            ocr_job_done: done,
            ocr_text: done.then(|| "text".to_string()),
        })
    }

    #[test]
    fn escape_sequences_are_stripped() {
        assert_eq!(sanitize_text("a\u{1b}[31mred\u{7}\nb\tc\r"), "a[31mred\nb\tc");
        assert_eq!(sanitize_inline("x\ny\u{1b}"), "x y");
    }

    #[test]
    fn download_names_cannot_escape_the_directory() {
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("dir\\scan.pdf"), "scan.pdf");
        assert_eq!(safe_filename(".."), "download");
        assert_eq!(safe_filename(""), "download");
    }

    #[test]
    fn table_lists_rows_with_status() {
        let table = format_table(&[row("x.pdf", true), row("bill\u{1b}.pdf", false)]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("x.pdf"));
        assert!(lines[1].contains("2.0 KB"));
        assert!(lines[1].contains("2024-05-01 10:15 UTC"));
        assert!(lines[1].ends_with("done (text)"));
        assert!(lines[2].contains("bill.pdf"));
        assert!(lines[2].ends_with("pending"));
        assert_eq!(format_table(&[]), "(no documents)");
    }

    #[test]
    fn unchanged_rows_are_printed_once() {
        let dir = tempdir().unwrap();
        let (sink, out) = sink("", dir.path());
        let rows = vec![row("x.pdf", false)];

        sink.render(&rows);
        sink.render(&rows);
        assert_eq!(out.contents().matches("x.pdf").count(), 1);

        sink.render(&[row("x.pdf", true)]);
        assert_eq!(out.contents().matches("x.pdf").count(), 2);

        sink.forget_rendered();
        sink.render(&[row("x.pdf", true)]);
        assert_eq!(out.contents().matches("x.pdf").count(), 3);
    }

    #[test]
    fn ocr_text_is_decoded_and_sanitized() {
        let dir = tempdir().unwrap();
        let (sink, out) = sink("", dir.path());
        sink.show_ocr_text(
            &"a1".into(),
            &OcrPayload::encode("<b>bold</b>\u{1b}[2J\nline two"),
        );
        sink.show_ocr_text(&"a1".into(), &OcrPayload::from_encoded("***"));

        let printed = out.contents();
        assert!(printed.contains("<b>bold</b>[2J\nline two"));
        assert!(!printed.contains('\u{1b}'));
        assert!(printed.contains("[error] Error displaying OCR text"));
    }

    #[test]
    fn downloads_are_written_to_the_download_dir() {
        let dir = tempdir().unwrap();
        let (sink, _out) = sink("", &dir.path().join("nested"));
        let saved = sink.save_download("../x.pdf", b"%PDF").unwrap();
        assert_eq!(saved, dir.path().join("nested").join("x.pdf"));
        assert_eq!(std::fs::read(saved).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn confirmation_reads_the_next_line() {
        let dir = tempdir().unwrap();
        let (sink, out) = sink("yes\nno\n", dir.path());
        assert!(sink.confirm("Delete?").await);
        assert!(!sink.confirm("Delete?").await);
        assert!(!sink.confirm("Delete?").await);
        assert!(out.contents().contains("Delete? [y/N] "));
    }

    #[tokio::test]
    async fn assume_yes_skips_the_prompt() {
        let dir = tempdir().unwrap();
        let buffer = SharedBuffer::default();
        let sink = TerminalSink::new(
            Box::new(buffer.clone()),
            input(""),
            dir.path().to_path_buf(),
            true,
        );
        assert!(sink.confirm("Delete?").await);
        assert!(buffer.contents().is_empty());
    }
}
